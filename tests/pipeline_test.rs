use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

use rss_ingest::app::ports::{HttpClientPort, HttpGetResult};
use rss_ingest::config::PipelineConfig;
use rss_ingest::pipeline::transform::read_curated;
use rss_ingest::pipeline::RunOrchestrator;
use rss_ingest::storage::FeedStore;
use rss_ingest::types::RunState;

const TWO_ITEMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Top Stories</title>
    <link>https://example.com/</link>
    <item>
      <title>A</title>
      <description>d1</description>
      <link>l1</link>
      <pubDate>p1</pubDate>
      <guid>g1</guid>
    </item>
    <item>
      <title>B</title>
      <description>d2</description>
      <link>l2</link>
      <pubDate>p2</pubDate>
      <guid>g2</guid>
    </item>
  </channel>
</rss>
"#;

const NO_ITEMS: &str = r#"<rss version="2.0"><channel><title>Top Stories</title></channel></rss>"#;

/// Serves queued bodies in order, repeating the last one.
struct FeedServer {
    status: u16,
    bodies: Mutex<Vec<&'static str>>,
}

impl FeedServer {
    fn new(bodies: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            status: 200,
            bodies: Mutex::new(bodies.into_iter().rev().collect()),
        })
    }

    fn with_status(status: u16, body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            status,
            bodies: Mutex::new(vec![body]),
        })
    }
}

#[async_trait]
impl HttpClientPort for FeedServer {
    async fn get(&self, _url: &str) -> Result<HttpGetResult, String> {
        let mut bodies = self.bodies.lock().unwrap();
        let body = if bodies.len() > 1 {
            bodies.pop().unwrap()
        } else {
            bodies[0]
        };
        Ok(HttpGetResult {
            status: self.status,
            bytes: body.as_bytes().to_vec(),
            content_type: "application/rss+xml".to_string(),
        })
    }
}

fn stamp(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 7, day)
        .unwrap()
        .and_hms_opt(23, 0, 0)
        .unwrap()
}

fn row_count(config: &PipelineConfig) -> usize {
    FeedStore::open(config.db_path(), &config.table)
        .unwrap()
        .count()
        .unwrap()
}

#[tokio::test]
async fn test_two_item_run_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let config = PipelineConfig::with_working_dir(dir.path());
    let orchestrator = RunOrchestrator::new(&config, FeedServer::new(vec![TWO_ITEMS]));

    let report = orchestrator.run_at(stamp(18)).await;
    assert_eq!(report.state, RunState::Loaded);
    assert_eq!(report.items, Some(2));
    assert_eq!(report.rows_loaded, Some(2));

    let raw = dir.path().join("raw/raw_rss_feed_20230718230000.xml");
    let curated = dir.path().join("curated/curated_20230718230000.csv");
    assert_eq!(report.raw_path.as_deref(), Some(raw.as_path()));
    assert_eq!(fs::read_to_string(&raw)?, TWO_ITEMS);
    assert_eq!(
        fs::read_to_string(&curated)?,
        "title,description,link,pubDate,guid\nA,d1,l1,p1,g1\nB,d2,l2,p2,g2\n"
    );

    let store = FeedStore::open(config.db_path(), &config.table)?;
    assert_eq!(store.rows(None)?, read_curated(&curated)?);
    Ok(())
}

#[tokio::test]
async fn test_zero_item_run_appends_nothing() -> Result<()> {
    let dir = tempdir()?;
    let config = PipelineConfig::with_working_dir(dir.path());
    let orchestrator = RunOrchestrator::new(&config, FeedServer::new(vec![NO_ITEMS]));

    let report = orchestrator.run_at(stamp(18)).await;
    assert_eq!(report.state, RunState::Loaded);
    assert_eq!(report.rows_loaded, Some(0));
    assert_eq!(
        fs::read_to_string(dir.path().join("curated/curated_20230718230000.csv"))?,
        "title,description,link,pubDate,guid\n"
    );
    assert_eq!(row_count(&config), 0);
    Ok(())
}

#[tokio::test]
async fn test_store_grows_by_sum_of_runs() -> Result<()> {
    let dir = tempdir()?;
    let config = PipelineConfig::with_working_dir(dir.path());
    let orchestrator = RunOrchestrator::new(
        &config,
        FeedServer::new(vec![TWO_ITEMS, NO_ITEMS, TWO_ITEMS]),
    );

    for day in [18, 19, 20] {
        assert!(orchestrator.run_at(stamp(day)).await.succeeded());
    }
    assert_eq!(row_count(&config), 4);

    let rows = FeedStore::open(config.db_path(), &config.table)?.rows(None)?;
    let titles: Vec<_> = rows.iter().map(|r| r.title.as_deref().unwrap()).collect();
    assert_eq!(titles, vec!["A", "B", "A", "B"]);

    let history = orchestrator.run_log().recent(10)?;
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|r| r.state == RunState::Loaded));
    Ok(())
}

#[tokio::test]
async fn test_malformed_feed_fails_run_and_keeps_raw() -> Result<()> {
    let dir = tempdir()?;
    let config = PipelineConfig::with_working_dir(dir.path());
    let orchestrator = RunOrchestrator::new(
        &config,
        FeedServer::new(vec!["<rss><channel><item><title>A</channel></rss>"]),
    );

    let report = orchestrator.run_at(stamp(18)).await;
    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.error_kind.as_deref(), Some("parse"));
    assert!(report.curated_path.is_none());
    assert!(dir.path().join("raw/raw_rss_feed_20230718230000.xml").exists());
    assert!(!dir.path().join("curated/curated_20230718230000.csv").exists());
    assert!(!config.db_path().exists());

    let history = orchestrator.run_log().recent(1)?;
    assert_eq!(history[0].state, RunState::Failed);
    assert_eq!(history[0].run_id, report.run_id);
    Ok(())
}

#[tokio::test]
async fn test_failed_run_leaves_earlier_rows_alone() -> Result<()> {
    let dir = tempdir()?;
    let config = PipelineConfig::with_working_dir(dir.path());
    let orchestrator = RunOrchestrator::new(
        &config,
        FeedServer::new(vec![TWO_ITEMS, "<rss><item>"]),
    );

    assert!(orchestrator.run_at(stamp(18)).await.succeeded());
    let before = FeedStore::open(config.db_path(), &config.table)?.rows(None)?;

    assert!(!orchestrator.run_at(stamp(19)).await.succeeded());
    let after = FeedStore::open(config.db_path(), &config.table)?.rows(None)?;
    assert_eq!(before, after);
    Ok(())
}

#[tokio::test]
async fn test_load_failure_keeps_curated_file() -> Result<()> {
    let dir = tempdir()?;
    let config = PipelineConfig::with_working_dir(dir.path());
    fs::create_dir_all(dir.path().join("db"))?;
    rusqlite::Connection::open(config.db_path())?
        .execute_batch("CREATE TABLE rss_feed (id INTEGER PRIMARY KEY, title TEXT);")?;

    let orchestrator = RunOrchestrator::new(&config, FeedServer::new(vec![TWO_ITEMS]));
    let report = orchestrator.run_at(stamp(18)).await;
    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.error_kind.as_deref(), Some("persistence"));
    assert_eq!(report.items, Some(2));
    assert!(report.rows_loaded.is_none());

    let curated = dir.path().join("curated/curated_20230718230000.csv");
    assert_eq!(report.curated_path.as_deref(), Some(curated.as_path()));
    assert_eq!(read_curated(&curated)?.len(), 2);

    let history = orchestrator.run_log().recent(1)?;
    assert_eq!(history[0].state, RunState::Failed);
    assert_eq!(history[0].error_kind.as_deref(), Some("persistence"));
    Ok(())
}

#[tokio::test]
async fn test_non_success_response_fails_before_writing() -> Result<()> {
    let dir = tempdir()?;
    let config = PipelineConfig::with_working_dir(dir.path());
    let orchestrator = RunOrchestrator::new(
        &config,
        FeedServer::with_status(503, "<html>Service Unavailable</html>"),
    );

    let report = orchestrator.run_at(stamp(18)).await;
    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.error_kind.as_deref(), Some("acquisition"));
    assert!(report.raw_path.is_none());
    assert!(report.curated_path.is_none());
    assert!(!dir.path().join("raw/raw_rss_feed_20230718230000.xml").exists());
    assert!(!config.db_path().exists());

    let history = orchestrator.run_log().recent(1)?;
    assert_eq!(history[0].state, RunState::Failed);
    assert_eq!(history[0].run_id, report.run_id);
    Ok(())
}
