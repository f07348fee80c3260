use chrono::{DateTime, Local, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::app::ports::HttpClientPort;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::gateway::run_log::RunLog;
use crate::metrics::PipelineMetrics;
use crate::types::RunState;

use super::{Fetcher, Loader, Transformer};

/// What happened during one run. Appended to the run history when the run ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub captured_at: NaiveDateTime,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub raw_path: Option<PathBuf>,
    pub raw_sha256: Option<String>,
    pub curated_path: Option<PathBuf>,
    pub items: Option<usize>,
    pub projection_gaps: usize,
    pub rows_loaded: Option<usize>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(captured_at: NaiveDateTime) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            captured_at,
            state: RunState::Pending,
            started_at: Utc::now(),
            finished_at: None,
            raw_path: None,
            raw_sha256: None,
            curated_path: None,
            items: None,
            projection_gaps: 0,
            rows_loaded: None,
            error_kind: None,
            error: None,
        }
    }

    fn advance(&mut self, next: RunState) {
        info!(run_id = %self.run_id, from = ?self.state, to = ?next, "run state change");
        self.state = next;
    }

    fn fail(&mut self, err: &PipelineError) {
        error!(run_id = %self.run_id, stage_state = ?self.state, kind = err.kind(), "run failed: {}", err);
        self.state = RunState::Failed;
        self.error_kind = Some(err.kind().to_string());
        self.error = Some(err.to_string());
    }

    pub fn succeeded(&self) -> bool {
        self.state == RunState::Loaded
    }
}

/// Runs fetch, transform and load strictly in order, handing each stage's
/// output to the next. A failing stage ends the run; artifacts already on
/// disk stay there.
pub struct RunOrchestrator {
    fetcher: Fetcher,
    transformer: Transformer,
    loader: Loader,
    run_log: RunLog,
}

impl RunOrchestrator {
    pub fn new(config: &PipelineConfig, http: Arc<dyn HttpClientPort>) -> Self {
        Self {
            fetcher: Fetcher::new(config, http),
            transformer: Transformer::new(config),
            loader: Loader::new(config),
            run_log: RunLog::new(config.run_log_path()),
        }
    }

    pub fn run_log(&self) -> &RunLog {
        &self.run_log
    }

    /// One run captured now.
    pub async fn run_once(&self) -> RunReport {
        let now = Local::now().naive_local();
        self.run_at(now.with_nanosecond(0).unwrap_or(now)).await
    }

    /// One run whose artifacts are named after `captured_at`.
    pub async fn run_at(&self, captured_at: NaiveDateTime) -> RunReport {
        let report = RunReport::new(captured_at);
        let span = tracing::info_span!("run", run_id = %report.run_id);
        self.finish(report).instrument(span).await
    }

    async fn finish(&self, mut report: RunReport) -> RunReport {
        info!(captured_at = %report.captured_at, "Starting feed run");

        if let Err(e) = self.execute(&mut report).await {
            report.fail(&e);
        }
        debug_assert!(report.state.is_terminal(), "run ended in {:?}", report.state);
        report.finished_at = Some(Utc::now());
        PipelineMetrics::record_run(report.state);

        if let Err(e) = self.run_log.append(&report) {
            warn!("Could not record run in {}: {}", self.run_log.path().display(), e);
        }
        if report.succeeded() {
            info!(rows = report.rows_loaded.unwrap_or(0), "Feed run finished");
        }
        report
    }

    async fn execute(&self, report: &mut RunReport) -> Result<()> {
        let fetched = self.fetcher.fetch_at(report.captured_at).await?;
        report.raw_path = Some(fetched.path.clone());
        report.raw_sha256 = Some(fetched.sha256.clone());
        report.advance(RunState::Fetched);

        let outcome = self.transformer.transform(&fetched.path, fetched.captured_at)?;
        report.curated_path = Some(outcome.path.clone());
        report.items = Some(outcome.rows);
        report.projection_gaps = outcome.gaps.len();
        report.advance(RunState::Transformed);

        let rows = self.loader.load(&outcome.path)?;
        report.rows_loaded = Some(rows);
        report.advance(RunState::Loaded);
        Ok(())
    }
}
