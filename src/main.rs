use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use rss_ingest::config::PipelineConfig;
use rss_ingest::infra::http_client::ReqwestHttp;
use rss_ingest::pipeline::transform::stamp_from_raw_path;
use rss_ingest::pipeline::{Fetcher, Loader, RunOrchestrator, RunReport, Transformer};
use rss_ingest::storage::FeedStore;
use rss_ingest::types::{format_stamp, parse_stamp};
use rss_ingest::{logging, metrics, scheduler};

#[derive(Parser)]
#[command(name = "rss_ingest")]
#[command(about = "Fetch an RSS feed, curate its items to CSV and append them to SQLite")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./rss_ingest.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the working directory holding raw/, curated/, db/ and runs/
    #[arg(long, global = true)]
    working_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the feed into raw/
    Fetch,
    /// Curate a raw feed document into curated/
    Transform {
        /// Raw feed document to read
        #[arg(long)]
        raw: PathBuf,
        /// Capture stamp (YYYYMMDDHHMMSS); taken from the raw file name when omitted
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Append a curated file to the database
    Load {
        #[arg(long)]
        curated: PathBuf,
    },
    /// Run fetch, transform and load once
    Run,
    /// Run every day at the configured time until interrupted
    Schedule {
        /// Also run immediately before waiting for the first trigger
        #[arg(long)]
        run_now: bool,
    },
    /// Show recent runs from the run history
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print the newest rows in the database, oldest first
    Rows {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn print_report(report: &RunReport) {
    println!("\n📊 Run {} ({:?})", report.run_id, report.state);
    println!("   Captured: {}", format_stamp(&report.captured_at));
    if let Some(raw) = &report.raw_path {
        println!("   Raw file: {}", raw.display());
    }
    if let Some(curated) = &report.curated_path {
        println!("   Curated file: {}", curated.display());
    }
    if let Some(items) = report.items {
        println!("   Items: {} ({} empty fields)", items, report.projection_gaps);
    }
    if let Some(rows) = report.rows_loaded {
        println!("   Rows loaded: {}", rows);
    }
    if let Some(err) = &report.error {
        println!("   ❌ {}: {}", report.error_kind.as_deref().unwrap_or("error"), err);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.working_dir {
        config.working_dir = dir;
    }

    logging::init_logging(&config.log_dir_path());
    metrics::init_metrics();
    info!(working_dir = %config.working_dir.display(), feed = %config.feed_url, "rss_ingest starting");

    let http = Arc::new(ReqwestHttp::new());

    match cli.command {
        Commands::Fetch => {
            let fetched = Fetcher::new(&config, http).fetch().await?;
            println!("📥 Saved {} bytes to {}", fetched.bytes, fetched.path.display());
            println!("   Timestamp: {}", format_stamp(&fetched.captured_at));
        }
        Commands::Transform { raw, timestamp } => {
            let captured_at = match timestamp {
                Some(ts) => parse_stamp(&ts)
                    .ok_or_else(|| anyhow!("timestamp '{}' is not YYYYMMDDHHMMSS", ts))?,
                None => stamp_from_raw_path(&raw).with_context(|| {
                    format!("no timestamp given and none in file name {}", raw.display())
                })?,
            };
            let outcome = Transformer::new(&config).transform(&raw, captured_at)?;
            println!("🔨 Wrote {} rows to {}", outcome.rows, outcome.path.display());
            if !outcome.gaps.is_empty() {
                println!("   ⚠️  {} empty fields filled", outcome.gaps.len());
            }
        }
        Commands::Load { curated } => {
            let rows = Loader::new(&config).load(&curated)?;
            println!("💾 Appended {} rows to {}", rows, config.db_path().display());
        }
        Commands::Run => {
            println!("🚀 Running feed pipeline...");
            let report = RunOrchestrator::new(&config, http).run_once().await;
            print_report(&report);
            if !report.succeeded() {
                error!("Run {} failed", report.run_id);
                return Err(anyhow!("run {} failed", report.run_id));
            }
        }
        Commands::Schedule { run_now } => {
            let at = config.schedule.trigger_time()?;
            println!("⏰ Scheduling daily run at {}", at.format("%H:%M"));
            let orchestrator = RunOrchestrator::new(&config, http);
            scheduler::run_daily(&orchestrator, at, run_now).await;
        }
        Commands::History { limit } => {
            let orchestrator = RunOrchestrator::new(&config, http);
            let reports = orchestrator.run_log().recent(limit)?;
            if reports.is_empty() {
                println!("No runs recorded in {}", orchestrator.run_log().path().display());
            }
            for report in &reports {
                print_report(report);
            }
        }
        Commands::Rows { limit } => {
            let store = FeedStore::open(config.db_path(), &config.table)?;
            let rows = store.rows(Some(limit))?;
            println!("🗄️  {} of {} rows in {}", rows.len(), store.count()?, config.db_path().display());
            for row in &rows {
                let [title, _, link, pub_date, guid] = row.values();
                println!(
                    "   {} | {} | {} | {}",
                    pub_date.unwrap_or("-"),
                    title.unwrap_or("-"),
                    link.unwrap_or("-"),
                    guid.unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}
