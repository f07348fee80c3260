//! Daily trigger for unattended runs.
//!
//! One run at a time: the next trigger is computed only after the previous
//! run has finished. A failed run is not retried; the next trigger is the retry.

use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use tracing::{error, info};

use crate::pipeline::RunOrchestrator;

/// The first instant strictly after `now` whose wall-clock time is `at`.
pub fn next_trigger(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Run forever at `at` local time until Ctrl-C.
pub async fn run_daily(orchestrator: &RunOrchestrator, at: NaiveTime, run_now: bool) {
    if run_now {
        log_report(orchestrator.run_once().await);
    }
    loop {
        let now = Local::now().naive_local();
        let next = next_trigger(now, at);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next_run = %next, wait_secs = wait.as_secs(), "Waiting for next scheduled run");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                log_report(orchestrator.run_once().await);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, scheduler stopping");
                return;
            }
        }
    }
}

fn log_report(report: crate::pipeline::RunReport) {
    if report.succeeded() {
        info!(
            run_id = %report.run_id,
            rows = report.rows_loaded.unwrap_or(0),
            "Scheduled run loaded"
        );
    } else {
        error!(
            run_id = %report.run_id,
            kind = report.error_kind.as_deref().unwrap_or("unknown"),
            "Scheduled run failed, waiting for next trigger"
        );
    }
}
