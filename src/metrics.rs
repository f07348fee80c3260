//! Stage counters recorded through the `metrics` facade.
//!
//! Nothing is exported unless `init_metrics` installed a Prometheus recorder;
//! without one every call here is a no-op.

use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

use crate::types::RunState;

static INIT: Once = Once::new();

/// Metric names follow `rss_ingest_{stage}_{name}`; counters end in `_total`.
macro_rules! stage_metric {
    (counter, $stage:literal, $name:literal) => {
        concat!("rss_ingest_", $stage, "_", $name, "_total")
    };
    (histogram, $stage:literal, $name:literal) => {
        concat!("rss_ingest_", $stage, "_", $name)
    };
}

/// Install the Prometheus exporter when `RSS_INGEST_METRICS_ADDR` is set. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        let addr_str = match std::env::var("RSS_INGEST_METRICS_ADDR") {
            Ok(v) if !v.trim().is_empty() => v,
            _ => return,
        };
        let addr: SocketAddr = match addr_str.parse() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Invalid RSS_INGEST_METRICS_ADDR '{}': {}", addr_str, e);
                return;
            }
        };
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
        match builder.install() {
            Ok(()) => info!("Prometheus exporter listening on http://{}/metrics", addr),
            Err(e) => warn!("Prometheus exporter install failed: {}", e),
        }
    });
}

pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_fetch(bytes: usize) {
        ::metrics::counter!(stage_metric!(counter, "fetch", "documents")).increment(1);
        ::metrics::histogram!(stage_metric!(histogram, "fetch", "bytes")).record(bytes as f64);
    }

    pub fn record_fetch_error() {
        ::metrics::counter!(stage_metric!(counter, "fetch", "errors")).increment(1);
    }

    pub fn record_transform(items: usize, gaps: usize) {
        ::metrics::counter!(stage_metric!(counter, "transform", "items")).increment(items as u64);
        ::metrics::counter!(stage_metric!(counter, "transform", "projection_gaps"))
            .increment(gaps as u64);
    }

    pub fn record_load(rows: usize) {
        ::metrics::counter!(stage_metric!(counter, "load", "rows")).increment(rows as u64);
    }

    pub fn record_run(state: RunState) {
        match state {
            RunState::Loaded => {
                ::metrics::counter!(stage_metric!(counter, "run", "loaded")).increment(1)
            }
            RunState::Failed => {
                ::metrics::counter!(stage_metric!(counter, "run", "failed")).increment(1)
            }
            _ => {}
        }
    }
}
