use chrono::{Local, NaiveDateTime, Timelike};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::app::ports::HttpClientPort;
use crate::config::PipelineConfig;
use crate::constants::raw_file_name;
use crate::error::{PipelineError, Result};
use crate::metrics::PipelineMetrics;
use crate::types::{format_stamp, FetchedFeed};

/// Downloads the feed and stores the body verbatim under the raw directory.
pub struct Fetcher {
    http: Arc<dyn HttpClientPort>,
    feed_url: String,
    raw_dir: PathBuf,
}

impl Fetcher {
    pub fn new(config: &PipelineConfig, http: Arc<dyn HttpClientPort>) -> Self {
        Self {
            http,
            feed_url: config.feed_url.clone(),
            raw_dir: config.raw_dir_path(),
        }
    }

    /// Fetch now, with the capture instant truncated to whole seconds.
    pub async fn fetch(&self) -> Result<FetchedFeed> {
        let now = Local::now().naive_local();
        self.fetch_at(now.with_nanosecond(0).unwrap_or(now)).await
    }

    /// Fetch and name the raw document after `captured_at`.
    ///
    /// A second fetch with the same stamp overwrites the first document.
    #[instrument(skip(self), fields(url = %self.feed_url))]
    pub async fn fetch_at(&self, captured_at: NaiveDateTime) -> Result<FetchedFeed> {
        info!("Downloading RSS feed");

        let response = match self.http.get(&self.feed_url).await {
            Ok(r) => r,
            Err(e) => {
                error!("Feed request failed: {}", e);
                PipelineMetrics::record_fetch_error();
                return Err(PipelineError::Acquisition(e));
            }
        };
        if !response.is_success() {
            error!(status = response.status, "Feed responded with non-success status");
            PipelineMetrics::record_fetch_error();
            return Err(PipelineError::Acquisition(format!(
                "GET {} returned HTTP {}",
                self.feed_url, response.status
            )));
        }

        fs::create_dir_all(&self.raw_dir)?;
        let path = self.raw_dir.join(raw_file_name(&format_stamp(&captured_at)));
        fs::write(&path, &response.bytes)?;

        let sha256 = hex::encode(Sha256::digest(&response.bytes));
        PipelineMetrics::record_fetch(response.bytes.len());
        info!(
            path = %path.display(),
            bytes = response.bytes.len(),
            content_type = %response.content_type,
            "Downloaded RSS feed"
        );

        Ok(FetchedFeed {
            path,
            captured_at,
            sha256,
            bytes: response.bytes.len(),
        })
    }
}
