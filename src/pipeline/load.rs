use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::metrics::PipelineMetrics;
use crate::pipeline::transform::read_curated;
use crate::storage::FeedStore;

/// Appends a curated file's rows to the persistent table.
pub struct Loader {
    db_path: PathBuf,
    table: String,
}

impl Loader {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            db_path: config.db_path(),
            table: config.table.clone(),
        }
    }

    /// Returns the number of rows appended. The store is opened for this call
    /// only and closed when it returns.
    #[instrument(skip(self, curated_path), fields(curated = %curated_path.display(), table = %self.table))]
    pub fn load(&self, curated_path: &Path) -> Result<usize> {
        info!("Loading to database");

        let rows = read_curated(curated_path)?;
        let mut store = FeedStore::open(&self.db_path, &self.table).map_err(|e| {
            error!("Opening store failed: {}", e);
            e
        })?;
        let appended = store.append(&rows).map_err(|e| {
            error!("Append failed: {}", e);
            e
        })?;
        PipelineMetrics::record_load(appended);

        info!(rows = appended, db = %self.db_path.display(), "Loaded to database");
        Ok(appended)
    }
}
