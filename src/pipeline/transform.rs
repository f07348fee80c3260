use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::constants::{curated_file_name, CURATED_COLUMNS, RAW_FILE_PREFIX};
use crate::error::{PipelineError, Result};
use crate::metrics::PipelineMetrics;
use crate::parser::curate_feed;
use crate::types::{format_stamp, parse_stamp, CuratedRecord, TransformOutcome};

/// Turns a raw feed document into a curated CSV file.
pub struct Transformer {
    curated_dir: PathBuf,
}

impl Transformer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            curated_dir: config.curated_dir_path(),
        }
    }

    /// Parse `raw_path`, project the items and write `curated_<stamp>.csv`.
    ///
    /// The document is fully parsed before anything is written, so a
    /// malformed feed leaves no curated file behind.
    #[instrument(skip(self, raw_path), fields(raw = %raw_path.display()))]
    pub fn transform(&self, raw_path: &Path, captured_at: NaiveDateTime) -> Result<TransformOutcome> {
        info!("Parsing RSS feed");

        let xml = fs::read(raw_path)?;
        let (rows, gaps) = curate_feed(&xml).map_err(|e| {
            error!("Feed parse failed: {}", e);
            e
        })?;
        for gap in &gaps {
            warn!(item = gap.item_index, field = gap.field, "feed item lacks field, leaving it empty");
        }
        PipelineMetrics::record_transform(rows.len(), gaps.len());

        fs::create_dir_all(&self.curated_dir)?;
        let path = self.curated_dir.join(curated_file_name(&format_stamp(&captured_at)));
        write_curated(&path, &rows)?;

        info!(path = %path.display(), rows = rows.len(), gaps = gaps.len(), "Parsed RSS feed, saved CSV");
        Ok(TransformOutcome {
            path,
            rows: rows.len(),
            gaps,
        })
    }
}

/// Write rows as comma-separated text: header first, `\n` after every record,
/// absent values as empty fields.
pub fn write_curated(path: &Path, rows: &[CuratedRecord]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)?;
    writer.write_record(CURATED_COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a curated file back. The header must be exactly the curated columns;
/// empty fields come back as `None` and every other value as the same text.
pub fn read_curated(path: &Path) -> Result<Vec<CuratedRecord>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = reader.headers()?;
    if headers.iter().ne(CURATED_COLUMNS.iter().copied()) {
        return Err(PipelineError::Persistence(format!(
            "curated file {} has header {:?}, expected {:?}",
            path.display(),
            headers.iter().collect::<Vec<_>>(),
            CURATED_COLUMNS
        )));
    }
    let rows = reader
        .deserialize::<CuratedRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Recover the capture instant from a `raw_rss_feed_<stamp>.xml` path.
pub fn stamp_from_raw_path(path: &Path) -> Option<NaiveDateTime> {
    let stem = path.file_stem()?.to_str()?;
    parse_stamp(stem.strip_prefix(RAW_FILE_PREFIX)?)
}
