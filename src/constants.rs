//! Fixed names shared across the pipeline stages.

pub const DEFAULT_FEED_URL: &str = "https://timesofindia.indiatimes.com/rssfeedstopstories.cms";
pub const DEFAULT_WORKING_DIR: &str = "output";

pub const RAW_DIR: &str = "raw";
pub const CURATED_DIR: &str = "curated";
pub const DB_DIR: &str = "db";
pub const RUNS_DIR: &str = "runs";
pub const LOG_DIR: &str = "logs";

pub const DB_NAME: &str = "rss_feed.sqlite";
pub const DB_TABLE: &str = "rss_feed";
pub const RUN_LOG_FILE: &str = "runs.ndjson";

/// Default daily trigger (local time), the `0 23 * * *` slot.
pub const DEFAULT_DAILY_AT: &str = "23:00";

/// Capture timestamp format embedded in artifact names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

pub const RAW_FILE_PREFIX: &str = "raw_rss_feed_";
pub const RAW_FILE_EXT: &str = "xml";
pub const CURATED_FILE_PREFIX: &str = "curated_";
pub const CURATED_FILE_EXT: &str = "csv";

/// Columns of a curated record, in file and table order.
pub const CURATED_COLUMNS: [&str; 5] = ["title", "description", "link", "pubDate", "guid"];

/// Name of the raw document for a capture timestamp
pub fn raw_file_name(stamp: &str) -> String {
    format!("{RAW_FILE_PREFIX}{stamp}.{RAW_FILE_EXT}")
}

/// Name of the curated file for a capture timestamp
pub fn curated_file_name(stamp: &str) -> String {
    format!("{CURATED_FILE_PREFIX}{stamp}.{CURATED_FILE_EXT}")
}
