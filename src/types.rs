use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::constants::TIMESTAMP_FORMAT;

/// One `item` element: child tag name to its text, `None` when the child had no text.
pub type FeedItem = HashMap<String, Option<String>>;

/// The five-field projection of a feed item that gets persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedRecord {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,
    pub guid: Option<String>,
}

impl CuratedRecord {
    /// Values in column order.
    pub fn values(&self) -> [Option<&str>; 5] {
        [
            self.title.as_deref(),
            self.description.as_deref(),
            self.link.as_deref(),
            self.pub_date.as_deref(),
            self.guid.as_deref(),
        ]
    }
}

/// A field the projection had to fill with an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionGap {
    pub item_index: usize,
    pub field: &'static str,
}

/// Output of the fetch stage, threaded into the transform stage.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub path: PathBuf,
    pub captured_at: NaiveDateTime,
    pub sha256: String,
    pub bytes: usize,
}

/// Output of the transform stage, threaded into the load stage.
#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub path: PathBuf,
    pub rows: usize,
    pub gaps: Vec<ProjectionGap>,
}

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Pending,
    Fetched,
    Transformed,
    Loaded,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Loaded | RunState::Failed)
    }
}

/// Format a capture instant the way artifact names embed it.
pub fn format_stamp(captured_at: &NaiveDateTime) -> String {
    captured_at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `YYYYMMDDHHMMSS` capture stamp.
pub fn parse_stamp(stamp: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}
