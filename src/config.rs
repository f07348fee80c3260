use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{PipelineError, Result};
use crate::storage::is_sql_identifier;

/// Config file picked up from the current directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "rss_ingest.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub working_dir: PathBuf,
    pub feed_url: String,
    pub raw_dir: String,
    pub curated_dir: String,
    pub db_dir: String,
    pub db_name: String,
    pub table: String,
    pub log_dir: String,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local wall-clock time of the daily run, `HH:MM`.
    pub daily_at: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from(DEFAULT_WORKING_DIR),
            feed_url: DEFAULT_FEED_URL.to_string(),
            raw_dir: RAW_DIR.to_string(),
            curated_dir: CURATED_DIR.to_string(),
            db_dir: DB_DIR.to_string(),
            db_name: DB_NAME.to_string(),
            table: DB_TABLE.to_string(),
            log_dir: LOG_DIR.to_string(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: DEFAULT_DAILY_AT.to_string(),
        }
    }
}

impl ScheduleConfig {
    pub fn trigger_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M").map_err(|e| {
            PipelineError::Config(format!("Invalid schedule.daily_at '{}': {}", self.daily_at, e))
        })
    }
}

impl PipelineConfig {
    /// Load configuration from `path`, or from `rss_ingest.toml` if present, or defaults.
    /// Environment overrides are applied afterwards and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = non_empty_env("RSS_INGEST_WORKING_DIR") {
            self.working_dir = PathBuf::from(dir);
        }
        if let Some(url) = non_empty_env("RSS_INGEST_FEED_URL") {
            self.feed_url = url;
        }
        if let Some(table) = non_empty_env("RSS_INGEST_TABLE") {
            self.table = table;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.feed_url.starts_with("http://") || self.feed_url.starts_with("https://")) {
            return Err(PipelineError::Config(format!(
                "feed_url must be an http(s) URL, got '{}'",
                self.feed_url
            )));
        }
        if !is_sql_identifier(&self.table) {
            return Err(PipelineError::Config(format!(
                "table must be a plain SQL identifier, got '{}'",
                self.table
            )));
        }
        for (name, value) in [
            ("raw_dir", &self.raw_dir),
            ("curated_dir", &self.curated_dir),
            ("db_dir", &self.db_dir),
            ("db_name", &self.db_name),
            ("log_dir", &self.log_dir),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::Config(format!("{name} must not be empty")));
            }
        }
        self.schedule.trigger_time()?;
        Ok(())
    }

    pub fn raw_dir_path(&self) -> PathBuf {
        self.working_dir.join(&self.raw_dir)
    }

    pub fn curated_dir_path(&self) -> PathBuf {
        self.working_dir.join(&self.curated_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.working_dir.join(&self.db_dir).join(&self.db_name)
    }

    pub fn log_dir_path(&self) -> PathBuf {
        self.working_dir.join(&self.log_dir)
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.working_dir.join(RUNS_DIR).join(RUN_LOG_FILE)
    }

    /// Defaults rooted at `working_dir`.
    pub fn with_working_dir<P: Into<PathBuf>>(working_dir: P) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Self::default()
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
