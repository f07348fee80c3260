use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Feed acquisition failed: {0}")]
    Acquisition(String),

    #[error("Feed parse failed: {0}")]
    Parse(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Curated file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Short stable label recorded in the run history.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Acquisition(_) => "acquisition",
            PipelineError::Parse(_) => "parse",
            PipelineError::Persistence(_) => "persistence",
            PipelineError::Csv(_) => "curated",
            PipelineError::Io(_) => "io",
            PipelineError::Config(_) | PipelineError::Toml(_) => "config",
            PipelineError::Json(_) => "io",
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Acquisition(err.to_string())
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::Persistence(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
