use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("No product records available: {0}")]
    DataUnavailable(String),

    #[error("Index build failed: {0}")]
    IndexBuild(String),

    #[error("A rebuild is already in progress")]
    RebuildInProgress,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
