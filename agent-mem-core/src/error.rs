use thiserror::Error;

/// Errors surfaced by memory operations.
#[derive(Debug, Error)]
pub enum MemError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0} (must stay inside .context/)")]
    InvalidPath(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("git {command} failed: {stderr}")]
    Vcs { command: String, stderr: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, MemError>;
