//! Error types shared across the MDT workspace

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, MdtError>;

#[derive(Error, Debug)]
pub enum MdtError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
