//! Error types for case ingestion
//!
//! Every failure maps onto an [`ErrorCategory`]. The orchestrator records that
//! category per case in the run summary and uses it to decide whether a
//! failure aborts the run.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Case source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Invalid case document {case_id}: {message}")]
    DataIntegrity { case_id: String, message: String },

    #[error("Unresolved dependency: {0}")]
    DependencyUnresolved(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Common(#[from] mdt_common::MdtError),
}

/// Coarse failure classes reported per case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network fault, timeout or unusable response from an external service
    TransientFetch,
    /// Malformed or incomplete case document
    DataIntegrity,
    /// A required upstream record could not be resolved
    DependencyUnresolved,
    /// Local persistence fault
    Store,
    /// Aborts the whole run
    Fatal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::TransientFetch => "transient_fetch",
            ErrorCategory::DataIntegrity => "data_integrity",
            ErrorCategory::DependencyUnresolved => "dependency_unresolved",
            ErrorCategory::Store => "store",
            ErrorCategory::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

impl IngestError {
    pub fn data_integrity(case_id: impl Into<String>, message: impl Into<String>) -> Self {
        IngestError::DataIntegrity {
            case_id: case_id.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            IngestError::Http(_)
            | IngestError::Status { .. }
            | IngestError::InvalidResponse { .. } => ErrorCategory::TransientFetch,
            IngestError::Authentication(_)
            | IngestError::SourceUnavailable(_)
            | IngestError::Config(_) => ErrorCategory::Fatal,
            IngestError::DataIntegrity { .. } => ErrorCategory::DataIntegrity,
            IngestError::DependencyUnresolved(_) => ErrorCategory::DependencyUnresolved,
            IngestError::Database(_)
            | IngestError::Migration(_)
            | IngestError::Store(_)
            | IngestError::Serialization(_)
            | IngestError::Io(_)
            | IngestError::Common(_) => ErrorCategory::Store,
        }
    }

    /// Whether another attempt at the same external call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Http(e) => !e.is_builder() && !e.is_redirect(),
            IngestError::Status { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            },
            IngestError::InvalidResponse { .. } => true,
            _ => false,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Fatal
    }
}
