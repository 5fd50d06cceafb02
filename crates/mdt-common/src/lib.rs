//! MDT Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the MDT ingestion workspace.
//!
//! - **Error Handling**: [`MdtError`] and the crate [`Result`] alias
//! - **Checksums**: canonical JSON serialization and content hashing
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Types**: sample types and genome builds
//!
//! # Example
//!
//! ```no_run
//! use mdt_common::checksum::content_hash;
//!
//! let doc = serde_json::json!({"b": 1, "a": [true, null]});
//! let hash = content_hash(&doc).unwrap();
//! assert_eq!(hash.len(), 128);
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

pub use error::{MdtError, Result};
pub use types::{GenomeBuild, SampleType};
