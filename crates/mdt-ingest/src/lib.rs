//! MDT Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Ingests clinical genome interpretation cases from the CIP API into the
//! MDT database.
//!
//! # Pipeline
//!
//! - **Source**: authenticated polling of the case listing ([`source`])
//! - **Case model**: typed, hashed case documents with the tier filter
//!   applied ([`case`])
//! - **Change detection**: ADD / UPDATE / SKIP against the latest stored
//!   report ([`change`])
//! - **Annotation**: one CellBase call per genome build per batch
//!   ([`annotation`])
//! - **Resolution**: get-or-create of every entity by natural key, inside one
//!   transaction per case ([`resolve`], [`store`])
//! - **Orchestration**: batches, per-case failure isolation and the run
//!   summary ([`orchestrator`], [`summary`])
//!
//! # Example
//!
//! ```no_run
//! use mdt_ingest::orchestrator::{BatchOrchestrator, RunOptions};
//! use mdt_ingest::{annotation::CellBaseClient, panels::PanelAppClient};
//! use mdt_ingest::{config::IngestConfig, source::CipClient, store::MemoryStore};
//! use mdt_common::SampleType;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let orchestrator = BatchOrchestrator::new(
//!         Arc::new(CipClient::new(&config.cip, &config.http)?),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(CellBaseClient::new(&config.cellbase, &config.http)?),
//!         Arc::new(PanelAppClient::new(&config.panelapp, &config.http)?),
//!         config.pipeline.clone(),
//!     );
//!     let summary = orchestrator.run(&RunOptions::new(SampleType::RareDisease)).await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

pub mod annotation;
pub mod case;
pub mod change;
pub mod cli;
pub mod config;
pub mod demographics;
pub mod error;
pub mod orchestrator;
pub mod panels;
pub mod resolve;
pub mod retry;
pub mod source;
pub mod store;
pub mod summary;

mod http;
mod serde_helpers;

pub use error::{ErrorCategory, IngestError, Result};
