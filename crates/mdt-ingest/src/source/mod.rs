//! Remote case source
//!
//! Cases come from the CIP API ([`CipClient`]) or, for offline runs, from a
//! directory of saved case documents ([`LocalCaseSource`]). Both sit behind
//! the [`CaseSource`] trait so the orchestrator never knows which it has.

pub mod client;
pub mod local;
pub mod models;
pub mod session;

pub use client::CipClient;
pub use local::LocalCaseSource;
pub use models::{CaseSummary, ListPage};
pub use session::CipSession;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait CaseSource: Send + Sync {
    /// Establish credentials. Failure here aborts the run.
    async fn authenticate(&self) -> Result<()>;

    /// Every case visible to this source, in listing order
    async fn list_cases(&self) -> Result<Vec<CaseSummary>>;

    /// Full case document for one interpretation request version
    async fn fetch_case(&self, ir_id: &str, version: &str) -> Result<Value>;
}
