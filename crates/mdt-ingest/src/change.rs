//! Change detection against already-ingested reports

use crate::case::CaseDocument;
use crate::store::{FamilyState, Store};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    /// Never seen
    Add,
    /// Seen, but the content differs from the latest stored report
    Update,
    /// Identical to the latest stored report
    Skip,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Classification::Add => "ADD",
            Classification::Update => "UPDATE",
            Classification::Skip => "SKIP",
        })
    }
}

pub struct ChangeDetector;

impl ChangeDetector {
    pub fn from_state(state: &FamilyState, content_hash: &str) -> Classification {
        match state {
            FamilyState::NoFamily => Classification::Add,
            FamilyState::NoReport => Classification::Update,
            FamilyState::Latest { hash, .. } if hash == content_hash => Classification::Skip,
            FamilyState::Latest { .. } => Classification::Update,
        }
    }

    /// A failed lookup classifies as ADD
    pub async fn classify(store: &dyn Store, case: &CaseDocument) -> Classification {
        match store.family_state(&case.request_id).await {
            Ok(state) => {
                let classification = Self::from_state(&state, &case.content_hash);
                debug!(
                    request_id = %case.request_id,
                    state = ?state,
                    %classification,
                    "Classified case"
                );
                classification
            },
            Err(e) => {
                warn!(
                    request_id = %case.request_id,
                    error = %e,
                    "Family lookup failed, treating case as new"
                );
                Classification::Add
            },
        }
    }
}
