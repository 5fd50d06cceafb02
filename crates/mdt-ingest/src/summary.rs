//! Per-run outcome record
//!
//! One [`RunSummary`] is produced by every orchestrator run and persisted to
//! the `list_update` table.

use crate::error::ErrorCategory;
use chrono::{DateTime, Utc};
use mdt_common::SampleType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a worklist item is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Fetched,
    Hashed,
    Classified,
    Resolving,
    Annotating,
    Upserting,
    Committed,
    Failed,
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaseState::Fetched => "fetched",
            CaseState::Hashed => "hashed",
            CaseState::Classified => "classified",
            CaseState::Resolving => "resolving",
            CaseState::Annotating => "annotating",
            CaseState::Upserting => "upserting",
            CaseState::Committed => "committed",
            CaseState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why one case did not make it to COMMITTED
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFailure {
    pub category: ErrorCategory,
    pub message: String,
    /// Last state reached before the failure
    pub state: CaseState,
}

/// A candidate entity left out because a required upstream record was missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntity {
    pub case_id: String,
    pub kind: String,
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sample_type: SampleType,
    pub dry_run: bool,
    /// False when the run stopped on a fatal fault
    pub success: bool,
    pub listed: usize,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Request id to the report version written for it
    pub reports_added: BTreeMap<String, i64>,
    pub reports_updated: BTreeMap<String, i64>,
    pub failures: BTreeMap<String, CaseFailure>,
    pub skipped_entities: Vec<SkippedEntity>,
    pub error: Option<String>,
}

impl RunSummary {
    pub fn new(sample_type: SampleType, dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            completed_at: None,
            sample_type,
            dry_run,
            success: true,
            listed: 0,
            added: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            reports_added: BTreeMap::new(),
            reports_updated: BTreeMap::new(),
            failures: BTreeMap::new(),
            skipped_entities: Vec::new(),
            error: None,
        }
    }

    pub fn record_failure(
        &mut self,
        case_id: impl Into<String>,
        category: ErrorCategory,
        message: impl Into<String>,
        state: CaseState,
    ) {
        self.failed += 1;
        self.failures.insert(
            case_id.into(),
            CaseFailure {
                category,
                message: message.into(),
                state,
            },
        );
    }

    pub fn fatal(&mut self, message: impl Into<String>) {
        self.success = false;
        self.error = Some(message.into());
    }

    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn processed(&self) -> usize {
        self.added + self.updated + self.skipped + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run summary ({})", self.sample_type)?;
        writeln!(f, "  listed:   {}", self.listed)?;
        writeln!(f, "  added:    {}", self.added)?;
        writeln!(f, "  updated:  {}", self.updated)?;
        writeln!(f, "  skipped:  {}", self.skipped)?;
        writeln!(f, "  failed:   {}", self.failed)?;
        writeln!(f, "  skipped entities: {}", self.skipped_entities.len())?;
        for (case_id, failure) in &self.failures {
            writeln!(
                f,
                "  ! {} [{} at {}]: {}",
                case_id, failure.category, failure.state, failure.message
            )?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "  fatal: {}", error)?;
        }
        write!(f, "  success: {}", self.success)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_failure_counts() {
        let mut summary = RunSummary::new(SampleType::RareDisease, false);
        summary.added = 2;
        summary.record_failure(
            "12-1",
            ErrorCategory::DataIntegrity,
            "no proband",
            CaseState::Hashed,
        );

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed(), 3);
        assert_eq!(summary.failures["12-1"].state, CaseState::Hashed);
        assert!(summary.success);
    }

    #[test]
    fn test_failures_serialize_with_category() {
        let mut summary = RunSummary::new(SampleType::Cancer, true);
        summary.record_failure("7-2", ErrorCategory::Store, "boom", CaseState::Upserting);
        summary.fatal("auth");

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["failures"]["7-2"]["category"], "store");
        assert_eq!(json["failures"]["7-2"]["state"], "upserting");
        assert_eq!(json["success"], false);
        assert_eq!(json["sample_type"], "cancer");
    }
}
