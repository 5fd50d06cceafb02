//! Listing payloads returned by the case source

use crate::serde_helpers::{optional_string_or_number, string_or_number};
use serde::Deserialize;
use serde_json::Value;

/// One page of `interpretation-request?page=N`
#[derive(Debug, Clone, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub results: Vec<CaseSummary>,
    /// URL of the next page, `null`, or a boolean depending on API version
    #[serde(default)]
    pub next: Value,
    #[serde(default)]
    pub count: u64,
}

impl ListPage {
    pub fn has_next(&self) -> bool {
        match &self.next {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }
}

/// Listing entry for one interpretation request version
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CaseSummary {
    /// `"{ir_id}-{version}"`
    #[serde(deserialize_with = "string_or_number")]
    pub interpretation_request_id: String,
    pub sample_type: String,
    #[serde(default)]
    pub last_status: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub proband: Option<String>,
    #[serde(default)]
    pub sites: Vec<String>,
}

impl CaseSummary {
    /// Split the request id into `(ir_id, version)`
    pub fn ir_and_version(&self) -> Option<(&str, &str)> {
        self.interpretation_request_id
            .rsplit_once('-')
            .filter(|(ir, version)| !ir.is_empty() && !version.is_empty())
    }
}
