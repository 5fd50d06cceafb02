//! Persistence seam
//!
//! Resolvers talk to a [`StoreTx`]: batched natural-key lookups and
//! insert-if-absent writes inside one transaction per case. [`PgStore`] backs
//! production runs; [`MemoryStore`] backs dry runs and tests.

mod memory;
mod postgres;
pub mod schema;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use schema::{KeyColumn, KeyKind, TableSpec};

use crate::error::Result;
use crate::summary::RunSummary;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

/// Surrogate primary key of a stored row
pub type RecordId = i64;

/// One natural key column value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Text(String),
    Int(i64),
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Text(value)
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Int(value)
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Text(s) => f.write_str(s),
            KeyValue::Int(i) => write!(f, "{}", i),
        }
    }
}

/// Render a composite key for logs and skip records
pub fn display_key(key: &[KeyValue]) -> String {
    key.iter().map(ToString::to_string).collect::<Vec<_>>().join("/")
}

/// Nullable attribute column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(Option<String>),
    Int(Option<i64>),
    Float(Option<f64>),
    Bool(Option<bool>),
    Timestamp(Option<DateTime<Utc>>),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(Some(value.into()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(Some(s)) => Some(s),
            _ => None,
        }
    }
}

/// A row to insert: natural key columns then attribute columns, in
/// [`TableSpec`] order
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: Vec<KeyValue>,
    pub values: Vec<Value>,
}

/// What the store already knows about a request id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyState {
    NoFamily,
    NoReport,
    Latest { hash: String, version: i64 },
}

#[async_trait]
pub trait StoreTx: Send {
    /// Ids of the rows whose natural key is in `keys`; absent keys are left out
    async fn lookup(
        &mut self,
        table: &'static TableSpec,
        keys: &[Vec<KeyValue>],
    ) -> Result<HashMap<Vec<KeyValue>, RecordId>>;

    /// Insert rows, leaving any row whose key already exists untouched.
    /// Returns the number of rows written.
    async fn insert(&mut self, table: &'static TableSpec, rows: &[Row]) -> Result<u64>;

    async fn latest_report_version(&mut self, ir_family: RecordId) -> Result<Option<i64>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    async fn family_state(&self, request_id: &str) -> Result<FamilyState>;

    async fn record_run(&self, summary: &RunSummary) -> Result<()>;
}
