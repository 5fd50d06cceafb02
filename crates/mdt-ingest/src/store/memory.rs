//! In-process store
//!
//! A transaction works on a snapshot taken at `begin` and swaps it back in on
//! commit. Cases are upserted one at a time, so snapshots never race.

use super::schema::{self, TableSpec};
use super::{FamilyState, KeyValue, RecordId, Row, Store, StoreTx, Value};
use crate::error::{IngestError, Result};
use crate::summary::RunSummary;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    rows: BTreeMap<RecordId, Row>,
    index: HashMap<Vec<KeyValue>, RecordId>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: RecordId,
    tables: HashMap<&'static str, MemoryTable>,
}

impl MemoryState {
    fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(name)
    }

    fn lookup(&self, table: &TableSpec, keys: &[Vec<KeyValue>]) -> HashMap<Vec<KeyValue>, RecordId> {
        let Some(stored) = self.table(table.name) else {
            return HashMap::new();
        };
        keys.iter()
            .filter_map(|key| stored.index.get(key).map(|id| (key.clone(), *id)))
            .collect()
    }

    fn insert(&mut self, table: &'static TableSpec, rows: &[Row]) -> Result<u64> {
        let mut written = 0;
        for row in rows {
            if row.key.len() != table.key.len() || row.values.len() != table.columns.len() {
                return Err(IngestError::Store(format!(
                    "{}: row shape does not match table",
                    table.name
                )));
            }
            let stored = self.tables.entry(table.name).or_default();
            if stored.index.contains_key(&row.key) {
                continue;
            }
            self.next_id += 1;
            stored.index.insert(row.key.clone(), self.next_id);
            stored.rows.insert(self.next_id, row.clone());
            written += 1;
        }
        Ok(written)
    }

    /// Latest (version, content hash) stored for a report family
    fn latest_report(&self, ir_family: RecordId) -> Option<(i64, Option<String>)> {
        let table = &schema::GEL_INTERPRETATION_REPORT;
        let hash_column = table.column_index("content_hash")?;
        self.table(table.name)?
            .rows
            .values()
            .filter(|row| row.key.first() == Some(&KeyValue::Int(ir_family)))
            .filter_map(|row| match row.key.get(1) {
                Some(KeyValue::Int(version)) => Some((
                    *version,
                    row.values
                        .get(hash_column)
                        .and_then(Value::as_text)
                        .map(String::from),
                )),
                _ => None,
            })
            .max_by_key(|(version, _)| *version)
    }
}

/// Store kept entirely in memory, with helpers for inspecting its contents
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    runs: Arc<Mutex<Vec<RunSummary>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table
    pub async fn count(&self, table: &TableSpec) -> usize {
        self.state
            .lock()
            .await
            .table(table.name)
            .map_or(0, |t| t.rows.len())
    }

    /// All rows of a table in insertion order
    pub async fn rows(&self, table: &TableSpec) -> Vec<(RecordId, Row)> {
        self.state
            .lock()
            .await
            .table(table.name)
            .map(|t| t.rows.iter().map(|(id, row)| (*id, row.clone())).collect())
            .unwrap_or_default()
    }

    /// Row ids per table; used to compare whole-store contents across runs
    pub async fn snapshot(&self) -> BTreeMap<&'static str, Vec<RecordId>> {
        let state = self.state.lock().await;
        state
            .tables
            .iter()
            .map(|(name, t)| (*name, t.rows.keys().copied().collect()))
            .collect()
    }

    pub async fn runs(&self) -> Vec<RunSummary> {
        self.runs.lock().await.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let snapshot = self.state.lock().await.clone();
        Ok(Box::new(MemoryTx {
            target: Arc::clone(&self.state),
            working: snapshot,
        }))
    }

    async fn family_state(&self, request_id: &str) -> Result<FamilyState> {
        let state = self.state.lock().await;
        let key = vec![KeyValue::from(request_id)];
        let Some(ir_family) = state
            .lookup(&schema::INTERPRETATION_REPORT_FAMILY, &[key.clone()])
            .get(&key)
            .copied()
        else {
            return Ok(FamilyState::NoFamily);
        };

        Ok(match state.latest_report(ir_family) {
            Some((version, hash)) => FamilyState::Latest {
                hash: hash.unwrap_or_default(),
                version,
            },
            None => FamilyState::NoReport,
        })
    }

    async fn record_run(&self, summary: &RunSummary) -> Result<()> {
        self.runs.lock().await.push(summary.clone());
        Ok(())
    }
}

struct MemoryTx {
    target: Arc<Mutex<MemoryState>>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lookup(
        &mut self,
        table: &'static TableSpec,
        keys: &[Vec<KeyValue>],
    ) -> Result<HashMap<Vec<KeyValue>, RecordId>> {
        Ok(self.working.lookup(table, keys))
    }

    async fn insert(&mut self, table: &'static TableSpec, rows: &[Row]) -> Result<u64> {
        self.working.insert(table, rows)
    }

    async fn latest_report_version(&mut self, ir_family: RecordId) -> Result<Option<i64>> {
        Ok(self.working.latest_report(ir_family).map(|(version, _)| version))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { target, working } = *self;
        *target.lock().await = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
