//! Get-or-create over natural keys

use crate::error::{IngestError, Result};
use crate::store::{display_key, KeyValue, RecordId, Row, StoreTx, TableSpec, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, warn};

/// A storable record identified by its natural key
pub trait Entity: Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Debug + Send + Sync;

    const TABLE: &'static TableSpec;

    fn key(&self) -> Self::Key;

    fn key_values(key: &Self::Key) -> Vec<KeyValue>;

    /// Attribute columns in table order
    fn values(&self) -> Vec<Value>;
}

/// Record ids for every candidate key of one resolve pass
#[derive(Debug, Clone)]
pub struct Resolved<K> {
    pub refs: HashMap<K, RecordId>,
    pub created: u64,
    pub reused: u64,
}

impl<K: Eq + Hash> Resolved<K> {
    pub fn get(&self, key: &K) -> Option<RecordId> {
        self.refs.get(key).copied()
    }
}

pub struct UpsertEngine;

impl UpsertEngine {
    /// Map every candidate to a stored row, creating only the rows no other
    /// candidate or stored record already covers.
    ///
    /// Candidates sharing a key collapse onto the first one seen; a later
    /// candidate with different attributes is logged and dropped.
    pub async fn resolve<E: Entity>(
        tx: &mut dyn StoreTx,
        candidates: Vec<E>,
    ) -> Result<Resolved<E::Key>> {
        let table = E::TABLE;
        let mut chosen: HashMap<E::Key, E> = HashMap::with_capacity(candidates.len());
        let mut order: Vec<E::Key> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let key = candidate.key();
            match chosen.get(&key) {
                Some(existing) => {
                    if existing.values() != candidate.values() {
                        warn!(
                            kind = table.name,
                            key = ?key,
                            "Conflicting attributes for one natural key, keeping the first"
                        );
                    }
                },
                None => {
                    order.push(key.clone());
                    chosen.insert(key, candidate);
                },
            }
        }

        if order.is_empty() {
            return Ok(Resolved {
                refs: HashMap::new(),
                created: 0,
                reused: 0,
            });
        }

        let stored_keys: Vec<Vec<KeyValue>> = order.iter().map(E::key_values).collect();
        let mut found = tx.lookup(table, &stored_keys).await?;
        let reused = found.len() as u64;

        let missing: Vec<Row> = order
            .iter()
            .zip(&stored_keys)
            .filter(|(_, stored)| !found.contains_key(*stored))
            .filter_map(|(key, stored)| {
                chosen.get(key).map(|entity| Row {
                    key: stored.clone(),
                    values: entity.values(),
                })
            })
            .collect();

        let mut created = 0;
        if !missing.is_empty() {
            created = tx.insert(table, &missing).await?;
            let inserted_keys: Vec<Vec<KeyValue>> = missing.into_iter().map(|r| r.key).collect();
            found.extend(tx.lookup(table, &inserted_keys).await?);
        }

        let mut refs = HashMap::with_capacity(order.len());
        for (key, stored) in order.into_iter().zip(&stored_keys) {
            let id = found.get(stored).copied().ok_or_else(|| {
                IngestError::Store(format!(
                    "{} row {} missing after insert",
                    table.name,
                    display_key(stored)
                ))
            })?;
            refs.insert(key, id);
        }

        debug!(kind = table.name, created, reused, "Resolved entities");
        Ok(Resolved {
            refs,
            created,
            reused,
        })
    }
}
