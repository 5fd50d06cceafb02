//! PostgreSQL store
//!
//! Lookups are tuple `IN` queries over the natural key; inserts are one
//! multi-row `INSERT ... ON CONFLICT DO NOTHING` per chunk, sized to stay
//! under the Postgres bind parameter limit.

use super::schema::{KeyKind, TableSpec};
use super::{FamilyState, KeyValue, RecordId, Row, Store, StoreTx, Value};
use crate::config::DatabaseConfig;
use crate::error::{IngestError, Result};
use crate::summary::RunSummary;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row as _, Transaction};
use std::collections::HashMap;
use tracing::{debug, info};

/// Postgres rejects statements with more than 65535 bind parameters
const MAX_BIND_PARAMS: usize = 65_000;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| IngestError::Config("DATABASE_URL must be set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await?;
        info!(max_connections = config.max_connections, "Connected to database");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn rows_per_chunk(binds_per_row: usize) -> usize {
    (MAX_BIND_PARAMS / binds_per_row.max(1)).max(1)
}

fn push_key_bind(b: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &str>, value: &KeyValue) {
    match value {
        KeyValue::Text(s) => {
            b.push_bind(s.clone());
        },
        KeyValue::Int(i) => {
            b.push_bind(*i);
        },
    }
}

fn push_value_bind(b: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &str>, value: &Value) {
    match value {
        Value::Text(v) => {
            b.push_bind(v.clone());
        },
        Value::Int(v) => {
            b.push_bind(*v);
        },
        Value::Float(v) => {
            b.push_bind(*v);
        },
        Value::Bool(v) => {
            b.push_bind(*v);
        },
        Value::Timestamp(v) => {
            b.push_bind(*v);
        },
    }
}

fn key_from_row(table: &TableSpec, row: &PgRow) -> Result<Vec<KeyValue>> {
    table
        .key
        .iter()
        .map(|column| {
            Ok(match column.kind {
                KeyKind::Text => KeyValue::Text(row.try_get(column.name)?),
                KeyKind::Int => KeyValue::Int(row.try_get(column.name)?),
            })
        })
        .collect()
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn family_state(&self, request_id: &str) -> Result<FamilyState> {
        let row: Option<(RecordId, Option<i64>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT irf.id, r.archived_version, r.content_hash
            FROM interpretation_report_family irf
            LEFT JOIN gel_interpretation_report r ON r.ir_family_id = irf.id
            WHERE irf.ir_family_id = $1
            ORDER BY r.archived_version DESC NULLS LAST
            LIMIT 1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            None => FamilyState::NoFamily,
            Some((_, None, _)) => FamilyState::NoReport,
            Some((_, Some(version), hash)) => FamilyState::Latest {
                hash: hash.unwrap_or_default(),
                version,
            },
        })
    }

    async fn record_run(&self, summary: &RunSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO list_update (
                started_at, completed_at, sample_type, success,
                listed, added, updated, skipped, failed, skipped_entities,
                reports_added, reports_updated, failures, error
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(summary.started_at)
        .bind(summary.completed_at)
        .bind(summary.sample_type.as_str())
        .bind(summary.success)
        .bind(summary.listed as i64)
        .bind(summary.added as i64)
        .bind(summary.updated as i64)
        .bind(summary.skipped as i64)
        .bind(summary.failed as i64)
        .bind(summary.skipped_entities.len() as i64)
        .bind(serde_json::to_value(&summary.reports_added)?)
        .bind(serde_json::to_value(&summary.reports_updated)?)
        .bind(serde_json::to_value(&summary.failures)?)
        .bind(summary.error.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn lookup(
        &mut self,
        table: &'static TableSpec,
        keys: &[Vec<KeyValue>],
    ) -> Result<HashMap<Vec<KeyValue>, RecordId>> {
        let mut found = HashMap::with_capacity(keys.len());
        let key_columns = table
            .key
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ");

        for chunk in keys.chunks(rows_per_chunk(table.key.len())) {
            let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "SELECT id, {} FROM {} WHERE ({}) IN ",
                key_columns, table.name, key_columns
            ));
            query.push_tuples(chunk, |mut b, key| {
                for value in key {
                    push_key_bind(&mut b, value);
                }
            });

            let rows = query.build().fetch_all(&mut *self.tx).await?;
            for row in &rows {
                let id: RecordId = row.try_get("id")?;
                found.insert(key_from_row(table, row)?, id);
            }
        }

        debug!(table = table.name, requested = keys.len(), found = found.len(), "Looked up keys");
        Ok(found)
    }

    async fn insert(&mut self, table: &'static TableSpec, rows: &[Row]) -> Result<u64> {
        let mut written = 0;
        let columns: Vec<&str> = table
            .key
            .iter()
            .map(|c| c.name)
            .chain(table.columns.iter().copied())
            .collect();
        let key_columns = table
            .key
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ");

        for chunk in rows.chunks(rows_per_chunk(columns.len())) {
            let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                table.name,
                columns.join(", ")
            ));
            query.push_values(chunk, |mut b, row| {
                for value in &row.key {
                    push_key_bind(&mut b, value);
                }
                for value in &row.values {
                    push_value_bind(&mut b, value);
                }
            });
            query.push(format!(" ON CONFLICT ({}) DO NOTHING", key_columns));

            written += query.build().execute(&mut *self.tx).await?.rows_affected();
        }

        Ok(written)
    }

    async fn latest_report_version(&mut self, ir_family: RecordId) -> Result<Option<i64>> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(archived_version) FROM gel_interpretation_report WHERE ir_family_id = $1",
        )
        .bind(ir_family)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(version)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
