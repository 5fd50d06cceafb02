//! Case source backed by a directory of saved case documents
//!
//! Each `*.json` file holds one full interpretation request as returned by
//! the CIP API. Used for test data runs and replaying archived cases.

use crate::error::{IngestError, Result};
use crate::source::{CaseSource, CaseSummary};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub struct LocalCaseSource {
    dir: PathBuf,
    documents: OnceCell<BTreeMap<String, Value>>,
}

impl LocalCaseSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            documents: OnceCell::new(),
        }
    }

    async fn documents(&self) -> Result<&BTreeMap<String, Value>> {
        self.documents
            .get_or_try_init(|| load_dir(&self.dir))
            .await
    }
}

async fn load_dir(dir: &Path) -> Result<BTreeMap<String, Value>> {
    let mut documents = BTreeMap::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let text = tokio::fs::read_to_string(&path).await?;
        let doc: Value = match serde_json::from_str(&text) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable case file");
                continue;
            },
        };

        match request_id_of(&doc) {
            Some(id) => {
                debug!(path = %path.display(), request_id = %id, "Loaded case file");
                documents.insert(id, doc);
            },
            None => warn!(path = %path.display(), "Case file has no interpretation_request_id/version"),
        }
    }

    Ok(documents)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn request_id_of(doc: &Value) -> Option<String> {
    let ir = scalar_string(doc.get("interpretation_request_id")?)?;
    let version = scalar_string(doc.get("version")?)?;
    Some(format!("{}-{}", ir, version))
}

fn summary_of(request_id: &str, doc: &Value) -> CaseSummary {
    let last_status = doc
        .get("status")
        .and_then(Value::as_array)
        .and_then(|s| s.last())
        .and_then(|s| s.get("status"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    CaseSummary {
        interpretation_request_id: request_id.to_string(),
        sample_type: doc
            .get("sample_type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        last_status,
        proband: doc.get("proband").and_then(scalar_string),
        sites: doc
            .get("sites")
            .and_then(Value::as_array)
            .map(|s| s.iter().filter_map(scalar_string).collect())
            .unwrap_or_default(),
    }
}

#[async_trait]
impl CaseSource for LocalCaseSource {
    async fn authenticate(&self) -> Result<()> {
        if !tokio::fs::try_exists(&self.dir).await? {
            return Err(IngestError::SourceUnavailable(format!(
                "case directory {} does not exist",
                self.dir.display()
            )));
        }
        Ok(())
    }

    async fn list_cases(&self) -> Result<Vec<CaseSummary>> {
        Ok(self
            .documents()
            .await?
            .iter()
            .map(|(id, doc)| summary_of(id, doc))
            .collect())
    }

    async fn fetch_case(&self, ir_id: &str, version: &str) -> Result<Value> {
        let request_id = format!("{}-{}", ir_id, version);
        self.documents()
            .await?
            .get(&request_id)
            .cloned()
            .ok_or_else(|| IngestError::Status {
                status: 404,
                url: self.dir.join(format!("{}.json", request_id)).display().to_string(),
            })
    }
}
