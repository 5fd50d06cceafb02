//! Gene panel metadata from PanelApp

use crate::config::{HttpConfig, PanelAppConfig};
use crate::error::{IngestError, Result};
use crate::resolve::gene_key;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// PanelApp's placeholder for "no Ensembl id"
const MISSING_ENSEMBL_ID: &str = "E";

#[derive(Debug, Clone, PartialEq)]
pub struct PanelGene {
    pub symbol: String,
    pub ensembl_id: Option<String>,
    pub level_of_confidence: Option<String>,
}

impl PanelGene {
    pub fn gene_key(&self) -> String {
        gene_key(self.ensembl_id.as_deref(), &self.symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelInfo {
    pub panel_id: String,
    pub version: String,
    pub name: Option<String>,
    pub disease_group: Option<String>,
    pub disease_subgroup: Option<String>,
    pub genes: Vec<PanelGene>,
}

#[async_trait]
pub trait PanelSource: Send + Sync {
    async fn fetch_panel(&self, panel_id: &str, version: Option<&str>) -> Result<PanelInfo>;
}

#[derive(Debug, Deserialize)]
struct PanelResponse {
    result: RawPanel,
}

#[derive(Debug, Deserialize)]
struct RawPanel {
    #[serde(default, deserialize_with = "crate::serde_helpers::optional_string_or_number")]
    version: Option<String>,
    #[serde(rename = "SpecificDiseaseName", default)]
    specific_disease_name: Option<String>,
    #[serde(rename = "DiseaseGroup", default)]
    disease_group: Option<String>,
    #[serde(rename = "DiseaseSubGroup", default)]
    disease_subgroup: Option<String>,
    #[serde(rename = "Genes", default, deserialize_with = "crate::serde_helpers::null_default")]
    genes: Vec<RawPanelGene>,
}

#[derive(Debug, Deserialize)]
struct RawPanelGene {
    #[serde(rename = "GeneSymbol")]
    gene_symbol: String,
    /// A string, a list of strings, null, or the `"E"` placeholder
    #[serde(rename = "EnsembleGeneIds", default)]
    ensembl_gene_ids: Value,
    #[serde(rename = "LevelOfConfidence", default)]
    level_of_confidence: Option<String>,
}

fn first_ensembl_id(ids: &Value) -> Option<String> {
    let id = match ids {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }?;
    let id = id.trim();
    (!id.is_empty() && id != MISSING_ENSEMBL_ID).then(|| id.to_string())
}

impl RawPanel {
    fn into_info(self, panel_id: &str, requested: Option<&str>) -> Result<PanelInfo> {
        let version = self
            .version
            .or_else(|| requested.map(String::from))
            .ok_or_else(|| IngestError::InvalidResponse {
                url: format!("panelapp:{}", panel_id),
                message: "panel has no version".to_string(),
            })?;

        Ok(PanelInfo {
            panel_id: panel_id.to_string(),
            version,
            name: self.specific_disease_name,
            disease_group: self.disease_group,
            disease_subgroup: self.disease_subgroup,
            genes: self
                .genes
                .into_iter()
                .map(|g| PanelGene {
                    ensembl_id: first_ensembl_id(&g.ensembl_gene_ids),
                    symbol: g.gene_symbol,
                    level_of_confidence: g.level_of_confidence,
                })
                .collect(),
        })
    }
}

pub struct PanelAppClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl PanelAppClient {
    pub fn new(config: &PanelAppConfig, http: &HttpConfig) -> Result<Self> {
        Ok(Self::with_client(config, http.client()?, http.retry_policy()))
    }

    pub fn with_client(config: &PanelAppConfig, http: reqwest::Client, retry: RetryPolicy) -> Self {
        Self {
            http,
            base_url: crate::http::trim_base(&config.base_url),
            retry,
        }
    }

    async fn get_once(&self, url: &str) -> Result<PanelResponse> {
        let response = self.http.get(url).send().await?;
        crate::http::read_json(response, url).await
    }
}

#[async_trait]
impl PanelSource for PanelAppClient {
    async fn fetch_panel(&self, panel_id: &str, version: Option<&str>) -> Result<PanelInfo> {
        let mut url = format!("{}/get_panel/{}/", self.base_url, panel_id);
        if let Some(version) = version {
            url.push_str(&format!("?version={}", version));
        }

        let response = self.retry.run("panelapp_get", || self.get_once(&url)).await?;
        let info = response.result.into_info(panel_id, version)?;
        debug!(panel_id, version = %info.version, genes = info.genes.len(), "Fetched panel");
        Ok(info)
    }
}

/// Memoizes panels for the length of a run
pub struct PanelCache {
    source: Arc<dyn PanelSource>,
    panels: Mutex<HashMap<(String, Option<String>), Arc<PanelInfo>>>,
}

impl PanelCache {
    pub fn new(source: Arc<dyn PanelSource>) -> Self {
        Self {
            source,
            panels: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, panel_id: &str, version: Option<&str>) -> Result<Arc<PanelInfo>> {
        let key = (panel_id.to_string(), version.map(String::from));
        if let Some(panel) = self.panels.lock().await.get(&key) {
            return Ok(Arc::clone(panel));
        }

        let panel = Arc::new(self.source.fetch_panel(panel_id, version).await?);
        self.panels.lock().await.insert(key, Arc::clone(&panel));
        Ok(panel)
    }

    pub async fn len(&self) -> usize {
        self.panels.lock().await.len()
    }

    pub async fn log_stats(&self) {
        info!(panels = self.len().await, "Panel cache");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_first_ensembl_id() {
        assert_eq!(first_ensembl_id(&json!("ENSG1")), Some("ENSG1".to_string()));
        assert_eq!(first_ensembl_id(&json!(["ENSG2", "ENSG3"])), Some("ENSG2".to_string()));
        assert_eq!(first_ensembl_id(&json!("E")), None);
        assert_eq!(first_ensembl_id(&json!([])), None);
        assert_eq!(first_ensembl_id(&Value::Null), None);
    }

    #[test]
    fn test_panel_response_parsing() {
        let response: PanelResponse = serde_json::from_value(json!({"result": {
            "version": "1.2",
            "SpecificDiseaseName": "Intellectual disability",
            "DiseaseGroup": "Neurology",
            "DiseaseSubGroup": "Neurodevelopmental",
            "Genes": [
                {"GeneSymbol": "ARX", "EnsembleGeneIds": ["ENSG00000004848"], "LevelOfConfidence": "HighEvidence"},
                {"GeneSymbol": "NEWGENE", "EnsembleGeneIds": "E", "LevelOfConfidence": "LowEvidence"}
            ]
        }}))
        .unwrap();

        let info = response.result.into_info("245", Some("1.2")).unwrap();
        assert_eq!(info.version, "1.2");
        assert_eq!(info.name.as_deref(), Some("Intellectual disability"));
        assert_eq!(info.genes[0].gene_key(), "ENSG00000004848");
        assert_eq!(info.genes[1].gene_key(), "HGNC:NEWGENE");
    }

    struct CountingSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PanelSource for CountingSource {
        async fn fetch_panel(&self, panel_id: &str, version: Option<&str>) -> Result<PanelInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PanelInfo {
                panel_id: panel_id.to_string(),
                version: version.unwrap_or("1.0").to_string(),
                name: None,
                disease_group: None,
                disease_subgroup: None,
                genes: vec![],
            })
        }
    }

    #[tokio::test]
    async fn test_cache_fetches_each_panel_once() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
        });
        let cache = PanelCache::new(source.clone());

        cache.get("245", Some("1.2")).await.unwrap();
        cache.get("245", Some("1.2")).await.unwrap();
        cache.get("245", Some("1.3")).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len().await, 2);
    }
}
