//! CellBase variant annotation client

use super::key::VariantKey;
use super::models::{AnnotationResponse, ConsequenceExtractor, VariantAnnotation};
use super::AnnotationService;
use crate::config::{CellBaseConfig, HttpConfig};
use crate::error::{IngestError, Result};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use mdt_common::GenomeBuild;
use reqwest::header::CONTENT_TYPE;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub struct CellBaseClient {
    http: reqwest::Client,
    base_url: String,
    version: String,
    species: String,
    chunk_size: usize,
    retry: RetryPolicy,
    extractor: ConsequenceExtractor,
}

impl CellBaseClient {
    pub fn new(config: &CellBaseConfig, http: &HttpConfig) -> Result<Self> {
        Self::with_client(config, http.client()?, http.retry_policy())
    }

    pub fn with_client(
        config: &CellBaseConfig,
        http: reqwest::Client,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(IngestError::Config("CellBase base URL is empty".to_string()));
        }

        Ok(Self {
            http,
            base_url: crate::http::trim_base(&config.base_url),
            version: config.version.clone(),
            species: config.species.clone(),
            chunk_size: config.chunk_size.max(1),
            retry,
            extractor: ConsequenceExtractor::new()?,
        })
    }

    fn annotation_url(&self, build: GenomeBuild) -> String {
        format!(
            "{}/webservices/rest/{}/{}/genomic/variant/annotation?assembly={}",
            self.base_url, self.version, self.species, build
        )
    }

    async fn post_once(&self, url: &str, body: &str) -> Result<AnnotationResponse> {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "text/plain")
            .body(body.to_string())
            .send()
            .await?;
        crate::http::read_json(response, url).await
    }
}

#[async_trait]
impl AnnotationService for CellBaseClient {
    async fn annotate(
        &self,
        build: GenomeBuild,
        keys: &[VariantKey],
    ) -> Result<HashMap<VariantKey, VariantAnnotation>> {
        let url = self.annotation_url(build);
        let mut annotations = HashMap::with_capacity(keys.len());
        let mut dropped = 0;

        for (chunk_idx, chunk) in keys.chunks(self.chunk_size).enumerate() {
            let by_id: HashMap<String, &VariantKey> =
                chunk.iter().map(|k| (k.to_string(), k)).collect();
            let body = chunk
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");

            debug!(%build, chunk = chunk_idx + 1, keys = chunk.len(), "Requesting annotations");
            let response = self
                .retry
                .run("cellbase_annotate", || self.post_once(&url, &body))
                .await?;

            for result in response.into_results() {
                let Some(key) = by_id.get(&result.id) else {
                    warn!(%build, id = %result.id, "Annotation result for a key that was not requested");
                    continue;
                };
                let annotation = self.extractor.extract(key, &result.result);
                dropped += annotation.dropped;
                annotations.insert((*key).clone(), annotation);
            }
        }

        info!(
            %build,
            requested = keys.len(),
            annotated = annotations.len(),
            dropped_consequences = dropped,
            "Annotated variants"
        );
        Ok(annotations)
    }
}
