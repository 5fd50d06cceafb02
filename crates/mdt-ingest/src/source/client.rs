//! HTTP client for the CIP interpretation-request API

use crate::config::{CipConfig, HttpConfig};
use crate::error::{IngestError, Result};
use crate::retry::RetryPolicy;
use crate::source::models::ListPage;
use crate::source::{CaseSource, CaseSummary, CipSession};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Hard stop for runaway pagination
const MAX_PAGES: u32 = 10_000;

pub struct CipClient {
    http: reqwest::Client,
    base_url: String,
    auth_scheme: String,
    session: CipSession,
    retry: RetryPolicy,
}

impl CipClient {
    pub fn new(config: &CipConfig, http: &HttpConfig) -> Result<Self> {
        Self::with_client(config, http.client()?, http.retry_policy())
    }

    pub fn with_client(
        config: &CipConfig,
        http: reqwest::Client,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(IngestError::Config("CIP API base URL is empty".to_string()));
        }

        Ok(Self {
            http,
            base_url: crate::http::trim_base(&config.base_url),
            auth_scheme: config.auth_scheme.clone(),
            session: CipSession::new(config),
            retry,
        })
    }

    pub fn session(&self) -> &CipSession {
        &self.session
    }

    pub async fn list_page(&self, page: u32) -> Result<ListPage> {
        let url = format!("{}/interpretation-request?page={}", self.base_url, page);
        self.get_json(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.retry
            .run("cip_get", || self.get_json_once(url))
            .await
    }

    /// One GET with a single re-authentication on 401
    async fn get_json_once<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut reauthenticated = false;

        loop {
            let token = self.session.token(&self.http).await?;
            let response = self
                .http
                .get(url)
                .header(AUTHORIZATION, format!("{} {}", self.auth_scheme, token))
                .send()
                .await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                if reauthenticated {
                    return Err(IngestError::Authentication(format!(
                        "request to {} still unauthorized after refreshing token",
                        url
                    )));
                }
                warn!(url, "CIP API returned 401, refreshing token");
                self.session.invalidate().await;
                reauthenticated = true;
                continue;
            }

            return crate::http::read_json(response, url).await;
        }
    }
}

#[async_trait]
impl CaseSource for CipClient {
    async fn authenticate(&self) -> Result<()> {
        self.retry
            .run("cip_token", || self.session.token(&self.http))
            .await?;
        Ok(())
    }

    async fn list_cases(&self) -> Result<Vec<CaseSummary>> {
        let mut cases = Vec::new();

        for page in 1..=MAX_PAGES {
            let listing = self.list_page(page).await?;
            let fetched = listing.results.len();
            debug!(page, fetched, total = listing.count, "Fetched listing page");
            let has_next = listing.has_next();
            cases.extend(listing.results);

            if !has_next || fetched == 0 {
                break;
            }
        }

        info!(cases = cases.len(), "Listed interpretation requests");
        Ok(cases)
    }

    async fn fetch_case(&self, ir_id: &str, version: &str) -> Result<Value> {
        let url = format!(
            "{}/interpretation-request/{}/{}",
            self.base_url, ir_id, version
        );
        self.get_json(&url).await
    }
}
