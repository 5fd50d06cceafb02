//! Token session for the CIP API
//!
//! The session owns the credentials and the current token with its expiry.
//! A token is obtained lazily, reused until it expires, and dropped by
//! [`CipSession::invalidate`] when the API answers 401.

use crate::config::CipConfig;
use crate::error::{IngestError, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

pub struct CipSession {
    token_url: String,
    username: String,
    password: String,
    ttl: Duration,
    current: Mutex<Option<AccessToken>>,
}

impl CipSession {
    pub fn new(config: &CipConfig) -> Self {
        Self {
            token_url: format!("{}/get-token/", crate::http::trim_base(&config.base_url)),
            username: config.username.clone(),
            password: config.password.clone(),
            ttl: Duration::from_secs(config.token_ttl_secs),
            current: Mutex::new(None),
        }
    }

    /// Current token, exchanging credentials first if none is live
    pub async fn token(&self, http: &reqwest::Client) -> Result<String> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
            debug!("CIP token expired");
        }

        let value = self.exchange(http).await?;
        *current = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        Ok(value)
    }

    /// Forget the cached token so the next call re-authenticates
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    pub async fn has_token(&self) -> bool {
        self.current.lock().await.is_some()
    }

    async fn exchange(&self, http: &reqwest::Client) -> Result<String> {
        info!(url = %self.token_url, "Requesting CIP API token");

        let response = http
            .post(&self.token_url)
            .json(&json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(IngestError::Authentication(format!(
                    "token exchange rejected with status {}",
                    response.status()
                )));
            },
            _ => {},
        }

        let parsed: TokenResponse = crate::http::read_json(response, &self.token_url).await?;
        if parsed.token.is_empty() {
            return Err(IngestError::Authentication(
                "token exchange returned no token".to_string(),
            ));
        }
        Ok(parsed.token)
    }
}
