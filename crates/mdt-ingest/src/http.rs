//! Response decoding shared by the external service clients

use crate::error::{IngestError, Result};
use serde::de::DeserializeOwned;

/// Check the status and decode a JSON body, classifying failures so the
/// retry policy can tell transient faults from permanent ones
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    url: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| IngestError::InvalidResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
