// ── Cloud proxy client ───────────────────────────────────────────────────────
// The local side of the out-of-scope cloud analyzer contract: three request
// shapes over a configured HTTPS base URL. Every call here is meant to be
// wrapped by the caller in a fallback to the local analyzer — this client
// only reports what happened, it never falls back itself.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sidecar_core::error::{SidecarError, SidecarResult};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Serialize)]
pub struct CloudAnalyzeRequest<'a> {
    pub text: &'a str,
    pub source_identifier: Option<&'a str>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CloudAnalyzeResponse {
    pub is_threat: bool,
    pub threat_type: Option<String>,
    pub risk_score: i64,
    pub confidence: f64,
    #[serde(default)]
    pub matched_rules: Vec<Value>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CloudCredentialValidation {
    pub valid: bool,
    pub user_email: Option<String>,
}

pub struct CloudClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CloudClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> SidecarResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(SidecarError::Network)?;
        Ok(Self { http, base_url: base_url.into(), api_key: api_key.into() })
    }

    /// `POST {base}/v1/analyze` — analyzes a single piece of text.
    pub async fn analyze(&self, text: &str, source_identifier: Option<&str>) -> SidecarResult<CloudAnalyzeResponse> {
        self.post_bearer("/v1/analyze", &CloudAnalyzeRequest { text, source_identifier }).await
    }

    /// `POST {base}/v1/threat-analytics` — the cloud-compatible analytics
    /// surface mirrored by the local `/api/threat-analytics/` endpoint.
    pub async fn threat_analytics(&self, text: &str, source_identifier: Option<&str>) -> SidecarResult<CloudAnalyzeResponse> {
        self.post_bearer("/v1/threat-analytics", &CloudAnalyzeRequest { text, source_identifier }).await
    }

    /// `GET {base}/v1/rules` — fetches the community rule set the cloud
    /// account has access to, keyed by `X-Api-Key` rather than `Bearer`.
    pub async fn rules(&self) -> SidecarResult<Value> {
        let url = format!("{}/v1/rules", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(SidecarError::Network)?;
        Self::into_body(response).await
    }

    /// Validates `api_key` against `base_url` without persisting anything —
    /// the settings endpoint uses this before writing credentials to the
    /// vault.
    pub async fn validate_credentials(base_url: &str, api_key: &str) -> SidecarResult<CloudCredentialValidation> {
        let client = Self::new(base_url, api_key)?;
        let url = format!("{}/v1/account", client.base_url.trim_end_matches('/'));
        let response = client
            .http
            .get(&url)
            .header("X-Api-Key", &client.api_key)
            .send()
            .await
            .map_err(SidecarError::Network)?;
        Self::into_body(response).await
    }

    async fn post_bearer<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> SidecarResult<R> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(SidecarError::Network)?;
        Self::into_body(response).await
    }

    async fn into_body<R: DeserializeOwned>(response: reqwest::Response) -> SidecarResult<R> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SidecarError::upstream(status.as_u16(), body));
        }
        response.json::<R>().await.map_err(SidecarError::Network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_sets_fixed_timeout_without_panicking() {
        let client = CloudClient::new("https://cloud.example.com", "sk-test");
        assert!(client.is_ok());
    }
}
