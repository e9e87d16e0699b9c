//! Public release index client (GitHub-compatible `releases/latest`).

use super::error::{ApiError, ApiStatus, extract_error_message};
use super::types::Release;
use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

/// Default release index.
pub const DEFAULT_RELEASE_API_URL: &str = "https://api.github.com";

const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";

/// Unauthenticated client for release lookups.
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl ReleaseClient {
    pub fn new(base_url: &str, user_agent: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        headers
    }

    /// Fetch the latest published release of `owner/repo`.
    pub async fn latest_release(&self, owner: &str, repo: &str) -> Result<Release, ApiError> {
        let path = format!("/repos/{owner}/{repo}/releases/latest");
        let url = format!("{}{path}", self.base_url);

        tracing::debug!(%url, "Fetching latest release");
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| ApiError::transport(&Method::GET, &path, e))?;

        let http_status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(&Method::GET, &path, e))?;

        if !http_status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            let message = serde_json::from_slice::<serde_json::Value>(&bytes)
                .ok()
                .and_then(|v| extract_error_message(&v))
                .unwrap_or_else(|| text.trim().to_string());
            return Err(ApiError::Status(ApiStatus {
                path,
                http_status: http_status.as_u16(),
                code: 0,
                message,
            }));
        }

        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode { path, source })
    }
}
