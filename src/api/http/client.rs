//! Authenticated JSON client for the center API.

use super::envelope::Payload;
use crate::api::error::{ApiError, ApiStatus};
use crate::auth::CredentialProvider;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters. Pairs with blank values are not sent.
pub type Query<'a> = &'a [(&'a str, String)];

/// HTTP client that speaks the `{code, msg, data}` envelope.
pub struct EnvelopeClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
    credentials: Option<Arc<dyn CredentialProvider>>,
}

impl std::fmt::Debug for EnvelopeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeClient")
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

impl EnvelopeClient {
    /// Create a client. `timeout` bounds each whole request.
    pub fn new(base_url: &str, user_agent: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
            credentials: None,
        }
    }

    /// Attach a credential provider, consulted once per request.
    #[must_use]
    pub fn with_credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str, query: Query<'_>) -> Result<Url, ApiError> {
        let mut url =
            Url::parse(&format!("{}{path}", self.base_url)).map_err(|e| ApiError::InvalidUrl {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        for (key, value) in query {
            if value.trim().is_empty() {
                continue;
            }
            pairs.retain(|(existing, _)| existing != key);
            pairs.push(((*key).to_string(), value.clone()));
        }

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(&pairs);
        }
        Ok(url)
    }

    /// Build headers including authentication.
    async fn build_headers(&self, has_body: bool) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if has_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        }

        if let Some(provider) = &self.credentials {
            let token = provider
                .access_token()
                .await
                .map_err(|e| ApiError::Credentials(format!("{e:#}")))?;
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ApiError::Credentials("Bearer token contains invalid header characters".into())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Send a request and decode its result into `T`.
    ///
    /// Returns `Ok(None)` when the response carries no data (`data` absent or
    /// `null`, or an empty body).
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Query<'_>,
        body: Option<&serde_json::Value>,
    ) -> Result<Option<T>, ApiError> {
        let payload = self.send(method, path, query, body).await?;
        payload.decode().map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Query<'_>,
    ) -> Result<Option<T>, ApiError> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<Option<T>, ApiError> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: Query<'_>,
        body: Option<&serde_json::Value>,
    ) -> Result<Payload, ApiError> {
        let url = self.build_url(path, query)?;
        let encoded = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|source| ApiError::Encode {
                path: path.to_string(),
                source,
            })?;
        // Token lookup happens before anything touches the network.
        let headers = self.build_headers(encoded.is_some()).await?;

        debug!(%method, path, "Sending API request");
        let mut request = self.client.request(method.clone(), url).headers(headers);
        if let Some(encoded) = encoded {
            request = request.body(encoded);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::transport(&method, path, e))?;
        let http_status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(&method, path, e))?;

        let payload = Payload::parse(&bytes);
        let code = payload.business_code();
        let status = || ApiStatus {
            path: path.to_string(),
            http_status: http_status.as_u16(),
            code,
            message: payload.message(),
        };

        if is_auth_failure(http_status, code) {
            warn!(path, http_status = http_status.as_u16(), code, "API request unauthorized");
            if let Some(provider) = &self.credentials
                && let Err(e) = provider.on_unauthorized().await
            {
                warn!(error = %e, "Unauthorized notification failed");
            }
            return Err(ApiError::Unauthorized(status()));
        }

        if !http_status.is_success() || (code != 0 && code != 200) {
            debug!(path, http_status = http_status.as_u16(), code, "API request failed");
            return Err(ApiError::Status(status()));
        }

        Ok(payload)
    }
}

fn is_auth_failure(http_status: StatusCode, code: i64) -> bool {
    matches!(http_status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || code == 401
        || code == 403
}
