//! Access credentials for the center API.
//!
//! The HTTP layer only sees the [`CredentialProvider`] trait. Where tokens come
//! from (browser login, keyring, a file) is up to the host.

mod storage;

pub use storage::{StoredToken, TokenFile};

use anyhow::Result;
use async_trait::async_trait;

/// Environment variable holding a bearer token for [`StaticToken::from_env`].
pub const ACCESS_TOKEN_ENV: &str = "LOLIA_ACCESS_TOKEN";

/// Supplies bearer tokens and is told when the server rejects them.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Get a current access token. Called once per request.
    async fn access_token(&self) -> Result<String>;

    /// The server answered 401/403. Best-effort; errors are only logged.
    async fn on_unauthorized(&self) -> Result<()>;
}

/// A fixed token, typically from the environment.
pub struct StaticToken {
    token: String,
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToken")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read `LOLIA_ACCESS_TOKEN`. Returns `None` when unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Self::new)
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        if self.token.trim().is_empty() {
            anyhow::bail!("access token is empty");
        }
        Ok(self.token.clone())
    }

    async fn on_unauthorized(&self) -> Result<()> {
        tracing::warn!("Access token from environment was rejected by the server");
        Ok(())
    }
}
