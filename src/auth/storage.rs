//! File-backed access token storage.

use super::CredentialProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Stored token set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredToken {
    /// Access token for API calls.
    pub access_token: String,
    /// Refresh token, kept for the login flow that issued it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Token expiration timestamp (milliseconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl StoredToken {
    /// Check if the access token is expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        let Some(expires_at) = self.expires_at else {
            return false;
        };

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        now >= expires_at
    }
}

/// Token file at `<data_dir>/token.json`.
///
/// Refreshing is the login flow's job; an expired token is reported as an
/// error so the user logs in again.
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let token: StoredToken = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(token))
    }

    pub fn save(&self, token: &StoredToken) -> Result<()> {
        let dir = self
            .path
            .parent()
            .context("Token path has no parent directory")?;
        fs::create_dir_all(dir)?;

        let content = serde_json::to_string_pretty(token)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(tmp.path(), permissions)?;
        }

        tmp.persist(&self.path)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CredentialProvider for TokenFile {
    async fn access_token(&self) -> Result<String> {
        let token = self
            .load()?
            .filter(|t| !t.access_token.trim().is_empty())
            .context("Not logged in. Run 'shizuku login --token <TOKEN>' first.")?;

        if token.is_expired() {
            anyhow::bail!("Access token expired. Please log in again.");
        }
        Ok(token.access_token)
    }

    async fn on_unauthorized(&self) -> Result<()> {
        self.clear()
    }
}
