use crate::api::{DEFAULT_BASE_URL, DEFAULT_RELEASE_API_URL};
use crate::frpc::{DEFAULT_REPO_NAME, DEFAULT_REPO_OWNER, InstallerOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// App directory under the platform config dir.
const APP_DIR: &str = "LoliaShizuku";

pub const ENV_CENTER_API_BASE_URL: &str = "LOLIA_CENTER_API_BASE_URL";
pub const ENV_HTTP_USER_AGENT: &str = "LOLIA_HTTP_USER_AGENT";
pub const ENV_FRPC_REPO_OWNER: &str = "LOLIA_FRPC_REPO_OWNER";
pub const ENV_FRPC_REPO_NAME: &str = "LOLIA_FRPC_REPO_NAME";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub center_api_base_url: String,
    /// Explicit user agent. Falls back to `LOLIA_HTTP_USER_AGENT`, then a
    /// generated `LoliaShizuku/<version> (<os>/<arch>)`.
    pub user_agent: Option<String>,
    pub repo_owner: String,
    pub repo_name: String,
    pub release_api_url: String,
    pub data_dir: PathBuf,

    /// Per-request timeout for center API calls.
    pub http_timeout_secs: u64,
    pub status_timeout_secs: u64,
    pub download_timeout_secs: u64,
    /// Deadline for a whole install, download included.
    pub install_timeout_secs: u64,

    /// Trust the compiled-in hash table when a release has no digest.
    pub builtin_digests: bool,
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".lolia-shizuku"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            center_api_base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: None,
            repo_owner: DEFAULT_REPO_OWNER.to_string(),
            repo_name: DEFAULT_REPO_NAME.to_string(),
            release_api_url: DEFAULT_RELEASE_API_URL.to_string(),
            data_dir: app_dir().join("userdata"),
            http_timeout_secs: 20,
            status_timeout_secs: 20,
            download_timeout_secs: 120,
            install_timeout_secs: 300,
            builtin_digests: true,
        }
    }
}

impl Config {
    /// Path to the config file.
    pub fn path() -> PathBuf {
        app_dir().join("config.toml")
    }

    /// Load the config file (defaults when missing), then apply environment
    /// overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&Self::path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Apply `LOLIA_*` overrides. Blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = get(ENV_CENTER_API_BASE_URL) {
            self.center_api_base_url = url;
        }
        if self.user_agent.is_none() {
            self.user_agent = get(ENV_HTTP_USER_AGENT);
        }
        if let Some(owner) = get(ENV_FRPC_REPO_OWNER) {
            self.repo_owner = owner;
        }
        if let Some(name) = get(ENV_FRPC_REPO_NAME) {
            self.repo_name = name;
        }
        self.center_api_base_url = self
            .center_api_base_url
            .trim()
            .trim_end_matches('/')
            .to_string();
    }

    #[must_use]
    pub fn user_agent(&self) -> String {
        match self.user_agent.as_deref().map(str::trim) {
            Some(ua) if !ua.is_empty() => ua.to_string(),
            _ => format!(
                "LoliaShizuku/{} ({}/{})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
        }
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Saved login token.
    #[must_use]
    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join("token.json")
    }

    #[must_use]
    pub fn installer_options(&self) -> InstallerOptions {
        InstallerOptions {
            data_dir: self.data_dir.clone(),
            repo_owner: self.repo_owner.clone(),
            repo_name: self.repo_name.clone(),
            user_agent: self.user_agent(),
            builtin_digests: self.builtin_digests,
            status_timeout: Duration::from_secs(self.status_timeout_secs),
            download_timeout: Duration::from_secs(self.download_timeout_secs),
            install_timeout: Duration::from_secs(self.install_timeout_secs),
        }
    }
}
