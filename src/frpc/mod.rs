//! Tunnel client release installer.
//!
//! Resolves the latest release for this platform, downloads and verifies the
//! asset, swaps the binary in atomically and records what was installed.
//! At most one install runs at a time; a second caller gets
//! [`InstallError::InProgress`].

mod archive;
mod digest;
mod download;
mod error;
mod platform;
mod state;
mod version;

pub use digest::{builtin_sha256, parse_sha256_digest};
pub use error::InstallError;
pub use platform::{Arch, ArchiveFormat, Os, Platform};
pub use state::{FrpcPaths, InstallState, Settings, apply_mirror, normalize_mirror_url};
pub use version::{UNKNOWN_VERSION, is_update_available, normalize_installed, normalize_tag};

use crate::api::ReleaseClient;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default owner/name of the release repository.
pub const DEFAULT_REPO_OWNER: &str = "Lolia-FRP";
pub const DEFAULT_REPO_NAME: &str = "lolia-frp";

/// Build a command for a helper process that must not open a console window.
pub(crate) fn background_command(program: &Path) -> tokio::process::Command {
    #[allow(unused_mut)]
    let mut command = tokio::process::Command::new(program);
    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }
    command
}

/// The asset selected for this platform from a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
    pub content_type: String,
    pub size: i64,
    /// Digest as advertised by the release index.
    pub digest: String,
    /// Expected hash; empty when neither the index nor the builtin table knows it.
    pub sha256: String,
    pub os: Os,
    pub arch: Arch,
    pub archive_format: ArchiveFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
    pub name: String,
    pub html_url: String,
    pub published_at: String,
    pub asset: ReleaseAsset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledInfo {
    pub version: String,
    pub asset_name: String,
    pub sha256: String,
    pub installed_at: String,
    pub binary_path: PathBuf,
    pub binary_exists: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrpcStatus {
    pub platform: Platform,
    pub paths: FrpcPaths,
    pub mirror_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed: Option<InstalledInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<ReleaseInfo>,
    pub update_available: bool,
    /// Why the latest release could not be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallResult {
    pub release: ReleaseInfo,
    pub status: FrpcStatus,
}

/// Installer configuration.
#[derive(Debug, Clone)]
pub struct InstallerOptions {
    /// App-scoped data directory; the installer owns `<data_dir>/frpc`.
    pub data_dir: PathBuf,
    pub repo_owner: String,
    pub repo_name: String,
    pub user_agent: String,
    /// Fall back to compiled-in hashes when a release omits a digest.
    pub builtin_digests: bool,
    pub status_timeout: Duration,
    pub download_timeout: Duration,
    pub install_timeout: Duration,
}

pub struct Installer {
    releases: ReleaseClient,
    http: reqwest::Client,
    platform: Platform,
    paths: FrpcPaths,
    options: InstallerOptions,
    active: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("platform", &self.platform)
            .field("paths", &self.paths)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

/// Clears the in-flight slot when an install ends, however it ends.
struct ActiveGuard<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Installer {
    /// Installer for the platform this binary runs on.
    pub fn new(releases: ReleaseClient, options: InstallerOptions) -> Result<Self, InstallError> {
        Ok(Self::for_platform(releases, options, Platform::current()?))
    }

    #[must_use]
    pub fn for_platform(releases: ReleaseClient, options: InstallerOptions, platform: Platform) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            releases,
            http,
            paths: FrpcPaths::new(&options.data_dir, &platform),
            platform,
            options,
            active: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn paths(&self) -> &FrpcPaths {
        &self.paths
    }

    #[must_use]
    pub fn binary_path(&self) -> &Path {
        &self.paths.binary_path
    }

    /// Whether an install is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Local install status plus, best-effort, the latest release.
    pub async fn get_status(&self) -> Result<FrpcStatus, InstallError> {
        let latest =
            match tokio::time::timeout(self.options.status_timeout, self.resolve_latest()).await {
                Ok(Ok(release)) => Ok(release),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(InstallError::TimedOut.to_string()),
            };
        if let Err(e) = &latest {
            debug!(error = %e, "Latest release unavailable");
        }
        self.build_status(latest).await
    }

    /// Download, verify and install the latest release.
    ///
    /// Cancellation and the install deadline are honoured up to the point the
    /// new binary is renamed into place. The slot stays busy until the
    /// extraction thread has finished, so a canceled install never touches
    /// `bin/` after it returns.
    pub async fn install_or_update(&self) -> Result<InstallResult, InstallError> {
        let (token, _guard) = self.begin()?;
        let deadline = Instant::now() + self.options.install_timeout;

        let result = self.run_install(&token, deadline).await;
        if let Err(e) = &result
            && e.is_interrupted()
        {
            info!(error = %e, "Install interrupted");
        }
        result
    }

    /// Cancel the in-flight install. Returns whether there was one.
    pub fn cancel(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Delete the installed binary and install state. Missing files are fine.
    pub fn remove(&self) -> Result<(), InstallError> {
        state::remove_if_exists(&self.paths.binary_path)?;
        state::remove_if_exists(&self.paths.state_path)?;
        info!(path = %self.paths.binary_path.display(), "Removed tunnel client");
        Ok(())
    }

    pub fn mirror_url(&self) -> Result<String, InstallError> {
        Ok(self.load_settings()?.mirror_url.trim().to_string())
    }

    /// Validate and store a mirror URL; blank clears it. Returns the stored value.
    pub fn set_mirror_url(&self, raw: &str) -> Result<String, InstallError> {
        let mirror = normalize_mirror_url(raw)?;
        let mut settings = self.load_settings()?;
        settings.mirror_url.clone_from(&mirror);
        state::write_json_atomic(&self.paths.settings_path, &settings)?;
        info!(mirror = %mirror, "Updated download mirror");
        Ok(mirror)
    }

    fn load_settings(&self) -> Result<Settings, InstallError> {
        Ok(state::read_json(&self.paths.settings_path)?.unwrap_or_default())
    }

    fn begin(&self) -> Result<(CancellationToken, ActiveGuard<'_>), InstallError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.is_some() {
            return Err(InstallError::InProgress);
        }
        let token = CancellationToken::new();
        *active = Some(token.clone());
        Ok((token, ActiveGuard { slot: &self.active }))
    }

    /// Latest release with this platform's asset selected.
    pub async fn resolve_latest(&self) -> Result<ReleaseInfo, InstallError> {
        let release = self
            .releases
            .latest_release(&self.options.repo_owner, &self.options.repo_name)
            .await?;

        let asset_name = self.platform.asset_name();
        let selected = release
            .assets
            .iter()
            .find(|a| a.name.trim().eq_ignore_ascii_case(&asset_name))
            .ok_or_else(|| InstallError::AssetNotFound {
                asset: asset_name.clone(),
            })?;

        let sha256 = digest::expected_sha256(
            &asset_name,
            &selected.digest,
            self.options.builtin_digests,
        )
        .unwrap_or_default();

        Ok(ReleaseInfo {
            tag_name: release.tag_name.clone(),
            name: release.name.clone(),
            html_url: release.html_url.clone(),
            published_at: release.published_at.clone(),
            asset: ReleaseAsset {
                name: selected.name.trim().to_string(),
                download_url: selected.browser_download_url.clone(),
                content_type: selected.content_type.clone(),
                size: selected.size,
                digest: selected.digest.clone(),
                sha256,
                os: self.platform.os,
                arch: self.platform.arch,
                archive_format: self.platform.archive_format(),
            },
        })
    }

    async fn run_install(
        &self,
        token: &CancellationToken,
        deadline: Instant,
    ) -> Result<InstallResult, InstallError> {
        let latest = interruptible(token, deadline, self.resolve_latest())
            .await
            .map_err(|e| match e {
                InstallError::Release(api) if api.is_timeout() => InstallError::TimedOut,
                e => e,
            })?;
        let asset = &latest.asset;
        info!(tag = %latest.tag_name, asset = %asset.name, "Resolved latest release");

        if asset.sha256.is_empty() {
            return Err(InstallError::MissingDigest {
                asset: asset.name.clone(),
            });
        }

        self.paths.ensure_dirs()?;
        let mirror = self.mirror_url()?;
        let url = apply_mirror(&asset.download_url, &mirror);
        // Local name comes from the platform, never from the remote asset name.
        let archive_path = self.paths.download_dir.join(self.platform.asset_name());

        let actual = interruptible(
            token,
            deadline,
            download::download_archive(&self.http, &url, &archive_path, self.options.download_timeout),
        )
        .await?;
        if !actual.eq_ignore_ascii_case(&asset.sha256) {
            if let Err(e) = state::remove_if_exists(&archive_path) {
                warn!(error = %e, "Failed to remove rejected archive");
            }
            return Err(InstallError::ChecksumMismatch {
                asset: asset.name.clone(),
                expected: asset.sha256.clone(),
                actual,
            });
        }
        debug!(sha256 = %actual, "Checksum verified");

        if let Err(e) = self.extract(&archive_path, &asset.name, token, deadline).await {
            if let Err(cleanup) = state::remove_if_exists(&archive_path) {
                warn!(error = %cleanup, "Failed to remove archive");
            }
            return Err(e);
        }
        // The new binary is in place; what follows records it and is not
        // interrupted.
        info!(path = %self.paths.binary_path.display(), "Installed tunnel client binary");

        let version = version::probe_version(&self.paths.binary_path, version::PROBE_TIMEOUT)
            .await
            .unwrap_or_else(|| latest.tag_name.clone());
        let install_state = InstallState {
            version,
            asset_name: asset.name.clone(),
            sha256: actual,
            installed_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        };
        state::write_json_atomic(&self.paths.state_path, &install_state)?;
        state::remove_if_exists(&archive_path)?;
        info!(version = %install_state.version, "Recorded install state");

        let status = self.build_status(Ok(latest.clone())).await?;
        Ok(InstallResult {
            release: latest,
            status,
        })
    }

    /// Extract the binary on a blocking thread. Always waits for that thread;
    /// cancel or deadline only stop it before the final rename.
    async fn extract(
        &self,
        archive_path: &Path,
        asset_name: &str,
        token: &CancellationToken,
        deadline: Instant,
    ) -> Result<(), InstallError> {
        let stop = token.child_token();
        let mut task = {
            let archive_path = archive_path.to_path_buf();
            let binary_path = self.paths.binary_path.clone();
            let binary_name = self.platform.binary_name();
            let format = self.platform.archive_format();
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || {
                archive::extract_binary(&archive_path, format, binary_name, &binary_path, &stop)
            })
        };

        let mut timed_out = false;
        let joined = tokio::select! {
            joined = &mut task => joined,
            () = tokio::time::sleep_until(deadline) => {
                timed_out = true;
                stop.cancel();
                task.await
            }
        };

        match joined {
            Ok(Err(InstallError::Cancelled)) if timed_out => Err(InstallError::TimedOut),
            Ok(result) => result,
            Err(e) => Err(InstallError::Archive {
                asset: asset_name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// What is installed, from the state file and the binary on disk.
    pub async fn installed(&self) -> Result<Option<InstalledInfo>, InstallError> {
        let binary_path = &self.paths.binary_path;
        let binary_exists = state::file_exists(binary_path)?;
        let recorded: Option<InstallState> = state::read_json(&self.paths.state_path)?;

        let Some(recorded) = recorded else {
            if !binary_exists {
                return Ok(None);
            }
            let version = version::probe_version(binary_path, version::PROBE_TIMEOUT)
                .await
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
            return Ok(Some(InstalledInfo {
                version,
                asset_name: String::new(),
                sha256: String::new(),
                installed_at: String::new(),
                binary_path: binary_path.clone(),
                binary_exists,
            }));
        };

        let mut version = recorded.version.trim().to_string();
        if version.is_empty() {
            version = UNKNOWN_VERSION.to_string();
        }
        if binary_exists
            && version == UNKNOWN_VERSION
            && let Some(probed) = version::probe_version(binary_path, version::PROBE_TIMEOUT).await
        {
            version = probed;
        }

        Ok(Some(InstalledInfo {
            version,
            asset_name: recorded.asset_name,
            sha256: recorded.sha256.trim().to_ascii_lowercase(),
            installed_at: recorded.installed_at,
            binary_path: binary_path.clone(),
            binary_exists,
        }))
    }

    async fn build_status(
        &self,
        latest: Result<ReleaseInfo, String>,
    ) -> Result<FrpcStatus, InstallError> {
        let installed = self.installed().await?;
        let mirror_url = self.mirror_url().unwrap_or_default();

        let (latest, latest_error) = match latest {
            Ok(release) => (Some(release), None),
            Err(e) => (None, Some(e)),
        };
        let update_available = is_update_available(
            installed.as_ref().map(|i| i.version.as_str()),
            latest.as_ref().map(|l| l.tag_name.as_str()),
        );

        Ok(FrpcStatus {
            platform: self.platform,
            paths: self.paths.clone(),
            mirror_url,
            installed,
            latest,
            update_available,
            latest_error,
        })
    }
}

/// Run an install step unless the install is canceled or out of time first.
async fn interruptible<T>(
    token: &CancellationToken,
    deadline: Instant,
    step: impl Future<Output = Result<T, InstallError>>,
) -> Result<T, InstallError> {
    tokio::select! {
        () = token.cancelled() => Err(InstallError::Cancelled),
        () = tokio::time::sleep_until(deadline) => Err(InstallError::TimedOut),
        result = step => result,
    }
}
