//! On-disk layout, install state and installer settings.

use super::error::InstallError;
use super::platform::Platform;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Every path the installer touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrpcPaths {
    #[serde(rename = "userdata_dir")]
    pub user_data_dir: PathBuf,
    pub frpc_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub binary_path: PathBuf,
    pub download_dir: PathBuf,
    pub state_path: PathBuf,
    pub settings_path: PathBuf,
}

impl FrpcPaths {
    #[must_use]
    pub fn new(user_data_dir: impl Into<PathBuf>, platform: &Platform) -> Self {
        let user_data_dir = user_data_dir.into();
        let frpc_dir = user_data_dir.join("frpc");
        let bin_dir = frpc_dir.join("bin");
        Self {
            binary_path: bin_dir.join(platform.binary_name()),
            download_dir: frpc_dir.join("downloads"),
            state_path: frpc_dir.join("installed.json"),
            settings_path: frpc_dir.join("settings.json"),
            bin_dir,
            frpc_dir,
            user_data_dir,
        }
    }

    pub(crate) fn ensure_dirs(&self) -> Result<(), InstallError> {
        for dir in [&self.frpc_dir, &self.bin_dir, &self.download_dir] {
            fs::create_dir_all(dir).map_err(InstallError::io("Failed to create", dir))?;
        }
        Ok(())
    }
}

/// Persisted record of the last verified install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallState {
    pub version: String,
    pub asset_name: String,
    pub sha256: String,
    /// RFC 3339, UTC.
    pub installed_at: String,
}

/// User-editable installer settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "github_mirror_url")]
    pub mirror_url: String,
}

pub(crate) fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, InstallError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(InstallError::io("Failed to read", path)(e)),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|source| InstallError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Write pretty JSON through a temp file in the same directory, then rename.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), InstallError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(InstallError::io("Failed to create", dir))?;

    let payload = serde_json::to_vec_pretty(value).map_err(|source| InstallError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).map_err(InstallError::io("Failed to create temp file in", dir))?;
    tmp.write_all(&payload)
        .map_err(InstallError::io("Failed to write", tmp.path()))?;
    tmp.persist(path)
        .map_err(|e| InstallError::io("Failed to replace", path)(e.error))?;
    Ok(())
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<(), InstallError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(InstallError::io("Failed to remove", path)(e)),
    }
}

pub(crate) fn file_exists(path: &Path) -> Result<bool, InstallError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(!meta.is_dir()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(InstallError::io("Failed to stat", path)(e)),
    }
}

/// Validate a mirror URL. Blank input clears the mirror.
pub fn normalize_mirror_url(raw: &str) -> Result<String, InstallError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let parsed =
        url::Url::parse(trimmed).map_err(|_| InstallError::InvalidMirror(trimmed.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(InstallError::InvalidMirror(format!(
            "{trimmed} (must start with http:// or https://)"
        )));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(InstallError::InvalidMirror(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

/// `mirror + url`, with the mirror forced to end in `/`.
#[must_use]
pub fn apply_mirror(url: &str, mirror: &str) -> String {
    let url = url.trim();
    let mirror = mirror.trim();
    if url.is_empty() || mirror.is_empty() {
        return url.to_string();
    }
    if mirror.ends_with('/') {
        format!("{mirror}{url}")
    } else {
        format!("{mirror}/{url}")
    }
}
