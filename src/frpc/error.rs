//! Installer error types.

use crate::api::ApiError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Failed to resolve latest release: {0}")]
    Release(#[from] ApiError),

    #[error("Latest release does not contain asset {asset}")]
    AssetNotFound { asset: String },

    #[error("Release asset digest is empty: {asset}")]
    MissingDigest { asset: String },

    #[error("Download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Download of {url} failed with HTTP {status}")]
    DownloadStatus { url: String, status: u16 },

    #[error("sha256 mismatch for {asset}: expected={expected} actual={actual}")]
    ChecksumMismatch {
        asset: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to read archive {asset}: {reason}")]
    Archive { asset: String, reason: String },

    #[error("{binary} not found in archive {asset}")]
    BinaryNotInArchive { binary: String, asset: String },

    #[error("Invalid mirror URL: {0}")]
    InvalidMirror(String),

    #[error("A download or install is already in progress")]
    InProgress,

    #[error("Download canceled")]
    Cancelled,

    #[error("Download timed out, please try again later")]
    TimedOut,

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON for {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl InstallError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            action,
            path,
            source,
        }
    }

    /// Whether the operation ended because of cancel or deadline rather than failure.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Cancelled | Self::TimedOut => true,
            Self::Release(e) => e.is_timeout(),
            _ => false,
        }
    }
}
