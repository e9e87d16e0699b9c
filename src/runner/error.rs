use crate::api::ApiError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Tunnel client is already running")]
    AlreadyRunning,

    #[error("The account has no tunnels to start")]
    NoTunnels,

    #[error("Invalid tunnel name")]
    InvalidTunnelName,

    #[error("Tunnel detail unavailable: {0}")]
    DetailUnavailable(String),

    #[error("Tunnel detail has no valid id: {0}")]
    MissingTunnelId(String),

    #[error("Tunnel detail has no launch token: {0}")]
    MissingTunnelToken(String),

    #[error("Tunnel client is not installed: {}", .0.display())]
    NotInstalled(PathBuf),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to start {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
