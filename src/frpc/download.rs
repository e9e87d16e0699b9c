//! Streaming asset download with on-the-fly sha256.

use super::error::InstallError;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Download `url` to `output`, returning the lowercase hex sha256 of the body.
///
/// Bytes land in a `.part` temp file next to `output`; `output` only appears
/// once the whole body has been received.
pub async fn download_archive(
    client: &reqwest::Client,
    url: &str,
    output: &Path,
    timeout: Duration,
) -> Result<String, InstallError> {
    match tokio::time::timeout(timeout, download(client, url, output)).await {
        Ok(result) => result,
        Err(_) => Err(InstallError::TimedOut),
    }
}

async fn download(client: &reqwest::Client, url: &str, output: &Path) -> Result<String, InstallError> {
    let download_err = |source: reqwest::Error| {
        if source.is_timeout() {
            InstallError::TimedOut
        } else {
            InstallError::Download {
                url: url.to_string(),
                source,
            }
        }
    };

    tracing::info!(url, "Downloading release asset");
    let response = client.get(url).send().await.map_err(download_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(InstallError::DownloadStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    // The temp path is deleted on drop, so an error or a dropped future
    // leaves nothing behind.
    let dir = output.parent().unwrap_or_else(|| Path::new("."));
    let (file, part) = tempfile::Builder::new()
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(InstallError::io("Failed to create temp file in", dir))?
        .into_parts();
    let mut file = tokio::fs::File::from_std(file);
    let mut hasher = Sha256::new();
    let mut received: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(download_err)?;
        hasher.update(&chunk);
        received += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(InstallError::io("Failed to write", &*part))?;
    }
    file.flush()
        .await
        .map_err(InstallError::io("Failed to write", &*part))?;
    drop(file);

    part.persist(output)
        .map_err(|e| InstallError::io("Failed to move download to", output)(e.error))?;

    let sha256 = hex::encode(hasher.finalize());
    tracing::debug!(bytes = received, %sha256, "Download complete");
    Ok(sha256)
}
