//! Extracting the tunnel client binary from a release archive.
//!
//! Blocking; callers run this on `spawn_blocking`.

use super::error::InstallError;
use super::platform::ArchiveFormat;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

/// Copy the entry whose basename is `binary_name` to `output`.
///
/// The binary is written to a temp file next to `output` and renamed over it,
/// so a reader never sees a partial file. Once `cancel` fires the rename is
/// skipped and `output` is left as it was.
pub fn extract_binary(
    archive: &Path,
    format: ArchiveFormat,
    binary_name: &str,
    output: &Path,
    cancel: &CancellationToken,
) -> Result<(), InstallError> {
    let asset = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let archive_err = |e: &dyn std::fmt::Display| InstallError::Archive {
        asset: asset.clone(),
        reason: e.to_string(),
    };

    let dir = output.parent().unwrap_or_else(|| Path::new("."));
    let file = File::open(archive).map_err(InstallError::io("Failed to open", archive))?;
    let found = match format {
        ArchiveFormat::TarGz => extract_tar_gz(file, binary_name, dir).map_err(|e| archive_err(&e))?,
        ArchiveFormat::Zip => extract_zip(file, binary_name, dir).map_err(|e| archive_err(&e))?,
    };
    let Some(tmp) = found else {
        return Err(InstallError::BinaryNotInArchive {
            binary: binary_name.to_string(),
            asset,
        });
    };

    if cancel.is_cancelled() {
        return Err(InstallError::Cancelled);
    }
    tmp.persist(output)
        .map_err(|e| InstallError::io("Failed to replace", output)(e.error))?;
    Ok(())
}

fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn extract_tar_gz(file: File, binary_name: &str, dir: &Path) -> io::Result<Option<NamedTempFile>> {
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let matches = basename(&entry.path()?.to_string_lossy()) == binary_name;
        if !matches {
            continue;
        }
        return write_executable(dir, &mut entry).map(Some);
    }
    Ok(None)
}

fn extract_zip(file: File, binary_name: &str, dir: &Path) -> io::Result<Option<NamedTempFile>> {
    let mut archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(io::Error::other)?;
        if entry.is_dir() || basename(entry.name()) != binary_name {
            continue;
        }
        return write_executable(dir, &mut entry).map(Some);
    }
    Ok(None)
}

/// Copy `reader` into an executable temp file in `dir`. Deleted unless persisted.
fn write_executable(dir: &Path, reader: &mut dyn Read) -> io::Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    io::copy(reader, &mut tmp)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(tmp)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Build a `.tar.gz` holding `entries` (path, contents).
    pub(crate) fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// Build a `.zip` holding `entries` (path, contents).
    pub(crate) fn zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (path, data) in entries {
            writer.start_file(*path, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extracts_nested_tar_entry() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("LoliaFrp_linux_amd64.tar.gz");
        std::fs::write(
            &archive,
            tar_gz(&[
                ("LoliaFrp_linux_amd64/README.md", b"readme"),
                ("LoliaFrp_linux_amd64/frpc", b"binary"),
            ]),
        )
        .unwrap();
        let output = dir.path().join("frpc");

        extract_binary(&archive, ArchiveFormat::TarGz, "frpc", &output, &CancellationToken::new()).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"binary");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&output).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_extracts_zip_entry() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("LoliaFrp_windows_amd64.zip");
        std::fs::write(&archive, zip(&[("dist/frpc.exe", b"exe")])).unwrap();
        let output = dir.path().join("frpc.exe");

        extract_binary(&archive, ArchiveFormat::Zip, "frpc.exe", &output, &CancellationToken::new()).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"exe");
    }

    #[test]
    fn test_missing_binary_leaves_output_alone() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("a.tar.gz");
        std::fs::write(&archive, tar_gz(&[("frps", b"server")])).unwrap();
        let output = dir.path().join("frpc");
        std::fs::write(&output, b"old").unwrap();

        let err = extract_binary(&archive, ArchiveFormat::TarGz, "frpc", &output, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, InstallError::BinaryNotInArchive { .. }));
        assert_eq!(std::fs::read(&output).unwrap(), b"old");
    }

    #[test]
    fn test_corrupt_archive_is_reported() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("a.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let err = extract_binary(
            &archive,
            ArchiveFormat::Zip,
            "frpc.exe",
            &dir.path().join("frpc.exe"),
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, InstallError::Archive { .. }));
    }

    #[test]
    fn test_cancelled_extraction_keeps_old_binary() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("LoliaFrp_linux_amd64.tar.gz");
        std::fs::write(&archive, tar_gz(&[("frpc", b"new binary")])).unwrap();
        let bin_dir = dir.path().join("bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        let output = bin_dir.join("frpc");
        std::fs::write(&output, b"old binary").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = extract_binary(&archive, ArchiveFormat::TarGz, "frpc", &output, &cancel).unwrap_err();

        assert!(matches!(err, InstallError::Cancelled));
        assert_eq!(std::fs::read(&output).unwrap(), b"old binary");
        // The temp copy is gone too.
        assert_eq!(std::fs::read_dir(&bin_dir).unwrap().count(), 1);
    }
}
