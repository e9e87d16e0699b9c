//! Release asset naming per OS/architecture.

use super::error::InstallError;
use serde::Serialize;

/// Asset name prefix used by the tunnel client's releases.
const ASSET_PREFIX: &str = "LoliaFrp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Linux,
    Darwin,
    Freebsd,
    Openbsd,
    Android,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Arch {
    #[serde(rename = "386")]
    X86,
    #[serde(rename = "amd64")]
    Amd64,
    #[serde(rename = "arm")]
    Arm,
    #[serde(rename = "arm64")]
    Arm64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArchiveFormat {
    #[serde(rename = "tar.gz")]
    TarGz,
    #[serde(rename = "zip")]
    Zip,
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Freebsd => "freebsd",
            Self::Openbsd => "openbsd",
            Self::Android => "android",
        };
        f.write_str(name)
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::X86 => "386",
            Self::Amd64 => "amd64",
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
        };
        f.write_str(name)
    }
}

impl ArchiveFormat {
    #[must_use]
    pub const fn ext(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }
}

/// A supported (OS, architecture) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    /// Resolve from OS/arch names. Accepts both Rust (`macos`, `x86_64`,
    /// `aarch64`) and release (`darwin`, `amd64`, `arm64`) spellings.
    pub fn new(os: &str, arch: &str) -> Result<Self, InstallError> {
        let unsupported = || InstallError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let parsed_os = match os.trim().to_ascii_lowercase().as_str() {
            "windows" => Os::Windows,
            "linux" => Os::Linux,
            "macos" | "darwin" => Os::Darwin,
            "freebsd" => Os::Freebsd,
            "openbsd" => Os::Openbsd,
            "android" => Os::Android,
            _ => return Err(unsupported()),
        };
        let parsed_arch = match arch.trim().to_ascii_lowercase().as_str() {
            "x86" | "386" | "i686" => Arch::X86,
            "x86_64" | "amd64" => Arch::Amd64,
            "arm" => Arch::Arm,
            "aarch64" | "arm64" => Arch::Arm64,
            _ => return Err(unsupported()),
        };

        // Android builds only exist for ARM.
        if parsed_os == Os::Android && matches!(parsed_arch, Arch::X86 | Arch::Amd64) {
            return Err(unsupported());
        }

        Ok(Self {
            os: parsed_os,
            arch: parsed_arch,
        })
    }

    /// The platform this binary was built for.
    pub fn current() -> Result<Self, InstallError> {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    #[must_use]
    pub const fn archive_format(&self) -> ArchiveFormat {
        match self.os {
            Os::Windows => ArchiveFormat::Zip,
            _ => ArchiveFormat::TarGz,
        }
    }

    /// `LoliaFrp_<os>_<arch>.<ext>`
    #[must_use]
    pub fn asset_name(&self) -> String {
        format!(
            "{ASSET_PREFIX}_{}_{}.{}",
            self.os,
            self.arch,
            self.archive_format().ext()
        )
    }

    /// File name of the tunnel client inside the archive and on disk.
    #[must_use]
    pub const fn binary_name(&self) -> &'static str {
        match self.os {
            Os::Windows => "frpc.exe",
            _ => "frpc",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_names() {
        let linux = Platform::new("linux", "x86_64").unwrap();
        assert_eq!(linux.asset_name(), "LoliaFrp_linux_amd64.tar.gz");
        assert_eq!(linux.binary_name(), "frpc");

        let mac = Platform::new("macos", "aarch64").unwrap();
        assert_eq!(mac.asset_name(), "LoliaFrp_darwin_arm64.tar.gz");

        let windows = Platform::new("windows", "x86").unwrap();
        assert_eq!(windows.asset_name(), "LoliaFrp_windows_386.zip");
        assert_eq!(windows.binary_name(), "frpc.exe");
        assert_eq!(windows.archive_format(), ArchiveFormat::Zip);

        let android = Platform::new("android", "arm").unwrap();
        assert_eq!(android.asset_name(), "LoliaFrp_android_arm.tar.gz");
    }

    #[test]
    fn test_unsupported_platforms() {
        assert!(matches!(
            Platform::new("android", "x86_64"),
            Err(InstallError::UnsupportedPlatform { .. })
        ));
        assert!(Platform::new("solaris", "amd64").is_err());
        assert!(Platform::new("linux", "riscv64").is_err());
    }

    #[test]
    fn test_serializes_as_release_names() {
        let platform = Platform::new("linux", "x86").unwrap();
        let json = serde_json::to_value(platform).unwrap();
        assert_eq!(json, serde_json::json!({"os": "linux", "arch": "386"}));
    }
}
