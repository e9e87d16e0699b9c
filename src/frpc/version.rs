//! Installed-version probing and comparison.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

/// Product name the tunnel client prints before its version.
const PRODUCT_NAME: &str = "LoliaFRP-CLI";

/// Version recorded when nothing better is known.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Deadline for `<binary> -v`.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

fn strip_v(version: &str) -> &str {
    version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version)
}

/// Canonical form of an installed version string, e.g.
/// `"LoliaFRP-CLI v1.2.3"` and `"1.2.3"` both become `"LoliaFRP-CLI 1.2.3"`.
#[must_use]
pub fn normalize_installed(raw: &str) -> String {
    let version = raw.trim();
    if version.is_empty() {
        return String::new();
    }
    if version.eq_ignore_ascii_case(UNKNOWN_VERSION) {
        return UNKNOWN_VERSION.to_string();
    }

    let fields: Vec<&str> = version.split_whitespace().collect();
    let version = match fields.as_slice() {
        [first, second, ..] if first.eq_ignore_ascii_case(PRODUCT_NAME) => *second,
        [_, .., last] => *last,
        _ => version,
    };

    match strip_v(version) {
        "" => String::new(),
        v => format!("{PRODUCT_NAME} {v}"),
    }
}

/// Canonical form of a release tag.
#[must_use]
pub fn normalize_tag(tag: &str) -> String {
    match strip_v(tag.trim()) {
        "" => String::new(),
        v => format!("{PRODUCT_NAME} {v}"),
    }
}

/// Exact comparison after normalization; no semver ordering.
#[must_use]
pub fn is_update_available(installed: Option<&str>, latest_tag: Option<&str>) -> bool {
    let Some(latest_tag) = latest_tag else {
        return false;
    };
    let Some(installed) = installed else {
        return true;
    };

    let installed = normalize_installed(installed);
    let latest = normalize_tag(latest_tag);
    if installed.is_empty() || installed == UNKNOWN_VERSION || latest.is_empty() {
        return true;
    }
    installed != latest
}

/// Second whitespace-delimited token of `-v` output.
#[must_use]
pub fn parse_version_output(output: &str) -> Option<String> {
    output.split_whitespace().nth(1).map(str::to_string)
}

/// Run `<binary> -v` and parse its version. Failures are logged and yield `None`.
pub async fn probe_version(binary: &Path, timeout: Duration) -> Option<String> {
    let mut command = super::background_command(binary);
    command
        .arg("-v")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            tracing::debug!(binary = %binary.display(), error = %e, "Version probe failed");
            return None;
        }
        Err(_) => {
            tracing::debug!(binary = %binary.display(), "Version probe timed out");
            return None;
        }
    };
    if !output.status.success() {
        tracing::debug!(binary = %binary.display(), status = %output.status, "Version probe exited with error");
        return None;
    }

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    parse_version_output(text.trim())
}
