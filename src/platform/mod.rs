//! Host platform detection and download-source selection for the tunnel
//! binary.
//!
//! The mapping from (operating system, architecture) to a download URL and an
//! install directory is a pure, closed function: every supported host is an
//! explicit enum arm and anything else is a hard configuration error rather
//! than a fallthrough.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Archive for 32-bit Linux hosts.
const LINUX_32_URL: &str =
    "https://www.browserstack.com/browserstack-local/BrowserStackLocal-linux-ia32.zip";
/// Archive for 64-bit Linux hosts.
const LINUX_64_URL: &str =
    "https://www.browserstack.com/browserstack-local/BrowserStackLocal-linux-x64.zip";
/// Archive for macOS hosts.
const DARWIN_URL: &str =
    "https://www.browserstack.com/browserstack-local/BrowserStackLocal-darwin-x64.zip";
/// Archive for Windows hosts.
const WINDOWS_URL: &str =
    "https://www.browserstack.com/browserstack-local/BrowserStackLocal-win32.zip";

/// Operating systems the tunnel binary is published for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Platform {
    /// Linux, 32- or 64-bit.
    Linux,
    /// macOS.
    Darwin,
    /// Windows.
    Windows,
}

impl Platform {
    /// Directory segment used when storing the binary for this platform.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Windows => "win32",
        }
    }
}

/// Resolved download source and install location for the executing host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlatformInfo {
    /// Detected operating system.
    pub platform: Platform,
    /// Architecture string as reported by the host.
    pub arch: String,
    /// Archive URL for this (OS, architecture) pair.
    pub download_url: String,
    /// Directory the archive is downloaded into and extracted under.
    pub install_dir: Utf8PathBuf,
}

/// Errors raised while resolving the host platform.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PlatformError {
    /// Raised when the tunnel binary is not published for the host OS.
    #[error("unsupported platform '{os}': the tunnel binary is only published for linux, macos, and windows")]
    Unsupported {
        /// Operating system name reported by the host.
        os: String,
    },
}

/// Maps the host OS and architecture to a download URL and install directory.
///
/// `host_os` and `host_arch` carry the values of [`std::env::consts::OS`] and
/// [`std::env::consts::ARCH`]; the install directory is
/// `<install_root>/<platform>` so binaries for different platforms sharing a
/// cache root never collide.
///
/// # Errors
///
/// Returns [`PlatformError::Unsupported`] for any OS other than `linux`,
/// `macos`, or `windows`.
pub fn resolve(
    host_os: &str,
    host_arch: &str,
    install_root: &Utf8Path,
) -> Result<PlatformInfo, PlatformError> {
    let platform = match host_os {
        "linux" => Platform::Linux,
        "macos" => Platform::Darwin,
        "windows" => Platform::Windows,
        other => {
            return Err(PlatformError::Unsupported {
                os: other.to_owned(),
            });
        }
    };

    let download_url = match platform {
        Platform::Linux => {
            if is_32_bit(host_arch) {
                LINUX_32_URL
            } else {
                LINUX_64_URL
            }
        }
        Platform::Darwin => DARWIN_URL,
        Platform::Windows => WINDOWS_URL,
    };

    Ok(PlatformInfo {
        platform,
        arch: host_arch.to_owned(),
        download_url: download_url.to_owned(),
        install_dir: install_root.join(platform.name()),
    })
}

fn is_32_bit(arch: &str) -> bool {
    matches!(arch, "x86" | "arm")
}

#[cfg(test)]
mod tests;
