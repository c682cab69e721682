//! Tests for host platform resolution.

use camino::{Utf8Path, Utf8PathBuf};
use rstest::rstest;

use super::{Platform, PlatformError, resolve};

fn root() -> Utf8PathBuf {
    Utf8PathBuf::from("/home/runner/work/binary/LocalBinaryFolder")
}

#[rstest]
#[case("linux", "x86_64", "BrowserStackLocal-linux-x64.zip")]
#[case("linux", "aarch64", "BrowserStackLocal-linux-x64.zip")]
#[case("linux", "x86", "BrowserStackLocal-linux-ia32.zip")]
#[case("linux", "arm", "BrowserStackLocal-linux-ia32.zip")]
#[case("macos", "x86_64", "BrowserStackLocal-darwin-x64.zip")]
#[case("macos", "aarch64", "BrowserStackLocal-darwin-x64.zip")]
#[case("windows", "x86_64", "BrowserStackLocal-win32.zip")]
fn resolve_selects_archive_for_host(
    #[case] os: &str,
    #[case] arch: &str,
    #[case] archive: &str,
) {
    let info = resolve(os, arch, &root()).expect("supported host");
    assert!(
        info.download_url.ends_with(archive),
        "expected {archive} for ({os}, {arch}), got {}",
        info.download_url
    );
}

#[rstest]
fn resolve_never_mixes_linux_bitness() {
    let url_64 = resolve("linux", "x86_64", &root())
        .expect("supported host")
        .download_url;
    let url_32 = resolve("linux", "x86", &root())
        .expect("supported host")
        .download_url;
    assert_ne!(url_64, url_32);
    assert!(!url_64.contains("ia32"));
    assert!(!url_32.contains("x64"));
}

#[rstest]
#[case("linux", Platform::Linux, "linux")]
#[case("macos", Platform::Darwin, "darwin")]
#[case("windows", Platform::Windows, "win32")]
fn resolve_places_binary_under_platform_directory(
    #[case] os: &str,
    #[case] platform: Platform,
    #[case] segment: &str,
) {
    let info = resolve(os, "x86_64", &root()).expect("supported host");
    assert_eq!(info.platform, platform);
    assert_eq!(info.install_dir, root().join(segment));
}

#[rstest]
fn resolve_rejects_unsupported_os() {
    let err = resolve("freebsd", "x86_64", Utf8Path::new("/tmp"))
        .expect_err("freebsd is not a published target");
    let PlatformError::Unsupported { os } = err;
    assert_eq!(os, "freebsd");
}
