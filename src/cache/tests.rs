//! Tests for the versioned tool cache.

use camino::{Utf8Path, Utf8PathBuf};
use rstest::rstest;
use tempfile::TempDir;

use crate::platform::{Platform, PlatformInfo};
use crate::test_support::{EnvGuard, FailingFetcher, ScriptedFetcher, zip_with_file};

use super::{CacheError, InstallOutcome, ToolCache};

const TOOL: &str = "BrowserStackLocal";
const VERSION: &str = "1.0.0";

fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("utf8 temp path")
}

fn platform_info(install_dir: Utf8PathBuf) -> PlatformInfo {
    PlatformInfo {
        platform: Platform::Linux,
        arch: String::from("x86_64"),
        download_url: String::from("https://example.invalid/archive.zip"),
        install_dir,
    }
}

async fn path_guard(workspace: &TempDir) -> EnvGuard {
    let original = std::env::var("PATH").unwrap_or_default();
    let path_file = utf8(&workspace.path().join("github_path"));
    EnvGuard::set_vars(&[
        ("PATH", original.as_str()),
        ("GITHUB_PATH", path_file.as_str()),
    ])
    .await
}

#[rstest]
#[tokio::test]
async fn miss_downloads_extracts_and_caches() {
    let workspace = TempDir::new().expect("temp dir");
    let _guard = path_guard(&workspace).await;
    let root = utf8(workspace.path());
    let cache = ToolCache::new(root.join("cache"));
    let info = platform_info(root.join("install"));
    let fetcher = ScriptedFetcher::new(zip_with_file(TOOL, b"#!/bin/sh\n"));

    let outcome = cache
        .ensure_installed(TOOL, VERSION, &info, &fetcher)
        .await
        .expect("install succeeds");

    let entry = root.join("cache").join(TOOL).join(VERSION);
    assert_eq!(outcome, InstallOutcome::Downloaded { path: entry.clone() });
    assert!(entry.join(TOOL).is_file(), "executable cached");
    assert!(entry.join(".complete").is_file(), "entry marked complete");
    assert!(
        !info.install_dir.join("binaryZip").exists(),
        "archive removed after extraction"
    );
    assert!(
        std::env::var("PATH")
            .expect("path set")
            .starts_with(entry.as_str()),
        "cache entry registered on PATH"
    );
}

#[cfg(unix)]
#[rstest]
#[tokio::test]
async fn extracted_binary_is_executable() {
    use std::os::unix::fs::PermissionsExt;

    let workspace = TempDir::new().expect("temp dir");
    let _guard = path_guard(&workspace).await;
    let root = utf8(workspace.path());
    let cache = ToolCache::new(root.join("cache"));
    let info = platform_info(root.join("install"));
    let fetcher = ScriptedFetcher::new(zip_with_file(TOOL, b"#!/bin/sh\n"));

    cache
        .ensure_installed(TOOL, VERSION, &info, &fetcher)
        .await
        .expect("install succeeds");

    let mode = std::fs::metadata(info.install_dir.join(TOOL))
        .expect("binary metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o111, 0o111, "execute bits set, mode {mode:o}");
}

#[rstest]
#[tokio::test]
async fn second_install_reuses_cache_without_downloading() {
    let workspace = TempDir::new().expect("temp dir");
    let _guard = path_guard(&workspace).await;
    let root = utf8(workspace.path());
    let cache = ToolCache::new(root.join("cache"));
    let info = platform_info(root.join("install"));
    let fetcher = ScriptedFetcher::new(zip_with_file(TOOL, b"#!/bin/sh\n"));

    let first = cache
        .ensure_installed(TOOL, VERSION, &info, &fetcher)
        .await
        .expect("first install succeeds");
    let second = cache
        .ensure_installed(TOOL, VERSION, &info, &fetcher)
        .await
        .expect("second install succeeds");

    assert_eq!(fetcher.calls(), 1, "exactly one download");
    assert!(!first.was_cached());
    assert!(second.was_cached());
    assert_eq!(first.path(), second.path());
}

#[rstest]
#[tokio::test]
async fn download_failure_is_fatal_and_caches_nothing() {
    let workspace = TempDir::new().expect("temp dir");
    let _guard = path_guard(&workspace).await;
    let root = utf8(workspace.path());
    let cache = ToolCache::new(root.join("cache"));
    let info = platform_info(root.join("install"));

    let err = cache
        .ensure_installed(TOOL, VERSION, &info, &FailingFetcher)
        .await
        .expect_err("download must fail");

    let CacheError::DownloadFailed { url, message } = err else {
        panic!("expected DownloadFailed, got {err:?}");
    };
    assert_eq!(url, info.download_url);
    assert!(message.contains("simulated"));
    assert!(cache.find(TOOL, VERSION).is_none());
}

#[rstest]
#[tokio::test]
async fn corrupt_archive_fails_extraction() {
    let workspace = TempDir::new().expect("temp dir");
    let _guard = path_guard(&workspace).await;
    let root = utf8(workspace.path());
    let cache = ToolCache::new(root.join("cache"));
    let info = platform_info(root.join("install"));
    let fetcher = ScriptedFetcher::new(b"this is not a zip archive".to_vec());

    let err = cache
        .ensure_installed(TOOL, VERSION, &info, &fetcher)
        .await
        .expect_err("extraction must fail");

    assert!(matches!(err, CacheError::ExtractFailed { .. }), "got {err:?}");
    assert!(cache.find(TOOL, VERSION).is_none());
}

#[rstest]
fn incomplete_entry_is_treated_as_absent() {
    let workspace = TempDir::new().expect("temp dir");
    let root = utf8(workspace.path());
    let cache = ToolCache::new(root.clone());

    let entry = root.join(TOOL).join(VERSION);
    std::fs::create_dir_all(&entry).expect("create entry dir");
    std::fs::write(entry.join(TOOL), b"partial").expect("write partial file");

    assert!(cache.find(TOOL, VERSION).is_none());
}

#[rstest]
#[tokio::test]
async fn stale_archive_and_binary_are_replaced() {
    let workspace = TempDir::new().expect("temp dir");
    let _guard = path_guard(&workspace).await;
    let root = utf8(workspace.path());
    let cache = ToolCache::new(root.join("cache"));
    let info = platform_info(root.join("install"));

    std::fs::create_dir_all(&info.install_dir).expect("create install dir");
    std::fs::write(info.install_dir.join("binaryZip"), b"stale download")
        .expect("write stale archive");
    std::fs::write(info.install_dir.join(TOOL), b"stale binary").expect("write stale binary");

    let fetcher = ScriptedFetcher::new(zip_with_file(TOOL, b"fresh binary"));
    cache
        .ensure_installed(TOOL, VERSION, &info, &fetcher)
        .await
        .expect("install succeeds");

    let contents = std::fs::read(info.install_dir.join(TOOL)).expect("read binary");
    assert_eq!(contents, b"fresh binary");
}

#[rstest]
#[tokio::test]
async fn cache_dir_copies_only_files() {
    let workspace = TempDir::new().expect("temp dir");
    let root = utf8(workspace.path());
    let cache = ToolCache::new(root.join("cache"));

    let extracted = root.join("extracted");
    std::fs::create_dir_all(extracted.join("subdir")).expect("create extracted tree");
    std::fs::write(extracted.join(TOOL), b"binary").expect("write binary");

    let entry = cache
        .cache_dir(Utf8Path::new(extracted.as_str()), TOOL, VERSION)
        .await
        .expect("cache write succeeds");

    assert!(entry.join(TOOL).is_file());
    assert!(!entry.join("subdir").exists());
    assert!(cache.find(TOOL, VERSION).is_some());
}
