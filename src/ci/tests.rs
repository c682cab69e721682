//! Tests for the CI environment contract.

use std::env;
use std::fs;

use camino::Utf8PathBuf;
use rstest::rstest;
use tempfile::TempDir;

use crate::test_support::EnvGuard;

#[rstest]
#[tokio::test]
async fn export_variable_updates_process_and_env_file() {
    let dir = TempDir::new().expect("temp dir");
    let env_file = dir.path().join("github_env");
    let _guard = EnvGuard::set_vars(&[(
        "GITHUB_ENV",
        env_file.to_str().expect("utf8 temp path"),
    )])
    .await;

    super::export_variable("BURROW_TEST_EXPORT", "value-1").expect("export succeeds");

    assert_eq!(
        env::var("BURROW_TEST_EXPORT").expect("variable set"),
        "value-1"
    );
    let contents = fs::read_to_string(&env_file).expect("env file written");
    assert!(contents.contains("BURROW_TEST_EXPORT=value-1"));

    // SAFETY: the env lock held by `_guard` serialises this cleanup.
    unsafe { env::remove_var("BURROW_TEST_EXPORT") };
}

#[rstest]
#[tokio::test]
async fn clear_variable_removes_from_process_and_blanks_in_file() {
    let dir = TempDir::new().expect("temp dir");
    let env_file = dir.path().join("github_env");
    let _guard = EnvGuard::set_vars(&[
        ("GITHUB_ENV", env_file.to_str().expect("utf8 temp path")),
        ("BURROW_TEST_CLEAR", "stale"),
    ])
    .await;

    super::clear_variable("BURROW_TEST_CLEAR").expect("clear succeeds");

    assert!(env::var("BURROW_TEST_CLEAR").is_err());
    let contents = fs::read_to_string(&env_file).expect("env file written");
    assert!(contents.contains("BURROW_TEST_CLEAR="));
}

#[rstest]
#[tokio::test]
async fn add_path_prepends_and_records_for_later_steps() {
    let dir = TempDir::new().expect("temp dir");
    let path_file = dir.path().join("github_path");
    let original_path = env::var("PATH").unwrap_or_default();
    let _guard = EnvGuard::set_vars(&[
        ("GITHUB_PATH", path_file.to_str().expect("utf8 temp path")),
        ("PATH", original_path.as_str()),
    ])
    .await;

    let tool_dir = Utf8PathBuf::from_path_buf(dir.path().join("tool"))
        .expect("utf8 temp path");
    super::add_path(&tool_dir).expect("add_path succeeds");

    let updated = env::var("PATH").expect("path still set");
    assert!(
        updated.starts_with(tool_dir.as_str()),
        "expected {tool_dir} to lead PATH, got {updated}"
    );
    let contents = fs::read_to_string(&path_file).expect("path file written");
    assert!(contents.contains(tool_dir.as_str()));
}

#[rstest]
#[tokio::test]
async fn missing_env_file_is_not_an_error() {
    let _guard = EnvGuard::set_vars(&[("GITHUB_ENV", "")]).await;
    super::export_variable("BURROW_TEST_NO_FILE", "v").expect("export without file");
    // SAFETY: the env lock held by `_guard` serialises this cleanup.
    unsafe { env::remove_var("BURROW_TEST_NO_FILE") };
}

#[rstest]
#[tokio::test]
async fn job_falls_back_outside_ci() {
    let _guard = EnvGuard::set_vars(&[("GITHUB_JOB", "")]).await;
    assert_eq!(super::job(), "job");
}
