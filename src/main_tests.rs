//! Tests for the binary entry point helpers.

use burrow::config::ACCESS_KEY_VAR;
use burrow::test_support::EnvGuard;
use burrow::{ConfigError, TunnelError};
use rstest::rstest;

use super::{CliError, redact_secret, require_access_key, write_error};

#[rstest]
fn redact_replaces_every_occurrence_of_the_key() {
    let message = "binary said: --key hunter2 rejected (hunter2 invalid)";
    assert_eq!(
        redact_secret(message, Some("hunter2")),
        "binary said: --key *** rejected (*** invalid)"
    );
}

#[rstest]
fn redact_without_secret_leaves_message_untouched() {
    assert_eq!(redact_secret("no secrets here", None), "no secrets here");
    assert_eq!(redact_secret("no secrets here", Some("")), "no secrets here");
}

#[rstest]
#[tokio::test]
async fn missing_access_key_is_a_config_error() {
    let _guard = EnvGuard::set_vars(&[(ACCESS_KEY_VAR, "")]).await;
    let err = require_access_key().expect_err("empty key must be rejected");
    let CliError::Config(ConfigError::MissingAccessKey) = err else {
        panic!("expected MissingAccessKey, got {err:?}");
    };
}

#[rstest]
#[tokio::test]
async fn reported_errors_never_contain_the_access_key() {
    let _guard = EnvGuard::set_vars(&[(ACCESS_KEY_VAR, "sekrit-key")]).await;
    let err = CliError::Tunnel(TunnelError::StartFailed {
        reason: String::from("could not authenticate with key sekrit-key"),
    });

    let mut sink = Vec::new();
    write_error(&mut sink, &err);
    let written = String::from_utf8(sink).expect("utf8 error output");
    assert!(!written.contains("sekrit-key"), "leaked key: {written}");
    assert!(written.contains("***"));
}
