//! Decoding of the binary's JSON status payloads.
//!
//! The binary reports through a single JSON object on stdout: `{state,
//! message}` for start and `{status, message}` for stop. Output is not
//! guaranteed well-formed, so parsing is a fallible step that yields a tagged
//! result instead of assuming valid JSON.

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// `state` value reported once the tunnel is connected.
pub const CONNECTED_STATE: &str = "connected";
/// `status` value reported after a clean disconnect.
pub const STOP_SUCCESS_STATUS: &str = "success";

/// Longest stdout excerpt echoed back in parse errors.
const EXCERPT_CHARS: usize = 200;

/// Payload reported by `--daemon start`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct StartStatus {
    /// Connection state, `connected` or `disconnected`.
    pub state: String,
    /// Human-readable status message.
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
}

/// Payload reported by `--daemon stop`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct StopStatus {
    /// Disconnect status, `success` on a clean shutdown.
    pub status: String,
    /// Human-readable status message.
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
}

/// Raised when stdout does not carry the expected JSON object.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("malformed status output from the binary: {detail} (output: {excerpt})")]
pub struct StatusParseError {
    /// Parser diagnostic.
    pub detail: String,
    /// Truncated copy of the raw stdout.
    pub excerpt: String,
}

/// Parses the stdout of a start invocation.
///
/// # Errors
///
/// Returns [`StatusParseError`] when the output is not the expected JSON
/// object.
pub fn parse_start(stdout: &str) -> Result<StartStatus, StatusParseError> {
    serde_json::from_str(stdout).map_err(|err| parse_error(&err, stdout))
}

/// Parses the stdout of a stop invocation.
///
/// # Errors
///
/// Returns [`StatusParseError`] when the output is not the expected JSON
/// object.
pub fn parse_stop(stdout: &str) -> Result<StopStatus, StatusParseError> {
    serde_json::from_str(stdout).map_err(|err| parse_error(&err, stdout))
}

fn parse_error(err: &serde_json::Error, raw: &str) -> StatusParseError {
    StatusParseError {
        detail: err.to_string(),
        excerpt: raw.trim().chars().take(EXCERPT_CHARS).collect(),
    }
}

/// Accepts a plain string or renders any other JSON value compactly; the
/// binary has been observed to put structured data in `message`.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    })
}
