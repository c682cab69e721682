//! Construction of the binary's command-line argument string.
//!
//! The argument string is assembled in a fixed order so the tests can assert
//! on it byte-for-byte: key and plugin flags first, then caller extras
//! (filtered against the reserved-flag deny list), then the identifier and
//! logging flags. Reserved flags guard the connection-critical switches the
//! tool itself manages; a caller is never allowed to override them.

use camino::Utf8Path;

use crate::config::{CI_PLUGIN_NAME, Operation, TunnelConfig};

/// Flag names the caller may not supply through extra args. Matching is
/// case-sensitive, as in the binary itself.
const RESERVED_FLAGS: [&str; 8] = [
    "k",
    "key",
    "local-identifier",
    "daemon",
    "only-automate",
    "verbose",
    "log-file",
    "ci-plugin",
];

/// Builds the flag string for one invocation.
///
/// `log_file` is only consulted for start operations with a non-zero
/// verbosity; stop operations ignore extras and verbosity entirely.
#[must_use]
pub fn build_args(config: &TunnelConfig, log_file: Option<&Utf8Path>) -> String {
    let mut args = format!(
        "--key {} --only-automate --ci-plugin {CI_PLUGIN_NAME} ",
        config.access_key
    );

    match config.operation {
        Operation::Start => {
            let extras = filter_extra_args(&config.extra_args);
            if !extras.is_empty() {
                args.push_str(&extras);
                args.push(' ');
            }
            if let Some(identifier) = &config.local_identifier {
                args.push_str(&format!("--local-identifier {identifier} "));
            }
            if config.verbosity > 0 {
                if let Some(path) = log_file {
                    args.push_str(&format!(
                        "--verbose {} --log-file {path} ",
                        config.verbosity
                    ));
                }
            }
        }
        Operation::Stop => {
            if let Some(identifier) = &config.local_identifier {
                args.push_str(&format!("--local-identifier {identifier} "));
            }
        }
    }

    args
}

/// Re-emits caller extras with reserved flags removed.
///
/// Tokens are parsed the way a minimal getopt would: `-f`/`--flag` introduce
/// a flag, an `=` or the following non-flag token carries its value, and
/// positional tokens are dropped. Single-character flags come back with one
/// dash, longer names with two.
#[must_use]
pub fn filter_extra_args(extra: &str) -> String {
    let mut parsed: Vec<(String, Option<String>)> = Vec::new();
    let mut tokens = extra.split_whitespace().peekable();

    while let Some(token) = tokens.next() {
        let Some(name) = token
            .strip_prefix("--")
            .or_else(|| token.strip_prefix('-'))
        else {
            // Positional value with no preceding flag; dropped.
            continue;
        };
        if name.is_empty() {
            continue;
        }

        if let Some((flag, value)) = name.split_once('=') {
            parsed.push((flag.to_owned(), Some(value.to_owned())));
            continue;
        }

        let value = tokens
            .peek()
            .filter(|next| !next.starts_with('-'))
            .map(|next| (*next).to_owned());
        if value.is_some() {
            tokens.next();
        }
        parsed.push((name.to_owned(), value));
    }

    let kept = parsed
        .into_iter()
        .filter(|(name, _)| !RESERVED_FLAGS.contains(&name.as_str()));

    let mut rendered = Vec::new();
    for (name, value) in kept {
        if name.chars().count() == 1 {
            rendered.push(format!("-{name}"));
        } else {
            rendered.push(format!("--{name}"));
        }
        if let Some(val) = value {
            rendered.push(val);
        }
    }
    rendered.join(" ")
}
