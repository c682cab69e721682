//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use camino::Utf8Path;
use tokio::sync::{Mutex, MutexGuard};

use crate::cache::{CacheError, FetchFuture, Fetcher};
use crate::process::{CommandRunner, ProcessError, ProcessResult, RunFuture};
use crate::tunnel::retry::{SleepFuture, Sleeper};

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic binary outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<Result<ProcessResult, String>>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Queues a response with the given stdout and stderr.
    pub fn push_output(&self, stdout: impl Into<String>, stderr: impl Into<String>) {
        self.responses.borrow_mut().push_back(Ok(ProcessResult {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }));
    }

    /// Queues a spawn failure with the given message.
    pub fn push_spawn_error(&self, message: impl Into<String>) {
        self.responses.borrow_mut().push_back(Err(message.into()));
    }
}

impl CommandRunner for ScriptedRunner {
    fn run<'a>(&'a self, program: &'a str, args: &'a [String]) -> RunFuture<'a> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        let next = self.responses.borrow_mut().pop_front();
        Box::pin(async move {
            match next {
                Some(Ok(result)) => Ok(result),
                Some(Err(message)) => Err(ProcessError::Spawn {
                    program: program.to_owned(),
                    message,
                }),
                None => Err(ProcessError::Spawn {
                    program: program.to_owned(),
                    message: String::from("no scripted response available"),
                }),
            }
        })
    }
}

/// Sleeper that records requested delays and resolves immediately.
#[derive(Clone, Debug, Default)]
pub struct RecordingSleeper {
    delays: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Creates a sleeper with an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the delays requested so far.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        self.delays.borrow_mut().push(duration);
        Box::pin(async {})
    }
}

/// Fetcher that writes a pre-seeded archive instead of touching the network.
#[derive(Clone, Debug, Default)]
pub struct ScriptedFetcher {
    payload: Vec<u8>,
    calls: Rc<RefCell<u32>>,
}

impl ScriptedFetcher {
    /// Creates a fetcher that materialises `payload` at the destination.
    #[must_use]
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            calls: Rc::default(),
        }
    }

    /// Number of fetches performed.
    #[must_use]
    pub fn calls(&self) -> u32 {
        *self.calls.borrow()
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch<'a>(&'a self, _url: &'a str, dest: &'a Utf8Path) -> FetchFuture<'a> {
        *self.calls.borrow_mut() += 1;
        Box::pin(async move {
            tokio::fs::write(dest, &self.payload)
                .await
                .map_err(|err| CacheError::DownloadFailed {
                    url: String::from("scripted"),
                    message: err.to_string(),
                })
        })
    }
}

/// Fetcher that always fails, for download-failure scenarios.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingFetcher;

impl Fetcher for FailingFetcher {
    fn fetch<'a>(&'a self, url: &'a str, _dest: &'a Utf8Path) -> FetchFuture<'a> {
        Box::pin(async move {
            Err(CacheError::DownloadFailed {
                url: url.to_owned(),
                message: String::from("simulated network failure"),
            })
        })
    }
}

/// Builds an in-memory zip archive holding a single file.
///
/// # Panics
///
/// Panics when the in-memory writer fails, which only happens on allocation
/// failure.
#[must_use]
pub fn zip_with_file(name: &str, contents: &[u8]) -> Vec<u8> {
    let cursor = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(cursor);
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file(name, options).expect("start zip entry");
    writer.write_all(contents).expect("write zip entry");
    writer.finish().expect("finish zip archive").into_inner()
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
