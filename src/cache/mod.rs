//! Versioned tool cache for the downloaded tunnel binary.
//!
//! The cache follows the runner tool-cache layout, `<root>/<tool>/<version>/`
//! with a `.complete` marker written last, so a partially populated entry
//! from an interrupted run is treated as absent. The cache directory may
//! survive across CI runs but the `PATH` of a fresh step never does, which is
//! why a cache hit still re-registers the entry on `PATH`.

use std::future::Future;
use std::io::Read;
use std::pin::Pin;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::ci;
use crate::platform::PlatformInfo;

/// File name the archive is downloaded under before extraction.
const ARCHIVE_NAME: &str = "binaryZip";
/// Marker file written once a cache entry is fully populated.
const COMPLETE_MARKER: &str = ".complete";

/// Errors raised while installing the tunnel binary.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Raised when the archive cannot be fetched from the download URL.
    #[error("the tunnel binary could not be downloaded from {url}: {message}")]
    DownloadFailed {
        /// URL the download was attempted from.
        url: String,
        /// Description of the underlying failure.
        message: String,
    },
    /// Raised when the downloaded archive cannot be extracted.
    #[error("failed to extract {archive}: {message}")]
    ExtractFailed {
        /// Path of the archive being extracted.
        archive: Utf8PathBuf,
        /// Description of the underlying failure.
        message: String,
    },
    /// Raised on filesystem failures while populating the cache.
    #[error("cache I/O failed at {path}: {source}")]
    Io {
        /// Path the operation was acting on.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Raised when the installed path cannot be registered on `PATH`.
    #[error("failed to register binary on PATH: {0}")]
    PathRegistration(#[source] ci::CiError),
}

/// How an [`ensure_installed`](ToolCache::ensure_installed) call satisfied
/// the request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstallOutcome {
    /// The binary was already cached; only `PATH` was updated.
    Cached {
        /// Cache entry now registered on `PATH`.
        path: Utf8PathBuf,
    },
    /// The binary was downloaded, extracted, and cached.
    Downloaded {
        /// Cache entry now registered on `PATH`.
        path: Utf8PathBuf,
    },
}

impl InstallOutcome {
    /// Cache entry directory holding the executable.
    #[must_use]
    pub const fn path(&self) -> &Utf8PathBuf {
        match self {
            Self::Cached { path } | Self::Downloaded { path } => path,
        }
    }

    /// Returns `true` when the request was served without a download.
    #[must_use]
    pub const fn was_cached(&self) -> bool {
        matches!(self, Self::Cached { .. })
    }
}

/// Boxed future returned by [`Fetcher`] implementations.
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CacheError>> + 'a>>;

/// Abstraction over archive download to support fakes in tests.
pub trait Fetcher {
    /// Downloads `url` into the file at `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DownloadFailed`] when the transfer fails.
    fn fetch<'a>(&'a self, url: &'a str, dest: &'a Utf8Path) -> FetchFuture<'a>;
}

/// Production fetcher backed by `reqwest`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str, dest: &'a Utf8Path) -> FetchFuture<'a> {
        Box::pin(async move {
            let failed = |message: String| CacheError::DownloadFailed {
                url: url.to_owned(),
                message,
            };
            let response = reqwest::get(url)
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|err| failed(err.to_string()))?;
            let body = response
                .bytes()
                .await
                .map_err(|err| failed(err.to_string()))?;
            tokio::fs::write(dest, &body)
                .await
                .map_err(|err| failed(err.to_string()))
        })
    }
}

/// Versioned on-disk cache rooted at a well-known directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ToolCache {
    root: Utf8PathBuf,
}

impl ToolCache {
    /// Creates a cache rooted at `root`. Nothing is created on disk until an
    /// install happens.
    #[must_use]
    pub const fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    /// Looks up a complete cache entry for `(tool, version)`.
    #[must_use]
    pub fn find(&self, tool: &str, version: &str) -> Option<Utf8PathBuf> {
        let entry = self.entry_dir(tool, version);
        if entry.join(COMPLETE_MARKER).is_file() {
            Some(entry)
        } else {
            None
        }
    }

    /// Ensures `tool` at `version` is installed and registered on `PATH`.
    ///
    /// A cache hit performs no network call and creates no directories; a
    /// miss downloads the archive described by `info`, extracts it into the
    /// install directory, records the result under the cache key, and then
    /// registers the entry on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the download, extraction, cache write, or
    /// `PATH` registration fails. Failures here are fatal and are not
    /// retried at this layer.
    pub async fn ensure_installed(
        &self,
        tool: &str,
        version: &str,
        info: &PlatformInfo,
        fetcher: &dyn Fetcher,
    ) -> Result<InstallOutcome, CacheError> {
        if let Some(existing) = self.find(tool, version) {
            info!(tool, version, path = %existing, "binary already cached; skipping download");
            ci::add_path(&existing).map_err(CacheError::PathRegistration)?;
            return Ok(InstallOutcome::Cached { path: existing });
        }

        let install_dir = &info.install_dir;
        tokio::fs::create_dir_all(install_dir)
            .await
            .map_err(|source| CacheError::Io {
                path: install_dir.clone(),
                source,
            })?;
        self.remove_stale(install_dir, tool).await?;

        info!(tool, url = %info.download_url, "downloading tunnel binary");
        let archive = install_dir.join(ARCHIVE_NAME);
        fetcher.fetch(&info.download_url, &archive).await?;
        extract_archive(&archive, install_dir)?;
        tokio::fs::remove_file(&archive)
            .await
            .map_err(|source| CacheError::Io {
                path: archive,
                source,
            })?;
        debug!(tool, path = %install_dir, "binary extracted");

        let cached = self.cache_dir(install_dir, tool, version).await?;
        ci::add_path(&cached).map_err(CacheError::PathRegistration)?;
        info!(tool, version, path = %cached, "binary installed and cached");
        Ok(InstallOutcome::Downloaded { path: cached })
    }

    /// Copies the files of `extracted` into the cache entry for
    /// `(tool, version)` and marks the entry complete.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] when the entry cannot be written.
    pub async fn cache_dir(
        &self,
        extracted: &Utf8Path,
        tool: &str,
        version: &str,
    ) -> Result<Utf8PathBuf, CacheError> {
        let entry = self.entry_dir(tool, version);
        tokio::fs::create_dir_all(&entry)
            .await
            .map_err(|source| CacheError::Io {
                path: entry.clone(),
                source,
            })?;

        let mut listing =
            tokio::fs::read_dir(extracted)
                .await
                .map_err(|source| CacheError::Io {
                    path: extracted.to_owned(),
                    source,
                })?;
        while let Some(item) = listing
            .next_entry()
            .await
            .map_err(|source| CacheError::Io {
                path: extracted.to_owned(),
                source,
            })?
        {
            let raw_name = item.file_name();
            let Some(file_name) = raw_name.to_str() else {
                continue;
            };
            if !item.path().is_file() {
                continue;
            }
            let dest = entry.join(file_name);
            tokio::fs::copy(item.path(), &dest)
                .await
                .map_err(|source| CacheError::Io {
                    path: dest,
                    source,
                })?;
        }

        let marker = entry.join(COMPLETE_MARKER);
        tokio::fs::write(&marker, b"")
            .await
            .map_err(|source| CacheError::Io {
                path: marker,
                source,
            })?;
        Ok(entry)
    }

    fn entry_dir(&self, tool: &str, version: &str) -> Utf8PathBuf {
        self.root.join(tool).join(version)
    }

    async fn remove_stale(&self, install_dir: &Utf8Path, tool: &str) -> Result<(), CacheError> {
        for name in [
            ARCHIVE_NAME.to_owned(),
            tool.to_owned(),
            format!("{tool}.exe"),
        ] {
            let stale = install_dir.join(&name);
            match tokio::fs::remove_file(&stale).await {
                Ok(()) => debug!(path = %stale, "removed stale file"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Io {
                    path: stale,
                    source,
                }),
            }
        }
        Ok(())
    }
}

/// Extracts every file entry of the zip at `archive` into `dest`.
///
/// Entries with unsafe paths are skipped. On Unix each extracted file is made
/// executable; re-zipped vendor archives routinely drop the permission bit.
fn extract_archive(archive: &Utf8Path, dest: &Utf8Path) -> Result<(), CacheError> {
    let failed = |message: String| CacheError::ExtractFailed {
        archive: archive.to_owned(),
        message,
    };

    let file = std::fs::File::open(archive).map_err(|err| failed(err.to_string()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|err| failed(err.to_string()))?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|err| failed(err.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if entry.is_dir() {
            continue;
        }

        let target = dest.join(name);
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|err| failed(err.to_string()))?;
        std::fs::write(&target, &contents).map_err(|err| failed(err.to_string()))?;
        make_executable(&target).map_err(|err| failed(err.to_string()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Utf8Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Utf8Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests;
