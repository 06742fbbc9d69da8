//! Local copies of the server manifests.
//!
//! Each manifest is refreshed at most once per process and at most once per
//! refresh interval. A refresh downloads the new copy next to the current
//! one under a swap lock, then swaps it in and runs the matching cache
//! invalidation pass:
//!
//! ```text
//! hash_server.txt.new  --download-->  (validate)
//! hash_server.txt      --rename-->    hash_server.txt.old
//! hash_server.txt.new  --rename-->    hash_server.txt
//! diff .old against current, evict changed files, delete .old
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::format::{Manifest, Record, Version};
use super::{Catalog, HashManifest, ManifestKind};
use crate::cache;
use crate::download::Downloader;
use crate::error::{RemoteError, RemoteResult};
use crate::layout::Layout;
use crate::lock::{FileLock, SWAP_SUFFIX};
use crate::session::Session;

/// Result of [`ManifestStore::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Already attempted in this session.
    Skipped,
    /// The local copy is younger than the refresh interval.
    Fresh,
    /// There was no local copy and one was downloaded.
    Downloaded,
    /// The local copy was replaced by a newer one.
    Updated,
    /// The refresh failed; the previous local copy stays in use.
    KeptExisting,
    /// No local copy and none could be obtained.
    Unavailable,
}

/// Keeps the hash and catalog manifests current.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    layout: Layout,
    downloader: Downloader,
    refresh_interval: Duration,
}

impl ManifestStore {
    pub fn new(layout: Layout, downloader: Downloader) -> Self {
        Self {
            layout,
            downloader,
            refresh_interval: Duration::from_secs(24 * 3600),
        }
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    fn session(&self) -> &Arc<Session> {
        self.downloader.session()
    }

    /// Local path of a manifest.
    #[must_use]
    pub fn path(&self, kind: ManifestKind) -> PathBuf {
        self.layout.server_dir().join(kind.file_name())
    }

    fn url(&self, kind: ManifestKind) -> String {
        self.layout.url_for(kind.file_name())
    }

    /// Bring the local manifest up to date.
    ///
    /// Network failures are not errors: they are logged and reported as
    /// [`RefreshOutcome::KeptExisting`] or [`RefreshOutcome::Unavailable`].
    pub fn refresh(&self, kind: ManifestKind) -> RemoteResult<RefreshOutcome> {
        if !self.session().claim_refresh(kind) {
            return Ok(RefreshOutcome::Skipped);
        }
        let path = self.path(kind);
        let exists = path.is_file();

        if self.session().network_disabled() {
            log::debug!("Network disabled, not refreshing {kind}");
            return Ok(if exists {
                RefreshOutcome::KeptExisting
            } else {
                RefreshOutcome::Unavailable
            });
        }

        if !exists {
            log::debug!("Downloading {kind}");
            return match self.downloader.fetch(&self.url(kind), &path) {
                Ok(_) => {
                    if kind == ManifestKind::Catalog {
                        self.after_catalog_swap();
                    }
                    Ok(RefreshOutcome::Downloaded)
                }
                Err(e) if e.is_soft() => {
                    log::warn!("Could not obtain the {kind}: {e}");
                    Ok(RefreshOutcome::Unavailable)
                }
                Err(e) => Err(e),
            };
        }

        if !self.is_expired(&path) {
            return Ok(RefreshOutcome::Fresh);
        }
        self.swap(kind, &path)
    }

    fn is_expired(&self, path: &Path) -> bool {
        let age = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok());
        match age {
            Some(age) => age > self.refresh_interval,
            None => true,
        }
    }

    fn swap(&self, kind: ManifestKind, path: &Path) -> RemoteResult<RefreshOutcome> {
        let marker = FileLock::marker_path(self.downloader.lock_dir(), path, SWAP_SUFFIX);
        let _lock = FileLock::acquire_marker(marker, None)?;
        // Another process may have swapped while we waited.
        if !self.is_expired(path) {
            return Ok(RefreshOutcome::Fresh);
        }

        let new_path = sibling(path, ".new");
        let old_path = sibling(path, ".old");
        remove_if_exists(&new_path)?;

        log::debug!("Refreshing {kind}");
        if let Err(e) = self.downloader.fetch(&self.url(kind), &new_path) {
            remove_if_exists(&new_path)?;
            if e.is_soft() {
                log::warn!("Could not refresh the {kind}, using the local copy: {e}");
                return Ok(RefreshOutcome::KeptExisting);
            }
            return Err(e);
        }

        let valid = match kind {
            ManifestKind::Hash => read_manifest::<super::HashEntry>(&new_path).map(|_| ()),
            ManifestKind::Catalog => read_manifest::<super::CatalogEntry>(&new_path).map(|_| ()),
        };
        if let Err(e) = valid {
            log::warn!("Downloaded {kind} is unusable, keeping the local copy: {e}");
            remove_if_exists(&new_path)?;
            return Ok(RefreshOutcome::KeptExisting);
        }

        fs::rename(path, &old_path)?;
        fs::rename(&new_path, path)?;

        match kind {
            ManifestKind::Hash => self.after_hash_swap(&old_path, path),
            ManifestKind::Catalog => self.after_catalog_swap(),
        }
        remove_if_exists(&old_path)?;
        Ok(RefreshOutcome::Updated)
    }

    fn after_hash_swap(&self, old_path: &Path, path: &Path) {
        let (Ok(old), Ok(new)) = (
            read_manifest::<super::HashEntry>(old_path),
            read_manifest::<super::HashEntry>(path),
        ) else {
            log::debug!("Previous hash manifest unreadable, skipping invalidation");
            return;
        };
        cache::invalidate_files(&old, &new, &self.layout);
    }

    fn after_catalog_swap(&self) {
        match self.load_catalog() {
            Ok(catalog) => {
                cache::expire_directories(&catalog, &self.layout);
            }
            Err(e) => log::debug!("Skipping tile directory expiry: {e}"),
        }
    }

    /// Parse the local hash manifest.
    pub fn load_hash(&self) -> RemoteResult<HashManifest> {
        self.load(ManifestKind::Hash)
    }

    /// Parse the local catalog manifest.
    pub fn load_catalog(&self) -> RemoteResult<Catalog> {
        self.load(ManifestKind::Catalog)
    }

    /// Parse a local manifest.
    ///
    /// A manifest that fails to parse is deleted so the next refresh starts
    /// clean, and [`RemoteError::Corrupt`] is returned.
    fn load<R: Record>(&self, kind: ManifestKind) -> RemoteResult<Manifest<R>> {
        let path = self.path(kind);
        let manifest = match read_manifest::<R>(&path) {
            Ok(m) => m,
            Err(LoadError::Missing) => return Err(RemoteError::not_found(path.display().to_string())),
            Err(LoadError::Io(e)) => return Err(e.into()),
            Err(LoadError::Parse(e)) => {
                if e.is_corruption() {
                    log::warn!("The local {kind} is truncated or damaged, removing it");
                } else {
                    log::warn!("The local {kind} has a malformed record, removing it");
                }
                remove_if_exists(&path)?;
                return Err(RemoteError::Corrupt {
                    path,
                    reason: e.to_string(),
                });
            }
        };
        if let Some(required) = manifest.min_version() {
            let current = Version::current();
            if required > current {
                log::warn!(
                    "The {kind} requires version {required} or newer (this is {current}); some datasets may not be usable"
                );
            }
        }
        Ok(manifest)
    }
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error("missing")]
    Missing,
    #[error(transparent)]
    Io(std::io::Error),
    #[error(transparent)]
    Parse(super::ManifestParseError),
}

fn read_manifest<R: Record>(path: &Path) -> Result<Manifest<R>, LoadError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(LoadError::Missing),
        Err(e) => return Err(LoadError::Io(e)),
    };
    Manifest::parse(&text).map_err(LoadError::Parse)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
