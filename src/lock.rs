//! Cross-process file locks keyed by destination path.
//!
//! A lock is an OS advisory lock on a marker file `<basename><suffix>` in
//! the shared lock directory. Holding it means "this destination is being
//! written". Releasing the lock deletes the marker.
//!
//! After [`FileLock::acquire`] returns the caller must check again whether
//! the destination now exists: another process may have finished the work
//! while we were blocked.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs4::FileExt;

use crate::error::{RemoteError, RemoteResult};
use crate::layout::ensure_dir;

/// Marker suffix for downloads.
pub const DOWNLOAD_SUFFIX: &str = ".download";

/// Marker suffix for manifest swaps.
pub const SWAP_SUFFIX: &str = ".swap";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive lock held on a marker file. Released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: Option<File>,
    marker: PathBuf,
    stale: bool,
}

impl FileLock {
    /// Marker path guarding `target`.
    #[must_use]
    pub fn marker_path(lock_dir: &Path, target: &Path, suffix: &str) -> PathBuf {
        let base = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        lock_dir.join(format!("{base}{suffix}"))
    }

    /// Whether a download marker for `target` currently exists.
    #[must_use]
    pub fn in_progress(lock_dir: &Path, target: &Path) -> bool {
        Self::marker_path(lock_dir, target, DOWNLOAD_SUFFIX).exists()
    }

    /// Take the download lock for `target`, blocking until it is available.
    pub fn acquire(lock_dir: &Path, target: &Path, timeout: Option<Duration>) -> RemoteResult<Self> {
        Self::acquire_marker(Self::marker_path(lock_dir, target, DOWNLOAD_SUFFIX), timeout)
    }

    /// Take an exclusive lock on an explicit marker path.
    ///
    /// With a `timeout`, gives up with [`RemoteError::LockTimeout`] once it
    /// elapses; without one, blocks indefinitely.
    pub fn acquire_marker(marker: PathBuf, timeout: Option<Duration>) -> RemoteResult<Self> {
        if let Some(dir) = marker.parent() {
            ensure_dir(dir)?;
        }
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let previous = file_id_at(&marker);
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&marker)?;

            let contended = match file.try_lock_exclusive() {
                Ok(()) => false,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    log::debug!("Waiting for lock {}", marker.display());
                    wait_for_lock(&file, &marker, deadline)?;
                    true
                }
                Err(e) => return Err(e.into()),
            };

            // The previous holder deletes the marker on release; if we locked
            // an unlinked file, start over on the current one.
            if !same_file(&file, &marker) {
                let _ = FileExt::unlock(&file);
                continue;
            }

            // An uncontended lock on a marker that was already there means
            // its owner died. A marker recreated since we looked is our own.
            let stale = !contended && previous.is_some() && previous == file_id(&file);
            if stale {
                log::warn!("Found stale lock marker {}", marker.display());
            }
            return Ok(Self {
                file: Some(file),
                marker,
                stale,
            });
        }
    }

    /// Whether the marker was left behind by a process that died while
    /// holding it. Whatever that process was writing cannot be trusted.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    #[must_use]
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Release the lock and delete the marker.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = std::fs::remove_file(&self.marker) {
                if e.kind() != ErrorKind::NotFound {
                    log::debug!("Could not remove lock marker {}: {}", self.marker.display(), e);
                }
            }
            let _ = FileExt::unlock(&file);
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

fn wait_for_lock(file: &File, marker: &Path, deadline: Option<Instant>) -> RemoteResult<()> {
    let Some(deadline) = deadline else {
        file.lock_exclusive()?;
        return Ok(());
    };
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(RemoteError::LockTimeout(marker.to_path_buf()));
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn identity(meta: &std::fs::Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn identity(_meta: &std::fs::Metadata) -> Option<(u64, u64)> {
    Some((0, 0))
}

fn file_id_at(path: &Path) -> Option<(u64, u64)> {
    std::fs::metadata(path).ok().as_ref().and_then(identity)
}

fn file_id(file: &File) -> Option<(u64, u64)> {
    file.metadata().ok().as_ref().and_then(identity)
}

fn same_file(file: &File, path: &Path) -> bool {
    match (file_id(file), file_id_at(path)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
