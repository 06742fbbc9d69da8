//! Locked, interrupt-safe file downloads.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytesize::ByteSize;
use sha2::{Digest, Sha256};

use super::transport::{Transport, TransportError};
use crate::error::{RemoteError, RemoteResult};
use crate::layout::ensure_dir;
use crate::lock::FileLock;
use crate::progress::DownloadProgress;
use crate::session::Session;
use crate::signal::{InterruptGuard, ShutdownHandler};

/// What [`Downloader::fetch`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file was transferred.
    Downloaded { bytes: u64 },
    /// Another process completed the file while we waited for the lock.
    AlreadyPresent,
}

/// Downloads remote files into the local cache.
///
/// Each transfer runs under the destination's [`FileLock`]; the destination
/// is registered for deletion on interrupt while bytes are flowing, and a
/// failed transfer never leaves a partial file behind.
#[derive(Clone)]
pub struct Downloader {
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    lock_dir: PathBuf,
    size_limit: u64,
    lock_timeout: Option<Duration>,
    shutdown: Option<ShutdownHandler>,
    progress: Option<Arc<dyn DownloadProgress>>,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("lock_dir", &self.lock_dir)
            .field("size_limit", &self.size_limit)
            .field("lock_timeout", &self.lock_timeout)
            .field("progress", &self.progress.as_ref().map(|_| "<progress>"))
            .finish()
    }
}

impl Downloader {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<Session>, lock_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            session,
            lock_dir: lock_dir.into(),
            size_limit: 0,
            lock_timeout: None,
            shutdown: None,
            progress: None,
        }
    }

    /// Refuse files larger than `limit` bytes (0 = unlimited).
    #[must_use]
    pub fn with_size_limit(mut self, limit: u64) -> Self {
        self.size_limit = limit;
        self
    }

    /// Stop waiting for a busy lock after `timeout`.
    #[must_use]
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Abort transfers when shutdown is requested.
    #[must_use]
    pub fn with_shutdown(mut self, handler: ShutdownHandler) -> Self {
        self.shutdown = Some(handler);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn DownloadProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    #[must_use]
    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    /// Download `url` to `dest` unless it already exists once the lock is held.
    pub fn fetch(&self, url: &str, dest: &Path) -> RemoteResult<FetchOutcome> {
        self.fetch_verified(url, dest, None)
    }

    /// Like [`Downloader::fetch`], but a fresh download must match the
    /// SHA-256 `expected`. The check runs before the lock is released, so
    /// no other process ever sees a file that fails it.
    pub fn fetch_verified(&self, url: &str, dest: &Path, expected: Option<&str>) -> RemoteResult<FetchOutcome> {
        if self.session.network_disabled() {
            return Err(RemoteError::NetworkUnavailable(format!(
                "network access is disabled for this session, cannot fetch {url}"
            )));
        }
        if let Some(parent) = dest.parent() {
            ensure_dir(parent)?;
        }

        let lock = FileLock::acquire(&self.lock_dir, dest, self.lock_timeout)?;
        let _marker_guard = InterruptGuard::register_marker(lock.marker());
        if dest.exists() {
            if lock.is_stale() {
                log::warn!("Discarding possibly incomplete {}", dest.display());
                std::fs::remove_file(dest)?;
            } else {
                log::debug!("{} was completed by another process", dest.display());
                return Ok(FetchOutcome::AlreadyPresent);
            }
        }

        let total = self.preflight(url, dest)?;

        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(progress) = &self.progress {
            progress.on_start(&name, total);
        }

        let guard = InterruptGuard::register(dest);
        let result = self.transfer(url, dest);
        drop(guard);

        if let Some(progress) = &self.progress {
            progress.on_finish(&name, result.is_ok());
        }
        match result {
            Ok(bytes) => {
                log::debug!("Fetched {} ({})", url, ByteSize(bytes));
                if let Some(expected) = expected {
                    verify_sha256(dest, expected)?;
                }
                Ok(FetchOutcome::Downloaded { bytes })
            }
            Err(err) => {
                remove_partial(dest);
                Err(err)
            }
        }
        // `lock` is released here, after the file is complete or removed.
    }

    /// Size pre-check. Returns the advertised length when one was requested.
    fn preflight(&self, url: &str, dest: &Path) -> RemoteResult<Option<u64>> {
        if self.size_limit == 0 {
            return Ok(None);
        }
        let length = self
            .transport
            .content_length(url)
            .map_err(|e| self.map_transport_error(e, dest))?;
        match length {
            Some(size) if size > self.size_limit => Err(RemoteError::TooLarge {
                url: url.to_string(),
                size: ByteSize(size),
                limit: ByteSize(self.size_limit),
            }),
            other => Ok(other),
        }
    }

    fn transfer(&self, url: &str, dest: &Path) -> RemoteResult<u64> {
        let mut file: Option<File> = None;
        let shutdown = self.shutdown.as_ref();
        let progress = self.progress.as_deref();

        let mut sink = |chunk: &[u8]| -> io::Result<()> {
            if shutdown.is_some_and(ShutdownHandler::is_shutdown_requested) {
                return Err(io::Error::new(ErrorKind::Interrupted, "shutdown requested"));
            }
            // Created on the first byte so a dead connection leaves nothing behind.
            if file.is_none() {
                file = Some(File::create(dest)?);
            }
            if let Some(f) = file.as_mut() {
                f.write_all(chunk)?;
            }
            if let Some(p) = progress {
                p.on_bytes(chunk.len() as u64);
            }
            Ok(())
        };
        let bytes = self
            .transport
            .fetch(url, &mut sink)
            .map_err(|e| self.map_transport_error(e, dest))?;

        let file = match file {
            Some(f) => f,
            None => File::create(dest)?,
        };
        file.sync_all()?;
        Ok(bytes)
    }

    fn map_transport_error(&self, err: TransportError, dest: &Path) -> RemoteError {
        if err.is_unreachable() {
            if self.session.disable_network() {
                log::warn!("{err}; remote access disabled for the rest of this session");
            }
            return RemoteError::NetworkUnavailable(err.to_string());
        }
        match err {
            TransportError::NotFound(url) => RemoteError::not_found(url),
            TransportError::Status { url, status } => RemoteError::Http { url, status },
            TransportError::Aborted(_) => RemoteError::Interrupted(dest.to_path_buf()),
            TransportError::Sink(e) if e.kind() == ErrorKind::Interrupted => {
                RemoteError::Interrupted(dest.to_path_buf())
            }
            TransportError::Sink(e) => RemoteError::Io(e),
            other => RemoteError::Io(io::Error::other(other.to_string())),
        }
    }
}

fn remove_partial(dest: &Path) {
    match std::fs::remove_file(dest) {
        Ok(()) => log::debug!("Removed partial download {}", dest.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove partial download {}: {}", dest.display(), e),
    }
}

/// SHA-256 of a file as lowercase hex.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Check `path` against an expected SHA-256, deleting it on mismatch.
pub fn verify_sha256(path: &Path, expected: &str) -> RemoteResult<()> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        return Ok(());
    }
    remove_partial(path);
    Err(RemoteError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("SHA-256 {actual} does not match published {expected}"),
    })
}
