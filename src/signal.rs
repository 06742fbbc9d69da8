//! Interrupt handling for in-flight downloads.
//!
//! A download writes straight into its destination path, so an interrupt
//! must not leave a truncated file behind that a later run would trust as
//! a cached copy. Every transfer registers its destination through an
//! [`InterruptGuard`] for exactly the duration of the transfer. When Ctrl+C
//! arrives the handler:
//!
//! 1. sets the shared shutdown flag (transfers poll it between chunks),
//! 2. deletes every file currently registered, then the lock markers,
//! 3. exits with code 130 (128 + SIGINT).
//!
//! Exiting skips destructors, so lock markers are registered too. Data
//! files go first: once a marker is gone another process may trust
//! whatever sits at the destination.
//!
//! # Usage
//!
//! ```rust,no_run
//! use geofetch::signal::{install_handler, InterruptGuard};
//! use std::path::Path;
//!
//! let handler = install_handler().expect("Failed to install signal handler");
//!
//! {
//!     let _guard = InterruptGuard::register(Path::new("/tmp/tile.nc"));
//!     // ... transfer ...
//! } // deregistered here on every exit path
//!
//! if handler.is_shutdown_requested() {
//!     return;
//! }
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// Process exit status after Ctrl+C (128 + SIGINT).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Cancellation flag polled by transfers between chunks.
///
/// Cloning is cheap and every clone observes the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    requested: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// A handler with no cancellation requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a transfer observing this handler should stop.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Ask every transfer sharing this handler to stop at its next chunk.
    pub fn request_shutdown(&self) {
        self.requested.store(true, Ordering::Release);
    }
}

/// The Ctrl+C hook could not be registered.
#[derive(Debug, thiserror::Error)]
#[error("cannot hook Ctrl+C: {0}")]
pub struct SignalError(#[from] ctrlc::Error);

static INSTALLED: OnceLock<ShutdownHandler> = OnceLock::new();

/// A path registered for deletion, and whether it is a lock marker.
type Pending = (PathBuf, bool);

/// Files to delete if the process is interrupted, keyed by guard id.
static PENDING: OnceLock<Mutex<HashMap<u64, Pending>>> = OnceLock::new();

static NEXT_GUARD_ID: AtomicU64 = AtomicU64::new(1);

fn pending() -> &'static Mutex<HashMap<u64, Pending>> {
    PENDING.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Scoped registration of a file that must be deleted on interrupt.
///
/// Registration lasts until the guard is dropped, which happens on every
/// exit path of the transfer that owns it (success, error, panic unwind).
#[derive(Debug)]
pub struct InterruptGuard {
    id: u64,
    path: PathBuf,
}

impl InterruptGuard {
    /// Register `path` for deletion on interrupt.
    #[must_use]
    pub fn register(path: &Path) -> Self {
        Self::insert(path, false)
    }

    /// Register a lock marker, removed after every registered data file.
    #[must_use]
    pub fn register_marker(path: &Path) -> Self {
        Self::insert(path, true)
    }

    fn insert(path: &Path, marker: bool) -> Self {
        let id = NEXT_GUARD_ID.fetch_add(1, Ordering::Relaxed);
        let mut map = pending().lock().unwrap_or_else(|e| e.into_inner());
        map.insert(id, (path.to_path_buf(), marker));
        log::trace!("Registered {} for interrupt cleanup", path.display());
        Self {
            id,
            path: path.to_path_buf(),
        }
    }

    /// The registered path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        let mut map = pending().lock().unwrap_or_else(|e| e.into_inner());
        map.remove(&self.id);
    }
}

/// Paths currently registered for interrupt cleanup.
#[must_use]
pub fn pending_paths() -> Vec<PathBuf> {
    let map = pending().lock().unwrap_or_else(|e| e.into_inner());
    map.values().map(|(path, _)| path.clone()).collect()
}

/// Delete every registered file, then every registered lock marker.
/// Returns the number of data files removed.
///
/// Called from the Ctrl+C handler; missing files are ignored.
pub fn cleanup_pending() -> usize {
    let map = pending().lock().unwrap_or_else(|e| e.into_inner());
    remove_files(map.values().cloned().collect())
}

fn remove_files(mut entries: Vec<Pending>) -> usize {
    entries.sort_by_key(|(_, marker)| *marker);
    entries
        .iter()
        .filter(|(path, marker)| std::fs::remove_file(path).is_ok() && !marker)
        .count()
}

/// Hook Ctrl+C so that it removes partial downloads and exits with
/// [`EXIT_CODE_INTERRUPTED`].
///
/// Repeated calls return the first handler. When the process hook is owned
/// by someone else (parallel tests, an embedding application) the returned
/// handler is not wired to Ctrl+C but can still be triggered manually.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(existing) = INSTALLED.get() {
        return Ok(existing.clone());
    }

    let handler = ShutdownHandler::new();
    let hooked = handler.clone();
    let outcome = ctrlc::set_handler(move || {
        hooked.request_shutdown();
        let removed = cleanup_pending();
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "\nInterrupted; removed {removed} partial download(s).");
        let _ = stderr.flush();
        std::process::exit(EXIT_CODE_INTERRUPTED);
    });

    match outcome {
        Ok(()) => {}
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C is already hooked elsewhere; cancellation is manual only");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(INSTALLED.get_or_init(|| handler).clone())
}
