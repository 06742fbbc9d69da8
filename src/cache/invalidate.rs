//! Eviction of local copies that no longer match the server.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate};
use walkdir::WalkDir;

use crate::error::RemoteError;
use crate::layout::Layout;
use crate::lock::FileLock;
use crate::manifest::{Catalog, HashManifest, TILE_LOCAL_EXT, TILE_REMOTE_EXT};

/// What an invalidation pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Local files that were listed in the old manifest.
    pub examined: usize,
    /// Files or directories deleted.
    pub removed: Vec<PathBuf>,
    /// Files examined and kept.
    pub kept: usize,
}

impl InvalidationReport {
    fn merge(&mut self, other: Self) {
        self.examined += other.examined;
        self.removed.extend(other.removed);
        self.kept += other.kept;
    }
}

/// Why a cached file is being evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Keep,
    Discontinued,
    Changed,
}

/// Result of trying to delete one cached file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Eviction {
    Removed,
    Busy,
    Failed,
}

/// Delete `path` under its download lock. A file whose lock is held is
/// being written right now and is left to its writer.
fn evict(lock_dir: &Path, path: &Path) -> Eviction {
    let lock = match FileLock::acquire(lock_dir, path, Some(Duration::ZERO)) {
        Ok(lock) => lock,
        Err(RemoteError::LockTimeout(_)) => {
            log::debug!("{} is being downloaded, not evicting it", path.display());
            return Eviction::Busy;
        }
        Err(e) => {
            log::warn!("Cannot lock {}: {}", path.display(), e);
            return Eviction::Failed;
        }
    };
    let outcome = match fs::remove_file(path) {
        Ok(()) => Eviction::Removed,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Eviction::Failed,
        Err(e) => {
            log::warn!("Could not remove {}: {}", path.display(), e);
            Eviction::Failed
        }
    };
    lock.release();
    outcome
}

/// Name under which a local file is listed in the hash manifest.
///
/// Tiles are published compressed and stored converted, so
/// `N29W081.earth_relief_01s_g.nc` inside `earth_relief_01s_g/` is listed
/// as `N29W081.earth_relief_01s_g.jp2`.
fn manifest_name(path: &Path) -> Option<(String, bool)> {
    let name = path.file_name()?.to_str()?;
    let parent = path.parent()?.file_name()?.to_str()?;
    if let Some(stem) = name.strip_suffix(TILE_LOCAL_EXT) {
        if stem.ends_with(&format!(".{parent}")) {
            return Some((format!("{stem}{TILE_REMOTE_EXT}"), true));
        }
    }
    Some((name.to_string(), false))
}

fn judge(old: &HashManifest, new: &HashManifest, path: &Path) -> Option<Verdict> {
    let (key, converted) = manifest_name(path)?;
    let before = old.get(&key)?;
    let Some(after) = new.get(&key) else {
        return Some(Verdict::Discontinued);
    };
    if before.hash != after.hash || before.size != after.size {
        return Some(Verdict::Changed);
    }
    // A converted tile has its own size on disk.
    if !converted {
        match fs::metadata(path) {
            Ok(meta) if meta.len() != after.size => return Some(Verdict::Changed),
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    Some(Verdict::Keep)
}

/// Delete cached files that changed or disappeared between two hash manifests.
///
/// Walks the server mirror and the cache directory. Only files listed in
/// `old` are considered; anything else was not downloaded from the server
/// and is left alone.
pub fn invalidate_files(old: &HashManifest, new: &HashManifest, layout: &Layout) -> InvalidationReport {
    let mut report = InvalidationReport::default();
    for root in [layout.server_dir(), layout.cache_root().to_path_buf()] {
        report.merge(invalidate_tree(old, new, &root, layout.lock_dir()));
    }
    if !report.removed.is_empty() {
        log::info!(
            "Removed {} outdated file(s) from the local cache",
            report.removed.len()
        );
    }
    report
}

fn invalidate_tree(old: &HashManifest, new: &HashManifest, root: &Path, lock_dir: &Path) -> InvalidationReport {
    let mut report = InvalidationReport::default();
    if !root.is_dir() {
        return report;
    }
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("Skipping unreadable cache entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(verdict) = judge(old, new, path) else {
            continue;
        };
        report.examined += 1;
        match verdict {
            Verdict::Keep => report.kept += 1,
            Verdict::Discontinued | Verdict::Changed => {
                log::debug!("{:?}: removing {}", verdict, path.display());
                match evict(lock_dir, path) {
                    Eviction::Removed => report.removed.push(path.to_path_buf()),
                    Eviction::Busy => report.kept += 1,
                    Eviction::Failed => {}
                }
            }
        }
    }
    report
}

fn modified_date(path: &Path) -> io::Result<NaiveDate> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Local>::from(modified).date_naive())
}

/// Remove tile directories whose dataset was republished after they were filled.
///
/// Compares each tiled dataset's release date with the modification date of
/// its local tile directory. The directory is repopulated tile by tile on
/// later requests.
pub fn expire_directories(catalog: &Catalog, layout: &Layout) -> InvalidationReport {
    let mut report = InvalidationReport::default();
    for entry in catalog.entries().iter().filter(|e| e.is_tiled()) {
        let dir = Layout::join_remote_dir(layout.user_root(), &entry.remote_dir).join(entry.tag());
        let Ok(local_date) = modified_date(&dir) else {
            continue;
        };
        report.examined += 1;
        if local_date >= entry.release_date {
            report.kept += 1;
            continue;
        }
        log::info!(
            "{} was updated on {}; removing local tiles from {}",
            entry.tag(),
            entry.release_date,
            local_date
        );
        if clear_directory(&dir, layout.lock_dir()) {
            report.removed.push(dir);
        } else {
            report.kept += 1;
        }
    }
    report
}

/// Evict every file below `dir` under its lock, then the emptied
/// directories. Returns whether `dir` itself is gone; it stays when a tile
/// in it is being downloaded.
fn clear_directory(dir: &Path, lock_dir: &Path) -> bool {
    let mut busy = false;
    for entry in WalkDir::new(dir).follow_links(false).contents_first(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("Skipping unreadable tile entry: {e}");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            // Fails harmlessly while a busy tile is still inside.
            let _ = fs::remove_dir(entry.path());
        } else if evict(lock_dir, entry.path()) == Eviction::Busy {
            busy = true;
        }
    }
    if busy {
        log::info!("Kept {} because tiles are being downloaded into it", dir.display());
    }
    !dir.exists()
}
