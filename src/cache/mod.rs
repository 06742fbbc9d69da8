//! Local cache maintenance.
//!
//! # Invalidation
//!
//! * [`invalidate_files`]: after the hash manifest is replaced, every cached
//!   file listed in the old manifest is checked against the new one and
//!   deleted if it was discontinued or its hash or size changed.
//! * [`expire_directories`]: after the catalog is replaced, tile directories
//!   older than their dataset's release date are removed wholesale.
//!
//! Both passes run at most once per manifest update.
//!
//! # Clearing
//!
//! [`clear`] removes the cache directory, the downloaded data tree, or both.

pub mod invalidate;

use std::io;
use std::path::PathBuf;

pub use invalidate::{expire_directories, invalidate_files, InvalidationReport};

use crate::layout::Layout;

/// What [`clear`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTarget {
    /// Files fetched from URLs or the server's cache directory.
    Cache,
    /// Downloaded datasets, tiles and manifests.
    Data,
    All,
}

/// Remove cached content. Missing directories are not an error.
pub fn clear(layout: &Layout, target: ClearTarget) -> io::Result<Vec<PathBuf>> {
    let dirs: Vec<PathBuf> = match target {
        ClearTarget::Cache => vec![layout.cache_root().to_path_buf()],
        ClearTarget::Data => vec![layout.server_dir()],
        ClearTarget::All => vec![layout.cache_root().to_path_buf(), layout.server_dir()],
    };
    let mut removed = Vec::new();
    for dir in dirs {
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {
                log::info!("Removed {}", dir.display());
                removed.push(dir);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} does not exist", dir.display());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}
