//! Local directory layout of the data cache.
//!
//! ```text
//! <user_root>/server/<catalog dir><file>                     plain datasets
//! <user_root>/server/<catalog dir><tag>/<tile>.<local ext>   tiles
//! <user_root>/server/hash_server.txt, data_server.txt        manifests
//! <cache_root>/<name>                                        cache files, URLs
//! <cache_root>/blend/<list>                                  tile lists
//! <lock_dir>/<basename>.download                             lock markers
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::{project_dirs, Config};

/// Subdirectory of the user root mirroring the server tree.
pub const SERVER_DIR: &str = "server";

/// Remote subdirectory for cache-shorthand files.
pub const REMOTE_CACHE_DIR: &str = "cache";

/// Where a resolved file should be placed locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Per-type default: catalog datasets and tiles go to the user data
    /// tree, everything else to the cache directory.
    #[default]
    Default,
    /// Always the cache directory.
    Cache,
    /// Always the user data directory.
    User,
    /// The current working directory.
    Local,
}

/// Resolved directory roots and server base URL.
#[derive(Debug, Clone)]
pub struct Layout {
    user_root: PathBuf,
    cache_root: PathBuf,
    local_dir: PathBuf,
    lock_dir: PathBuf,
    server_url: String,
}

impl Layout {
    /// Build a layout with explicit roots.
    pub fn new(
        user_root: impl Into<PathBuf>,
        cache_root: impl Into<PathBuf>,
        lock_dir: impl Into<PathBuf>,
        server_url: impl Into<String>,
    ) -> Self {
        Self {
            user_root: user_root.into(),
            cache_root: cache_root.into(),
            local_dir: PathBuf::from("."),
            lock_dir: lock_dir.into(),
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the layout from configuration, falling back to platform directories.
    pub fn from_config(config: &Config) -> Result<Self> {
        let (user_root, cache_root) = match (&config.user_dir, &config.cache_dir) {
            (Some(user), Some(cache)) => (user.clone(), cache.clone()),
            (user, cache) => {
                let dirs = project_dirs()?;
                (
                    user.clone().unwrap_or_else(|| dirs.data_dir().to_path_buf()),
                    cache.clone().unwrap_or_else(|| dirs.cache_dir().to_path_buf()),
                )
            }
        };
        let lock_dir = config
            .lock_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("geofetch"));
        let mut layout = Self::new(user_root, cache_root, lock_dir, config.server_base());
        layout.local_dir = std::env::current_dir()?;
        Ok(layout)
    }

    /// Override the directory used for [`Placement::Local`].
    #[must_use]
    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = dir.into();
        self
    }

    pub fn user_root(&self) -> &Path {
        &self.user_root
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Local mirror of the server tree.
    #[must_use]
    pub fn server_dir(&self) -> PathBuf {
        self.user_root.join(SERVER_DIR)
    }

    /// Directory for blend tile lists.
    #[must_use]
    pub fn blend_dir(&self) -> PathBuf {
        self.cache_root.join("blend")
    }

    /// Root directory for a placement, given the per-type default.
    #[must_use]
    pub fn root_for(&self, placement: Placement, default: Placement) -> &Path {
        match placement {
            Placement::Default => match default {
                Placement::Cache => &self.cache_root,
                Placement::Local => &self.local_dir,
                _ => &self.user_root,
            },
            Placement::Cache => &self.cache_root,
            Placement::User => &self.user_root,
            Placement::Local => &self.local_dir,
        }
    }

    /// Join a server-relative path such as `/server/earth/relief/` onto a root.
    #[must_use]
    pub fn join_remote_dir(root: &Path, remote_dir: &str) -> PathBuf {
        root.join(remote_dir.trim_start_matches('/'))
    }

    /// Full URL for a server-relative path.
    #[must_use]
    pub fn url_for(&self, remote_path: &str) -> String {
        format!("{}/{}", self.server_url, remote_path.trim_start_matches('/'))
    }
}

/// Create a directory tree, tolerating concurrent creation.
pub fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    match std::fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}
