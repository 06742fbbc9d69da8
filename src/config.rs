//! Application configuration management.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file (`config.toml` in the platform config directory, or an
//!    explicit path)
//! 3. Environment variables prefixed with `GEOFETCH_` (`__` separates
//!    nested keys)
//! 4. CLI flags, applied by the caller after loading
//!
//! Timeouts and size limits use `0` to mean "no limit".

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Default data server.
pub const DEFAULT_SERVER_URL: &str = "https://data.geofetch.dev";

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "GEOFETCH_";

/// Remote acquisition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the data server (no trailing slash).
    pub server_url: String,
    /// Root of the user data tree; the server mirror lives in `<user_dir>/server`.
    pub user_dir: Option<PathBuf>,
    /// Root for cache-shorthand and URL downloads.
    pub cache_dir: Option<PathBuf>,
    /// Directory holding `.download` lock markers.
    pub lock_dir: Option<PathBuf>,
    /// Minimum age before a local manifest is refreshed.
    pub refresh_interval_hours: u64,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Overall transfer timeout in seconds (0 = none).
    pub timeout_secs: u64,
    /// Largest file that may be downloaded, in bytes (0 = unlimited).
    pub max_download_size: u64,
    /// Verify the server's TLS certificate.
    pub verify_peer: bool,
    /// Follow HTTP redirects.
    pub follow_redirects: bool,
    /// Treat HTTP 4xx/5xx responses as failures.
    pub fail_on_error: bool,
    /// Give up waiting for a download lock after this many seconds (0 = wait forever).
    pub lock_timeout_secs: u64,
    /// Check downloaded files against the hash manifest.
    pub verify_hash: bool,
    /// Never touch the network.
    pub offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            user_dir: None,
            cache_dir: None,
            lock_dir: None,
            refresh_interval_hours: 24,
            connect_timeout_secs: 10,
            timeout_secs: 0,
            max_download_size: 0,
            verify_peer: true,
            follow_redirects: true,
            fail_on_error: true,
            lock_timeout_secs: 0,
            verify_hash: false,
            offline: false,
        }
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// When `path` is `None` the platform config file is used if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::config_path().ok().filter(|p| p.exists()),
        };
        Self::figment(file.as_deref())
            .extract()
            .context("Failed to load configuration")
    }

    /// Build the figment used by [`Config::load`].
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Serialize the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Get the default platform-specific configuration path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Refresh interval as a duration.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_hours * 3600)
    }

    /// Overall transfer timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Lock wait timeout, if any.
    #[must_use]
    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock_timeout_secs > 0).then(|| Duration::from_secs(self.lock_timeout_secs))
    }

    /// Server URL without a trailing slash.
    #[must_use]
    pub fn server_base(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}

pub(crate) fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("org", "geofetch", "geofetch")
        .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))
}
