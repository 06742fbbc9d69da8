//! Command-line interface definitions for geofetch.
//!
//! Global options control verbosity, configuration and the server; each
//! subcommand maps onto one library operation.
//!
//! # Example
//!
//! ```bash
//! # Download a dataset and print its local path
//! geofetch get @earth_relief_01d
//!
//! # Fetch the tiles covering a region
//! geofetch tiles @earth_relief_01s --region=-81/-80/29/30
//!
//! # Force a manifest refresh, verbosely
//! geofetch -v refresh
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cache::ClearTarget;
use crate::config::Config;
use crate::layout::Placement;
use crate::tiles::Region;

/// Remote dataset acquisition and tile caching for gridded geodata.
#[derive(Debug, Parser)]
#[command(name = "geofetch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: platform config directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Data server base URL
    #[arg(long, value_name = "URL", global = true)]
    pub server: Option<String>,

    /// Never touch the network
    #[arg(long, global = true)]
    pub offline: bool,

    /// Maximum download size (e.g., 500MB, 2GiB)
    #[arg(long, value_name = "SIZE", global = true, value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if self.offline {
            config.offline = true;
        }
        if let Some(size) = self.max_size {
            config.max_download_size = size;
        }
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Make files available locally and print their paths
    Get(GetArgs),
    /// Select and fetch the tiles of a tiled dataset covering a region
    Tiles(TilesArgs),
    /// Refresh the server manifests
    Refresh,
    /// Remove cached or downloaded files
    Clear(ClearArgs),
    /// Show catalog information
    Info(InfoArgs),
    /// Show or save the effective configuration
    Config(ConfigArgs),
}

/// Arguments for the get subcommand.
#[derive(Debug, Args)]
pub struct GetArgs {
    /// Names to fetch: @dataset, @tile, @cache-file, URL or local path
    #[arg(value_name = "NAME", required = true)]
    pub names: Vec<String>,

    /// Where to place downloaded files
    #[arg(short, long, value_enum, default_value = "default")]
    pub placement: PlacementArg,
}

/// Arguments for the tiles subcommand.
#[derive(Debug, Args)]
pub struct TilesArgs {
    /// Tiled dataset name (e.g., @earth_relief_01s)
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Region as west/east/south/north, or g for the globe
    #[arg(short = 'R', long, value_name = "W/E/S/N", allow_hyphen_values = true)]
    pub region: Region,

    /// Only print the tile list, do not download
    #[arg(long)]
    pub list_only: bool,
}

/// Arguments for the clear subcommand.
#[derive(Debug, Args)]
pub struct ClearArgs {
    /// What to remove
    #[arg(value_enum, default_value = "cache")]
    pub target: ClearArg,
}

/// Arguments for the info subcommand.
#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Dataset to describe; all datasets are listed if omitted
    #[arg(value_name = "NAME")]
    pub name: Option<String>,
}

/// Arguments for the config subcommand.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Print the configuration file path instead
    #[arg(long)]
    pub path: bool,

    /// Write the effective configuration to the configuration file
    #[arg(long, conflicts_with = "path")]
    pub save: bool,
}

/// Download placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlacementArg {
    /// Datasets to the data directory, other files to the cache
    Default,
    /// The cache directory
    Cache,
    /// The user data directory
    User,
    /// The current directory
    Local,
}

impl From<PlacementArg> for Placement {
    fn from(arg: PlacementArg) -> Self {
        match arg {
            PlacementArg::Default => Placement::Default,
            PlacementArg::Cache => Placement::Cache,
            PlacementArg::User => Placement::User,
            PlacementArg::Local => Placement::Local,
        }
    }
}

/// What `clear` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClearArg {
    /// Cache files and URL downloads
    Cache,
    /// Downloaded datasets, tiles and manifests
    Data,
    /// Both
    All,
}

impl From<ClearArg> for ClearTarget {
    fn from(arg: ClearArg) -> Self {
        match arg {
            ClearArg::Cache => ClearTarget::Cache,
            ClearArg::Data => ClearTarget::Data,
            ClearArg::All => ClearTarget::All,
        }
    }
}

/// Parse a size such as `500MB` or `2 GiB` into bytes.
///
/// ```
/// use geofetch::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
pub fn parse_size(s: &str) -> Result<u64, String> {
    s.trim()
        .parse::<bytesize::ByteSize>()
        .map(|size| size.as_u64())
        .map_err(|e| format!("invalid size {s:?}: {e}"))
}
