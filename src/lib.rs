//! geofetch - Remote dataset acquisition and tile caching
//!
//! Resolves symbolic dataset names to locally cached files, downloading them
//! from a data server only when needed. Local copies are kept current against
//! the server's hash manifest, concurrent processes are serialized per file
//! with advisory locks, and datasets published as tiles are fetched tile by
//! tile for just the requested region.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod layout;
pub mod lock;
pub mod logging;
pub mod manifest;
pub mod progress;
pub mod remote;
pub mod resolver;
pub mod session;
pub mod signal;
pub mod tiles;

pub use app::run_app;
pub use error::{RemoteError, RemoteResult};
pub use layout::{Layout, Placement};
pub use remote::RemoteData;
