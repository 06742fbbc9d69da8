//! Server-published manifests.
//!
//! Two small files describe what the server offers:
//!
//! * [`hash`]: every remote file with its SHA-256 and byte size, used to
//!   detect stale local copies.
//! * [`catalog`]: every dataset with its location, resolution, registration
//!   and tiling metadata, used to resolve symbolic names.
//!
//! [`format`] holds the shared line-oriented parser and [`store`] keeps the
//! local copies current.

pub mod catalog;
pub mod format;
pub mod hash;
pub mod store;

pub use catalog::{Catalog, CatalogEntry, Registration, TILE_LOCAL_EXT, TILE_REMOTE_EXT};
pub use format::{Manifest, ManifestParseError, Version};
pub use hash::{HashEntry, HashManifest};
pub use store::{ManifestStore, RefreshOutcome};

/// The two manifest kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    Hash,
    Catalog,
}

impl ManifestKind {
    /// File name, both locally (under the server mirror) and on the server.
    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Hash => "hash_server.txt",
            Self::Catalog => "data_server.txt",
        }
    }
}

impl std::fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hash => write!(f, "hash manifest"),
            Self::Catalog => write!(f, "catalog manifest"),
        }
    }
}
