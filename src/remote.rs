//! Remote data access: the entry point tying the subsystem together.
//!
//! [`RemoteData`] owns the layout, the downloader and the manifests, and
//! exposes the three things callers need:
//!
//! * [`RemoteData::locate`]: a local path for any name, downloading it if
//!   needed,
//! * [`RemoteData::tiles_for`]: the tile plan for a tiled dataset and region,
//! * [`RemoteData::grid_for_region`]: the plan handed to a [`Blend`], with
//!   tiles fetched lazily through this value's [`TileSource`] impl.
//!
//! Manifests are refreshed on first use of a remote name, once per session.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::Result;

use crate::config::Config;
use crate::download::{Downloader, FetchOutcome, HttpOptions, HttpTransport, Transport};
use crate::error::{RemoteError, RemoteResult};
use crate::layout::{Layout, Placement};
use crate::manifest::{Catalog, CatalogEntry, HashManifest, ManifestKind, ManifestStore, RefreshOutcome};
use crate::progress::DownloadProgress;
use crate::resolver::{is_remote, NameResolver, Resolution, Target, REMOTE_PREFIX};
use crate::session::Session;
use crate::signal::ShutdownHandler;
use crate::tiles::{
    plan, AssembleError, Blend, CoverageGrid, CoverageSource, GridReader, Region, TextGridReader, TileAssembler,
    TileRequest, TileSource,
};

/// Facade over name resolution, manifests, downloads and tiling.
pub struct RemoteData {
    layout: Layout,
    verify_hash: bool,
    downloader: Downloader,
    store: ManifestStore,
    refreshed: OnceLock<()>,
    catalog: OnceLock<Option<Catalog>>,
    hash: OnceLock<Option<HashManifest>>,
    grid_reader: Box<dyn GridReader>,
}

impl std::fmt::Debug for RemoteData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteData")
            .field("layout", &self.layout)
            .field("verify_hash", &self.verify_hash)
            .field("downloader", &self.downloader)
            .finish_non_exhaustive()
    }
}

impl RemoteData {
    /// Build from explicit parts. Used with a custom [`Transport`].
    pub fn new(config: &Config, layout: Layout, transport: Arc<dyn Transport>) -> Self {
        let session = Arc::new(if config.offline {
            Session::offline()
        } else {
            Session::new()
        });
        let downloader = Downloader::new(transport, session, layout.lock_dir())
            .with_size_limit(config.max_download_size)
            .with_lock_timeout(config.lock_timeout());
        let store = ManifestStore::new(layout.clone(), downloader.clone())
            .with_refresh_interval(config.refresh_interval());
        Self {
            layout,
            verify_hash: config.verify_hash,
            downloader,
            store,
            refreshed: OnceLock::new(),
            catalog: OnceLock::new(),
            hash: OnceLock::new(),
            grid_reader: Box::new(TextGridReader),
        }
    }

    /// Build with the HTTP transport and the configured directories.
    pub fn from_config(config: &Config) -> Result<Self> {
        let layout = Layout::from_config(config)?;
        let transport = HttpTransport::new(HttpOptions::from_config(config))?;
        Ok(Self::new(config, layout, Arc::new(transport)))
    }

    /// Abort transfers when `handler` requests shutdown.
    #[must_use]
    pub fn with_shutdown(mut self, handler: ShutdownHandler) -> Self {
        self.rebuild_downloader(|d| d.with_shutdown(handler));
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn DownloadProgress>) -> Self {
        self.rebuild_downloader(|d| d.with_progress(progress));
        self
    }

    /// Reader used for coverage grids.
    #[must_use]
    pub fn with_grid_reader(mut self, reader: Box<dyn GridReader>) -> Self {
        self.grid_reader = reader;
        self
    }

    fn rebuild_downloader(&mut self, f: impl FnOnce(Downloader) -> Downloader) {
        self.downloader = f(self.downloader.clone());
        self.store = ManifestStore::new(self.layout.clone(), self.downloader.clone())
            .with_refresh_interval(self.store_interval());
    }

    fn store_interval(&self) -> std::time::Duration {
        self.store.refresh_interval()
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        self.downloader.session()
    }

    #[must_use]
    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Refresh both manifests now. Failures are logged, not returned.
    pub fn refresh_manifests(&self) -> Vec<(ManifestKind, RefreshOutcome)> {
        [ManifestKind::Hash, ManifestKind::Catalog]
            .into_iter()
            .filter_map(|kind| match self.store.refresh(kind) {
                Ok(outcome) => Some((kind, outcome)),
                Err(e) => {
                    log::warn!("Could not refresh the {kind}: {e}");
                    None
                }
            })
            .collect()
    }

    fn ensure_manifests(&self) {
        self.refreshed.get_or_init(|| {
            self.refresh_manifests();
        });
    }

    /// The catalog, if one is available locally or could be downloaded.
    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog
            .get_or_init(|| {
                self.ensure_manifests();
                self.store
                    .load_catalog()
                    .map_err(|e| log::warn!("Catalog unavailable, only cached files can be used: {e}"))
                    .ok()
            })
            .as_ref()
    }

    /// The hash manifest, if available.
    pub fn hash_manifest(&self) -> Option<&HashManifest> {
        self.hash
            .get_or_init(|| {
                self.ensure_manifests();
                self.store
                    .load_hash()
                    .map_err(|e| log::warn!("Hash manifest unavailable: {e}"))
                    .ok()
            })
            .as_ref()
    }

    /// Resolve a name without downloading anything.
    ///
    /// Only remote names consult the manifests.
    pub fn resolve(&self, name: &str, placement: Placement) -> RemoteResult<Resolution> {
        let catalog = if is_remote(name) { self.catalog() } else { None };
        NameResolver::new(&self.layout, catalog).resolve(name, placement)
    }

    /// Local path of `name`, downloading it first if needed.
    ///
    /// For a tiled dataset this is its tile directory; use
    /// [`RemoteData::tiles_for`] to get at the data.
    pub fn locate(&self, name: &str, placement: Placement) -> RemoteResult<PathBuf> {
        let resolution = self.resolve(name, placement)?;
        let Some(url) = resolution.remote.as_deref() else {
            log::debug!("{} is available at {}", name, resolution.local.display());
            return Ok(resolution.local);
        };

        let expected = self.expected_hash(&resolution);
        match self
            .downloader
            .fetch_verified(url, &resolution.local, expected.as_deref())
        {
            Ok(FetchOutcome::Downloaded { .. }) => self.announce(&resolution),
            Ok(FetchOutcome::AlreadyPresent) => {}
            Err(RemoteError::NotFound { .. }) if is_remote(name) => {
                return Err(self.not_found(name));
            }
            Err(e) => return Err(e),
        }
        Ok(resolution.local)
    }

    fn not_found(&self, name: &str) -> RemoteError {
        let suggestion = self
            .catalog()
            .and_then(|c| c.suggest(name))
            .map(str::to_string);
        RemoteError::NotFound {
            name: name.to_string(),
            suggestion,
        }
    }

    /// One-time notices after a download.
    fn announce(&self, resolution: &Resolution) {
        if self.session().note_network_use() {
            log::info!("Downloading data from {}", self.layout.server_url());
        }
        let Some(id) = resolution.dataset_id() else {
            return;
        };
        if !self.session().claim_attribution(id) {
            return;
        }
        if let Some(entry) = self.catalog().and_then(|c| c.by_id(id)) {
            log::info!("{}: {}", entry.tag(), entry.attribution);
        }
    }

    /// Published SHA-256 of the file, when verification is enabled.
    fn expected_hash(&self, resolution: &Resolution) -> Option<String> {
        if !self.verify_hash {
            return None;
        }
        let key = resolution.published_as.as_deref()?;
        let entry = self.hash_manifest().and_then(|m| m.get(key));
        if entry.is_none() {
            log::debug!("{key} is not in the hash manifest, skipping verification");
        }
        entry.map(|e| e.hash.clone())
    }

    fn tiled_entry(&self, name: &str) -> RemoteResult<&CatalogEntry> {
        let remote = if is_remote(name) {
            name.to_string()
        } else {
            format!("{REMOTE_PREFIX}{name}")
        };
        let resolution = self.resolve(&remote, Placement::Default)?;
        let id = match resolution.target {
            Target::TiledDataset { id } => id,
            Target::Dataset { .. } => return Err(RemoteError::NotTiled(name.to_string())),
            _ => return Err(self.not_found(&remote)),
        };
        self.catalog()
            .and_then(|c| c.by_id(id))
            .ok_or_else(|| RemoteError::not_found(name))
    }

    /// Tiles of the tiled dataset `name` needed to cover `region`.
    pub fn tiles_for(&self, name: &str, region: &Region) -> RemoteResult<TileRequest> {
        let entry = self.tiled_entry(name)?;
        let catalog = self.catalog().ok_or_else(|| RemoteError::not_found(name))?;
        Ok(plan(catalog, entry, region, self))
    }

    /// Assemble the tiles of `name` over `region` with `blend`.
    pub fn grid_for_region<B: Blend>(&self, name: &str, region: &Region, blend: &B) -> Result<B::Grid, AssembleError> {
        let request = self.tiles_for(name, region)?;
        TileAssembler::new(self.layout.blend_dir()).assemble(&request, blend, self)
    }
}

impl TileSource for RemoteData {
    fn open_tile(&self, name: &str) -> Option<PathBuf> {
        match self.locate(name, Placement::Default) {
            Ok(path) => Some(path),
            Err(e) if e.is_soft() => {
                log::debug!("Tile {name} unavailable: {e}");
                None
            }
            Err(e) => {
                log::warn!("Skipping tile {name}: {e}");
                None
            }
        }
    }
}

impl CoverageSource for RemoteData {
    fn coverage(&self, entry: &CatalogEntry) -> Option<CoverageGrid> {
        let name = entry.coverage.as_deref()?;
        let path = match self.locate(&format!("{REMOTE_PREFIX}{name}"), Placement::Default) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Coverage grid {name} unavailable, assuming full coverage: {e}");
                return None;
            }
        };
        self.grid_reader
            .read_coverage(&path)
            .map_err(|e| log::warn!("Cannot read coverage grid {}: {}", path.display(), e))
            .ok()
    }
}
