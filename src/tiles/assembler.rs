//! Assembly of selected tiles into one grid.
//!
//! The tile names are written to a blend list, one entry per line in the
//! `file [region] [weight]` format of the blend operation, and the external
//! [`Blend`] is invoked on it. Tiles are fetched lazily: the blend opens each
//! name through a [`TileSource`], which downloads it on first use.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::region::Region;
use super::resolver::TileRequest;
use crate::layout::ensure_dir;
use crate::manifest::Registration;

/// Opens tiles by name, fetching them if needed.
pub trait TileSource {
    /// Local path of `name`, or `None` if the tile cannot be obtained.
    ///
    /// Missing tiles are not errors: the blend treats them as empty.
    fn open_tile(&self, name: &str) -> Option<PathBuf>;
}

/// Arguments for one blend invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendJob {
    pub list_file: PathBuf,
    pub region: Region,
    pub increment: f64,
    pub registration: Registration,
    /// Value for cells no tile contributes to; `None` leaves them undefined.
    pub background: Option<f64>,
}

/// Boxed error from a blend implementation.
pub type BlendError = Box<dyn std::error::Error + Send + Sync>;

/// The external mosaic operation.
pub trait Blend {
    type Grid;

    fn blend(&self, job: &BlendJob, tiles: &dyn TileSource) -> Result<Self::Grid, BlendError>;
}

/// Failure assembling a grid.
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error(transparent)]
    Remote(#[from] crate::error::RemoteError),

    #[error("failed to write blend list: {0}")]
    List(#[from] io::Error),

    #[error("blend failed: {0}")]
    Blend(BlendError),
}

/// One line of a blend list.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendListEntry {
    pub file: String,
    pub region: Option<String>,
    pub weight: Option<f64>,
}

/// Parse a blend list. Blank lines and `#` comments are skipped.
#[must_use]
pub fn parse_blend_list(text: &str) -> Vec<BlendListEntry> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let file = fields.next()?.to_string();
            let mut region = None;
            let mut weight = None;
            for field in fields {
                if let Some(r) = field.strip_prefix("-R") {
                    region = Some(r.to_string());
                } else if let Ok(w) = field.parse() {
                    weight = Some(w);
                }
            }
            Some(BlendListEntry { file, region, weight })
        })
        .collect()
}

/// Writes blend lists and runs the blend.
#[derive(Debug, Clone)]
pub struct TileAssembler {
    list_dir: PathBuf,
}

impl TileAssembler {
    pub fn new(list_dir: impl Into<PathBuf>) -> Self {
        Self {
            list_dir: list_dir.into(),
        }
    }

    /// Deterministic list file name for a request.
    #[must_use]
    pub fn list_path(&self, request: &TileRequest) -> PathBuf {
        self.list_dir.join(format!(
            "tiled_{}_{}_{}.lis",
            request.dataset_id,
            request.registration.code(),
            request.region.code()
        ))
    }

    /// Write the blend list for `request`, reusing an identical existing one.
    pub fn write_list(&self, request: &TileRequest) -> io::Result<PathBuf> {
        let path = self.list_path(request);
        let mut contents = String::new();
        for tile in &request.tiles {
            contents.push_str(tile);
            contents.push('\n');
        }
        if fs::read_to_string(&path).is_ok_and(|existing| existing == contents) {
            log::debug!("Reusing blend list {}", path.display());
            return Ok(path);
        }
        ensure_dir(&self.list_dir)?;
        write_atomic(&path, contents.as_bytes())?;
        log::debug!("Wrote {} tile name(s) to {}", request.tiles.len(), path.display());
        Ok(path)
    }

    /// Produce one grid covering the request's region.
    pub fn assemble<B: Blend>(
        &self,
        request: &TileRequest,
        blend: &B,
        tiles: &dyn TileSource,
    ) -> Result<B::Grid, AssembleError> {
        let job = BlendJob {
            list_file: self.write_list(request)?,
            region: request.region,
            increment: request.increment,
            registration: request.registration,
            background: request.background,
        };
        blend.blend(&job, tiles).map_err(AssembleError::Blend)
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(format!(".{}.tmp", std::process::id()));
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

/// Result of [`Prefetch`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PrefetchSummary {
    pub available: Vec<PathBuf>,
    pub missing: Vec<String>,
}

/// A blend that only opens every listed tile, so all of them end up cached.
#[derive(Debug, Default, Clone, Copy)]
pub struct Prefetch;

impl Blend for Prefetch {
    type Grid = PrefetchSummary;

    fn blend(&self, job: &BlendJob, tiles: &dyn TileSource) -> Result<Self::Grid, BlendError> {
        let list = fs::read_to_string(&job.list_file)?;
        let mut summary = PrefetchSummary::default();
        for entry in parse_blend_list(&list) {
            match tiles.open_tile(&entry.file) {
                Some(path) => summary.available.push(path),
                None => summary.missing.push(entry.file),
            }
        }
        Ok(summary)
    }
}
