//! Selection of the tiles covering a region.
//!
//! The region is snapped outward to the dataset's tile size and walked cell
//! by cell. Each cell's longitude is wrapped into [-180, 180), so a region
//! across the antimeridian needs no special handling. With a coverage grid,
//! empty cells are skipped and partial cells flag that a filler is needed.
//! A configured filler dataset then gets its own pass.

use std::collections::HashSet;

use super::coverage::{Coverage, CoverageGrid};
use super::region::{wrap_longitude, Region, SNAP_EPS};
use crate::manifest::{Catalog, CatalogEntry, Registration};
use crate::resolver::REMOTE_PREFIX;

/// How cells are checked for existence.
#[derive(Debug, Clone, Copy)]
pub enum Strategy<'g> {
    /// Every cell is assumed to have a tile.
    Uncovered,
    /// Cells are looked up in a coverage grid.
    Coverage(&'g CoverageGrid),
}

/// Provides coverage grids for datasets that reference one.
pub trait CoverageSource {
    /// The coverage grid for `entry`, or `None` if it has none or it cannot
    /// be obtained.
    fn coverage(&self, entry: &CatalogEntry) -> Option<CoverageGrid>;
}

/// Treats every dataset as fully covered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCoverage;

impl CoverageSource for NoCoverage {
    fn coverage(&self, _entry: &CatalogEntry) -> Option<CoverageGrid> {
        None
    }
}

impl CoverageSource for std::collections::HashMap<String, CoverageGrid> {
    fn coverage(&self, entry: &CatalogEntry) -> Option<CoverageGrid> {
        entry.coverage.as_ref().and_then(|name| self.get(name)).cloned()
    }
}

/// Tiles of one dataset covering a region.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSelection {
    /// Remote-marked tile names in row-major order from the southwest.
    pub tiles: Vec<String>,
    /// Whether any cell was missing or only partly covered.
    pub need_filler: bool,
    /// The region snapped to the tile grid.
    pub region: Region,
    /// Cells skipped because no tile exists.
    pub missing: usize,
}

/// Everything needed to assemble a grid for a tiled dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    /// Id of the primary dataset.
    pub dataset_id: usize,
    /// Output region: the request snapped to the output increment.
    pub region: Region,
    /// Output increment in degrees.
    pub increment: f64,
    pub registration: Registration,
    /// Primary tiles followed by filler tiles or the filler file.
    pub tiles: Vec<String>,
    pub need_filler: bool,
    /// Fill cells without data with this value instead of leaving them empty.
    pub background: Option<f64>,
}

/// Letter-coded southwest corner, e.g. `N29W081`.
#[must_use]
pub fn tile_code(lon: f64, lat: f64) -> String {
    let lat = lat.round() as i64;
    let lon = lon.round() as i64;
    format!(
        "{}{:02}{}{:03}",
        if lat < 0 { 'S' } else { 'N' },
        lat.abs(),
        if lon < 0 { 'W' } else { 'E' },
        lon.abs()
    )
}

/// Tiles of `entry` covering `region`.
#[must_use]
pub fn resolve(region: &Region, entry: &CatalogEntry, strategy: Strategy<'_>) -> TileSelection {
    let step = entry.tile_size;
    let snapped = region.snap_outward(step);
    let mut selection = TileSelection {
        tiles: Vec::new(),
        need_filler: false,
        region: snapped,
        missing: 0,
    };
    if step <= 0.0 {
        return selection;
    }

    let ncols = (((snapped.east - snapped.west) / step) - SNAP_EPS).ceil().max(0.0) as usize;
    let nrows = (((snapped.north - snapped.south) / step) - SNAP_EPS).ceil().max(0.0) as usize;
    let mut seen = HashSet::new();

    for row in 0..nrows {
        let lat = snapped.south + row as f64 * step;
        for col in 0..ncols {
            let lon = wrap_longitude(snapped.west + col as f64 * step);
            if let Strategy::Coverage(grid) = strategy {
                match grid.sample(lon, lat) {
                    Coverage::None => {
                        selection.missing += 1;
                        selection.need_filler = true;
                        continue;
                    }
                    Coverage::Partial => selection.need_filler = true,
                    Coverage::Full => {}
                }
            }
            let code = tile_code(lon, lat);
            if seen.insert(code.clone()) {
                selection
                    .tiles
                    .push(format!("{REMOTE_PREFIX}{}", entry.tile_file_name(&code)));
            }
        }
    }
    log::debug!(
        "{}: {} tile(s) over {}, {} missing",
        entry.tag(),
        selection.tiles.len(),
        snapped,
        selection.missing
    );
    selection
}

fn strategy_for<'g>(grid: Option<&'g CoverageGrid>) -> Strategy<'g> {
    grid.map_or(Strategy::Uncovered, Strategy::Coverage)
}

/// Plan the assembly of `entry` over `region`, including filler tiles.
#[must_use]
pub fn plan(catalog: &Catalog, entry: &CatalogEntry, region: &Region, coverage: &dyn CoverageSource) -> TileRequest {
    let grid = coverage.coverage(entry);
    let primary = resolve(region, entry, strategy_for(grid.as_ref()));

    let mut request = TileRequest {
        dataset_id: entry.id,
        region: region.snap_outward(entry.d_inc),
        increment: entry.d_inc,
        registration: entry.registration,
        tiles: primary.tiles,
        need_filler: primary.need_filler,
        background: entry.distinguishes_land_ocean().then_some(0.0),
    };

    if !request.need_filler {
        return request;
    }
    let Some(filler) = entry.filler.as_deref().and_then(|name| catalog.resolve(name)) else {
        return request;
    };

    if filler.is_tiled() {
        let grid = coverage.coverage(filler);
        let extra = resolve(region, filler, strategy_for(grid.as_ref()));
        log::debug!("Adding {} filler tile(s) from {}", extra.tiles.len(), filler.tag());
        request.tiles.extend(extra.tiles);
    } else {
        request.tiles.push(format!("{REMOTE_PREFIX}{}", filler.file));
    }
    if filler.d_inc > entry.d_inc + SNAP_EPS {
        request.region = request.region.snap_outward(filler.d_inc);
    }
    request
}
