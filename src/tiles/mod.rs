//! Tiled datasets.
//!
//! High-resolution datasets are published as a mosaic of fixed-size tiles
//! named by their southwest corner (`N29W081`). A request for a region is
//! served in two steps:
//!
//! 1. [`resolver`] selects the tiles covering the region, consulting the
//!    dataset's coverage grid and adding filler tiles where needed.
//! 2. [`assembler`] writes the selection to a blend list and hands it to a
//!    [`Blend`], which fetches each tile lazily as it reads it.

pub mod assembler;
pub mod coverage;
pub mod region;
pub mod resolver;

pub use assembler::{
    parse_blend_list, AssembleError, Blend, BlendError, BlendJob, BlendListEntry, Prefetch, PrefetchSummary,
    TileAssembler, TileSource,
};
pub use coverage::{Coverage, CoverageGrid, GridReader, TextGridReader};
pub use region::{wrap_longitude, Region, RegionError};
pub use resolver::{plan, resolve, tile_code, CoverageSource, NoCoverage, Strategy, TileRequest, TileSelection};
