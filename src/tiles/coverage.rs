//! Coverage grids: which tile cells of a dataset hold real data.
//!
//! A coverage grid has one cell per tile. Cell values are
//!
//! | value | meaning                              |
//! |-------|--------------------------------------|
//! | 0     | no tile exists                       |
//! | 1     | tile exists but only partly covered  |
//! | 2     | tile fully covered                   |
//!
//! Grids are read through [`GridReader`]. [`TextGridReader`] reads the plain
//! text form:
//!
//! ```text
//! <west> <south> <inc> <ncols> <nrows>
//! 0012...        <- northernmost row first, one digit per cell
//! ...
//! ```

use std::fs;
use std::io;
use std::path::Path;

use super::region::SNAP_EPS;

/// Coverage of one tile cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    None,
    Partial,
    Full,
}

impl Coverage {
    #[must_use]
    pub fn from_value(value: u8) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Partial,
            _ => Self::Full,
        }
    }
}

/// Tile-resolution coverage raster, pixel registered.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageGrid {
    west: f64,
    south: f64,
    inc: f64,
    ncols: usize,
    nrows: usize,
    /// Row-major, southernmost row first.
    values: Vec<u8>,
}

impl CoverageGrid {
    /// Build a grid from row-major values, southernmost row first.
    pub fn new(west: f64, south: f64, inc: f64, ncols: usize, nrows: usize, values: Vec<u8>) -> io::Result<Self> {
        if inc <= 0.0 || values.len() != ncols * nrows {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("coverage grid needs {ncols}x{nrows} values and a positive increment"),
            ));
        }
        Ok(Self {
            west,
            south,
            inc,
            ncols,
            nrows,
            values,
        })
    }

    #[must_use]
    pub fn increment(&self) -> f64 {
        self.inc
    }

    /// Coverage of the cell whose southwest corner is (`lon`, `lat`).
    ///
    /// Nearest cell, no interpolation. Longitudes wrap if the grid spans
    /// the globe; points outside the grid have no coverage.
    #[must_use]
    pub fn sample(&self, lon: f64, lat: f64) -> Coverage {
        let width = self.inc * self.ncols as f64;
        let mut dx = lon - self.west;
        if width >= 360.0 - SNAP_EPS {
            dx = dx.rem_euclid(360.0);
        }
        let col = (dx / self.inc + SNAP_EPS).floor();
        let row = ((lat - self.south) / self.inc + SNAP_EPS).floor();
        if col < 0.0 || row < 0.0 || col >= self.ncols as f64 || row >= self.nrows as f64 {
            return Coverage::None;
        }
        Coverage::from_value(self.values[row as usize * self.ncols + col as usize])
    }
}

/// Reads coverage grids from local files.
pub trait GridReader: Send + Sync {
    fn read_coverage(&self, path: &Path) -> io::Result<CoverageGrid>;
}

/// Reader for the text coverage format.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextGridReader;

impl TextGridReader {
    pub fn parse(text: &str) -> io::Result<CoverageGrid> {
        let bad = |msg: &str| io::Error::new(io::ErrorKind::InvalidData, msg.to_string());
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#'));

        let header: Vec<&str> = lines
            .next()
            .ok_or_else(|| bad("empty coverage grid"))?
            .split_whitespace()
            .collect();
        let [west, south, inc, ncols, nrows] = header[..] else {
            return Err(bad("coverage header needs west south inc ncols nrows"));
        };
        let num = |v: &str| v.parse::<f64>().map_err(|_| bad("bad number in coverage header"));
        let count = |v: &str| v.parse::<usize>().map_err(|_| bad("bad size in coverage header"));
        let (ncols, nrows) = (count(ncols)?, count(nrows)?);

        let mut rows: Vec<Vec<u8>> = Vec::with_capacity(nrows);
        for line in lines {
            let row = line
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| c.to_digit(10).map(|d| d as u8))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| bad("coverage cells must be digits"))?;
            if row.len() != ncols {
                return Err(bad("coverage row has the wrong number of cells"));
            }
            rows.push(row);
        }
        if rows.len() != nrows {
            return Err(bad("coverage grid has the wrong number of rows"));
        }
        rows.reverse();
        CoverageGrid::new(num(west)?, num(south)?, num(inc)?, ncols, nrows, rows.concat())
    }
}

impl GridReader for TextGridReader {
    fn read_coverage(&self, path: &Path) -> io::Result<CoverageGrid> {
        Self::parse(&fs::read_to_string(path)?)
    }
}
