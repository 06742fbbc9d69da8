//! Geographic bounding boxes.

use std::fmt;
use std::str::FromStr;

/// Tolerance for treating a coordinate as lying on a grid line.
pub const SNAP_EPS: f64 = 1e-8;

/// Errors from building or parsing a region.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegionError {
    #[error("expected west/east/south/north, got {0:?}")]
    Syntax(String),

    #[error("west ({west}) must be less than east ({east})")]
    EmptyLongitude { west: f64, east: f64 },

    #[error("south ({south}) must be less than north ({north}) and both within [-90, 90]")]
    BadLatitude { south: f64, north: f64 },
}

/// A west/east/south/north box in degrees.
///
/// Longitudes may lie outside [-180, 180); a box may straddle the
/// antimeridian (`170/190/...`). Latitudes are within [-90, 90].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl Region {
    pub const GLOBAL: Region = Region {
        west: -180.0,
        east: 180.0,
        south: -90.0,
        north: 90.0,
    };

    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Result<Self, RegionError> {
        if !(west < east) {
            return Err(RegionError::EmptyLongitude { west, east });
        }
        if !(south < north) || south < -90.0 || north > 90.0 {
            return Err(RegionError::BadLatitude { south, north });
        }
        // Wider than the globe is the globe.
        let (west, east) = if east - west > 360.0 { (west, west + 360.0) } else { (west, east) };
        Ok(Self {
            west,
            east,
            south,
            north,
        })
    }

    /// Whether the box covers all longitudes.
    #[must_use]
    pub fn spans_all_longitudes(&self) -> bool {
        self.east - self.west >= 360.0 - SNAP_EPS
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.spans_all_longitudes() && self.south <= -90.0 + SNAP_EPS && self.north >= 90.0 - SNAP_EPS
    }

    /// Expand outward to the next multiple of `step` on every side.
    ///
    /// Values already on a multiple (within [`SNAP_EPS`] steps) are kept, so
    /// snapping never shrinks the box and is idempotent.
    #[must_use]
    pub fn snap_outward(&self, step: f64) -> Self {
        if step <= 0.0 {
            return *self;
        }
        let down = |v: f64| (v / step + SNAP_EPS).floor() * step;
        let up = |v: f64| (v / step - SNAP_EPS).ceil() * step;
        let mut west = down(self.west);
        let mut east = up(self.east);
        if east - west > 360.0 {
            east = west + 360.0;
        }
        if west == east {
            east = west + step;
        }
        Self {
            west,
            east,
            south: down(self.south).max(-90.0),
            north: up(self.north).min(90.0),
        }
    }

    /// Stable short code for file names, e.g. `W081W080N029N030`.
    #[must_use]
    pub fn code(&self) -> String {
        fn part(v: f64, pos: char, neg: char) -> String {
            let letter = if v < 0.0 { neg } else { pos };
            let v = v.abs();
            if (v - v.round()).abs() < SNAP_EPS {
                format!("{letter}{:03}", v.round() as i64)
            } else {
                format!("{letter}{}", format!("{v:.6}").trim_end_matches('0').replace('.', "p"))
            }
        }
        format!(
            "{}{}{}{}",
            part(self.west, 'E', 'W'),
            part(self.east, 'E', 'W'),
            part(self.south, 'N', 'S'),
            part(self.north, 'N', 'S')
        )
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.west, self.east, self.south, self.north)
    }
}

impl FromStr for Region {
    type Err = RegionError;

    /// Parse `west/east/south/north`, or `g`/`d` for the whole globe.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "g" || s == "d" {
            return Ok(Self::GLOBAL);
        }
        let parts: Vec<f64> = s
            .split('/')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| RegionError::Syntax(s.to_string()))?;
        match parts[..] {
            [w, e, so, n] => Self::new(w, e, so, n),
            _ => Err(RegionError::Syntax(s.to_string())),
        }
    }
}

/// Wrap a longitude into [-180, 180).
#[must_use]
pub fn wrap_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 - SNAP_EPS {
        -180.0
    } else {
        wrapped
    }
}
