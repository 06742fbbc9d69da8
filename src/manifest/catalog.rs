//! Catalog manifest: dataset name -> location, resolution and tiling.
//!
//! Each record is
//!
//! ```text
//! dir file inc reg scale offset size tile_size date coverage filler cpt remark...
//! ```
//!
//! where `file` ends in `/` for tiled datasets, `-` marks an absent
//! coverage/filler/cpt reference and the remark (free text, the attribution
//! shown to users) runs to the end of the line.

use std::fmt;

use chrono::NaiveDate;

use super::format::{count_fields, split_fields, Manifest, ManifestParseError, Record};

/// Extension of tiles as stored locally.
pub const TILE_LOCAL_EXT: &str = ".nc";

/// Extension of tiles as served remotely.
pub const TILE_REMOTE_EXT: &str = ".jp2";

const CATALOG_FIELDS: usize = 12;

/// Grid node registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Registration {
    /// Nodes on cell corners.
    Gridline,
    /// Nodes on cell centers.
    Pixel,
}

impl Registration {
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::Gridline => 'g',
            Self::Pixel => 'p',
        }
    }

    /// Name suffix used by datasets offering this registration.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Gridline => "_g",
            Self::Pixel => "_p",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "g" | "G" => Some(Self::Gridline),
            "p" | "P" => Some(Self::Pixel),
            _ => None,
        }
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Whether `stem` ends in an explicit registration suffix.
#[must_use]
pub fn has_registration_suffix(stem: &str) -> bool {
    stem.ends_with("_g") || stem.ends_with("_p")
}

/// Parse an increment label such as `01d`, `30m` or `15s` into degrees.
#[must_use]
pub fn parse_increment(label: &str) -> Option<f64> {
    let unit = label.chars().last()?;
    let value: f64 = label[..label.len() - unit.len_utf8()].parse().ok()?;
    let degrees = match unit {
        'd' => value,
        'm' => value / 60.0,
        's' => value / 3600.0,
        _ => return None,
    };
    (degrees > 0.0).then_some(degrees)
}

/// One dataset published by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// Position in the sorted catalog.
    pub id: usize,
    /// Server-relative directory, e.g. `/server/earth/earth_relief/`.
    pub remote_dir: String,
    /// File name, or `<tag>/` for a tiled dataset.
    pub file: String,
    /// Local file extension including the dot.
    pub ext: String,
    /// Increment label (`01m`).
    pub inc: String,
    /// Increment in degrees.
    pub d_inc: f64,
    pub registration: Registration,
    pub scale: f64,
    pub offset: f64,
    /// Human-readable download size (`41G`).
    pub size_label: String,
    /// Tile size in degrees; 0 when the dataset is a single file.
    pub tile_size: f64,
    pub release_date: NaiveDate,
    /// Coverage grid name, without the leading `@`.
    pub coverage: Option<String>,
    /// Filler dataset name, without the leading `@`.
    pub filler: Option<String>,
    pub cpt: Option<String>,
    /// Attribution remark.
    pub attribution: String,
    tag: String,
}

impl CatalogEntry {
    /// Name without extension or trailing slash (`earth_relief_01m_p`).
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn is_tiled(&self) -> bool {
        self.tile_size > 0.0
    }

    /// Whether empty cells carry meaning (land/ocean) and get a background value.
    #[must_use]
    pub fn distinguishes_land_ocean(&self) -> bool {
        self.coverage.is_some()
    }

    /// Server-relative path of the dataset file (or tile directory).
    #[must_use]
    pub fn remote_path(&self) -> String {
        format!("{}{}", self.remote_dir, self.file)
    }

    /// Server-relative path of a tile of this dataset.
    #[must_use]
    pub fn remote_tile_path(&self, tile: &str) -> String {
        format!(
            "{}{}/{}.{}{}",
            self.remote_dir, self.tag, tile, self.tag, TILE_REMOTE_EXT
        )
    }

    /// Local file name of a tile (`N29W081.earth_relief_01s_g.nc`).
    #[must_use]
    pub fn tile_file_name(&self, tile: &str) -> String {
        format!("{}.{}{}", tile, self.tag, TILE_LOCAL_EXT)
    }

    /// Remote file name of a tile, as listed in the hash manifest.
    #[must_use]
    pub fn remote_tile_file_name(&self, tile: &str) -> String {
        format!("{}.{}{}", tile, self.tag, TILE_REMOTE_EXT)
    }
}

fn opt_ref(field: &str) -> Option<String> {
    match field {
        "-" | "" => None,
        other => Some(other.trim_start_matches('@').to_string()),
    }
}

impl Record for CatalogEntry {
    fn parse_line(text: &str, line: usize) -> Result<Self, ManifestParseError> {
        let (f, remark) =
            split_fields(text, CATALOG_FIELDS).ok_or(ManifestParseError::FieldCount {
                line,
                expected: CATALOG_FIELDS,
                found: count_fields(text),
            })?;
        let bad = |field: &'static str, value: &str| ManifestParseError::BadField {
            line,
            field,
            value: value.to_string(),
        };
        let number = |field: &'static str, value: &str| -> Result<f64, ManifestParseError> {
            value.parse().map_err(|_| bad(field, value))
        };

        let file = f[1].to_string();
        let tiled = file.ends_with('/');
        let (tag, ext) = if tiled {
            (file.trim_end_matches('/').to_string(), TILE_LOCAL_EXT.to_string())
        } else {
            match file.rfind('.') {
                Some(dot) => (file[..dot].to_string(), file[dot..].to_string()),
                None => (file.clone(), String::new()),
            }
        };
        let tile_size = number("tile size", f[7])?;
        if tiled != (tile_size > 0.0) {
            return Err(bad("tile size", f[7]));
        }

        Ok(Self {
            id: 0,
            remote_dir: f[0].to_string(),
            file,
            ext,
            inc: f[2].to_string(),
            d_inc: parse_increment(f[2]).ok_or_else(|| bad("increment", f[2]))?,
            registration: Registration::from_code(f[3]).ok_or_else(|| bad("registration", f[3]))?,
            scale: number("scale", f[4])?,
            offset: number("offset", f[5])?,
            size_label: f[6].to_string(),
            tile_size,
            release_date: NaiveDate::parse_from_str(f[8], "%Y-%m-%d")
                .map_err(|_| bad("date", f[8]))?,
            coverage: opt_ref(f[9]),
            filler: opt_ref(f[10]),
            cpt: opt_ref(f[11]),
            attribution: remark.to_string(),
            tag,
        })
    }

    fn key(&self) -> &str {
        &self.tag
    }

    fn assign_id(&mut self, id: usize) {
        self.id = id;
    }
}

/// Parsed catalog manifest.
pub type Catalog = Manifest<CatalogEntry>;

impl Catalog {
    /// Look up a dataset by name.
    ///
    /// The name may carry the dataset's extension. Matching is exact on the
    /// full tag, so `earth_relief_01m` never matches `earth_relief_01m_p`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&CatalogEntry> {
        let name = name.trim_start_matches('@').trim_end_matches('/');
        if let Some(entry) = self.get(name) {
            return Some(entry);
        }
        let dot = name.rfind('.')?;
        self.get(&name[..dot])
            .filter(|entry| entry.ext == name[dot..] || entry.is_tiled())
    }

    /// Look up a dataset, inferring a missing registration suffix.
    ///
    /// Pixel registration is probed before gridline.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&CatalogEntry> {
        if let Some(entry) = self.find(name) {
            return Some(entry);
        }
        let stem = name.trim_start_matches('@');
        let stem = match stem.rfind('.') {
            Some(dot) => &stem[..dot],
            None => stem,
        };
        if has_registration_suffix(stem) {
            return None;
        }
        [Registration::Pixel, Registration::Gridline]
            .iter()
            .find_map(|reg| self.find(&format!("{stem}{}", reg.suffix())))
    }

    /// Tiled dataset whose tiles carry `tag`.
    #[must_use]
    pub fn tiled(&self, tag: &str) -> Option<&CatalogEntry> {
        self.get(tag).filter(|entry| entry.is_tiled())
    }

    /// Closest dataset tag to `name`, if reasonably similar.
    #[must_use]
    pub fn suggest(&self, name: &str) -> Option<&str> {
        let name = name.trim_start_matches('@');
        self.entries()
            .iter()
            .map(|entry| (strsim::jaro_winkler(name, entry.tag()), entry.tag()))
            .filter(|(score, _)| *score >= 0.85)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, tag)| tag)
    }
}
