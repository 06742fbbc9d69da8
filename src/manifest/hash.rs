//! Hash manifest: remote file name -> content hash and byte size.

use super::format::{count_fields, split_fields, Manifest, ManifestParseError, Record};

/// One published file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashEntry {
    pub name: String,
    pub hash: String,
    pub size: u64,
}

impl HashEntry {
    pub fn new(name: impl Into<String>, hash: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            hash: hash.into(),
            size,
        }
    }

    /// Manifest line for this entry.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{}\t{}\t{}", self.name, self.hash, self.size)
    }
}

impl Record for HashEntry {
    fn parse_line(text: &str, line: usize) -> Result<Self, ManifestParseError> {
        let (fields, _) = split_fields(text, 3).ok_or(ManifestParseError::FieldCount {
            line,
            expected: 3,
            found: count_fields(text),
        })?;
        let size = fields[2].parse().map_err(|_| ManifestParseError::BadField {
            line,
            field: "size",
            value: fields[2].to_string(),
        })?;
        Ok(Self::new(fields[0], fields[1], size))
    }

    fn key(&self) -> &str {
        &self.name
    }
}

/// Parsed hash manifest.
pub type HashManifest = Manifest<HashEntry>;

/// Render entries in manifest format.
#[must_use]
pub fn render(entries: &[HashEntry]) -> String {
    let mut out = format!("{}\n", entries.len());
    for entry in entries {
        out.push_str(&entry.to_line());
        out.push('\n');
    }
    out
}
