//! Line-oriented manifest format shared by both manifest kinds.
//!
//! ```text
//! 3                                  <- record count
//! # 1.2.0 or newer is required       <- optional minimum version
//! <field> <field> ...                <- records; other `#` lines are comments
//! ```
//!
//! Each record type parses its own fields; a record count that disagrees
//! with the number of parsed records means the file is truncated or
//! otherwise corrupt.

use std::fmt;
use std::str::FromStr;

/// Structured parse failure for a manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestParseError {
    #[error("manifest is empty")]
    Empty,

    #[error("line 1: expected a record count, found {0:?}")]
    BadCount(String),

    #[error("line {line}: expected at least {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid {field} {value:?}")]
    BadField {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("header promises {expected} records but {found} were found")]
    CountMismatch { expected: usize, found: usize },
}

impl ManifestParseError {
    /// Whether the failure means the file itself is damaged.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Empty | Self::BadCount(_) | Self::CountMismatch { .. }
        )
    }
}

/// `major.minor.release` version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub release: u32,
}

impl Version {
    #[must_use]
    pub const fn new(major: u32, minor: u32, release: u32) -> Self {
        Self {
            major,
            minor,
            release,
        }
    }

    /// Version of this crate, used as the local engine version.
    #[must_use]
    pub fn current() -> Self {
        env!("CARGO_PKG_VERSION")
            .parse()
            .unwrap_or(Self::new(0, 0, 0))
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(3, '.');
        let mut next = |what: &str| -> Result<u32, String> {
            let part = parts.next().ok_or_else(|| format!("missing {what} in {s:?}"))?;
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits
                .parse()
                .map_err(|_| format!("invalid {what} in {s:?}"))
        };
        Ok(Self {
            major: next("major")?,
            minor: next("minor")?,
            release: next("release")?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.release)
    }
}

/// A record type stored in a manifest.
pub trait Record: Sized {
    /// Parse one data line. `line` is the 1-based line number.
    fn parse_line(text: &str, line: usize) -> Result<Self, ManifestParseError>;

    /// Sort/lookup key.
    fn key(&self) -> &str;

    /// Called after sorting with the record's position.
    fn assign_id(&mut self, _id: usize) {}
}

/// Parsed manifest: records sorted by key with contiguous ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest<R> {
    min_version: Option<Version>,
    entries: Vec<R>,
}

impl<R: Record> Manifest<R> {
    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self, ManifestParseError> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let (_, count_line) = lines.next().ok_or(ManifestParseError::Empty)?;
        let expected: usize = count_line
            .trim()
            .parse()
            .map_err(|_| ManifestParseError::BadCount(count_line.trim().to_string()))?;

        let mut min_version = None;
        let mut entries = Vec::with_capacity(expected.min(4096));
        let mut header = true;
        for (idx, text) in lines {
            let trimmed = text.trim();
            if let Some(comment) = trimmed.strip_prefix('#') {
                if header && min_version.is_none() {
                    min_version = comment
                        .split_whitespace()
                        .next()
                        .and_then(|v| v.parse().ok());
                }
                continue;
            }
            header = false;
            entries.push(R::parse_line(trimmed, idx + 1)?);
        }

        if entries.len() != expected {
            return Err(ManifestParseError::CountMismatch {
                expected,
                found: entries.len(),
            });
        }
        Ok(Self::from_entries(min_version, entries))
    }

    /// Build a manifest from records, sorting and numbering them.
    #[must_use]
    pub fn from_entries(min_version: Option<Version>, mut entries: Vec<R>) -> Self {
        entries.sort_by(|a, b| a.key().cmp(b.key()));
        for (id, entry) in entries.iter_mut().enumerate() {
            entry.assign_id(id);
        }
        Self {
            min_version,
            entries,
        }
    }

    /// Minimum engine version required by the server, if stated.
    #[must_use]
    pub fn min_version(&self) -> Option<Version> {
        self.min_version
    }

    #[must_use]
    pub fn entries(&self) -> &[R] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binary search by exact key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&R> {
        self.entries
            .binary_search_by(|e| e.key().cmp(key))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Record at position `id`.
    #[must_use]
    pub fn by_id(&self, id: usize) -> Option<&R> {
        self.entries.get(id)
    }
}

/// Split `text` into `n` whitespace-separated fields plus the untouched remainder.
///
/// Returns `None` if fewer than `n` fields are present.
pub(crate) fn split_fields(text: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut fields = Vec::with_capacity(n);
    let mut rest = text;
    while fields.len() < n {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        fields.push(&rest[..end]);
        rest = &rest[end..];
    }
    Some((fields, rest.trim()))
}

/// Number of whitespace-separated fields in `text`.
pub(crate) fn count_fields(text: &str) -> usize {
    text.split_whitespace().count()
}
