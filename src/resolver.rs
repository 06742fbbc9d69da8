//! Mapping of user-supplied names to local and remote locations.
//!
//! Three kinds of names are recognized:
//!
//! * `@name`: a remote file. Checked in order against the catalog (with
//!   registration-suffix inference), the tile naming pattern
//!   `[NS]yy[EW]xxx.<tag>.<ext>`, and finally the server's cache directory.
//! * `http://`, `https://`, `ftp://` URLs: fetched into the cache directory.
//! * Anything else: a literal path, validated and returned unchanged.
//!
//! Resolution only inspects the filesystem; it never downloads.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{RemoteError, RemoteResult};
use crate::layout::{Layout, Placement, REMOTE_CACHE_DIR};
use crate::lock::FileLock;
use crate::manifest::{Catalog, CatalogEntry};

/// Prefix marking a remote name.
pub const REMOTE_PREFIX: char = '@';

/// Tile tag families that moved into another family's storage.
const TILE_ALIASES: &[(&str, &str)] = &[("srtm_relief_", "earth_relief_")];

static TILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([NS]\d{2}[EW]\d{3})\.(\w+)\.(\w+)$").expect("Valid regex"));

/// What a name resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A path on the local filesystem.
    Literal,
    /// A file fetched from an arbitrary URL.
    Url,
    /// A file in the server's cache directory.
    Cache,
    /// A single-file catalog dataset.
    Dataset { id: usize },
    /// A catalog dataset published as tiles; `local` is its tile directory.
    TiledDataset { id: usize },
    /// One tile of a tiled dataset.
    Tile { id: usize, tile: String },
}

/// A resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Canonical name after suffix inference and alias rewriting.
    pub name: String,
    pub target: Target,
    /// Where the file is, or would be once fetched.
    pub local: PathBuf,
    /// URL to fetch from; `None` when the local copy is present and complete.
    pub remote: Option<String>,
    /// Name under which the file is listed in the hash manifest.
    pub published_as: Option<String>,
}

impl Resolution {
    #[must_use]
    pub fn needs_fetch(&self) -> bool {
        self.remote.is_some()
    }

    /// Catalog id of the dataset this name belongs to.
    #[must_use]
    pub fn dataset_id(&self) -> Option<usize> {
        match self.target {
            Target::Dataset { id } | Target::TiledDataset { id } | Target::Tile { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Whether `name` is an `http(s)://` or `ftp://` URL.
#[must_use]
pub fn is_url(name: &str) -> bool {
    ["http://", "https://", "ftp://"]
        .iter()
        .any(|scheme| {
            name.len() > scheme.len()
                && name
                    .get(..scheme.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        })
}

/// Whether `name` is marked remote.
#[must_use]
pub fn is_remote(name: &str) -> bool {
    name.starts_with(REMOTE_PREFIX)
}

/// Split a tile name into `(tile, tag, ext)`, applying tag aliases.
#[must_use]
pub fn parse_tile_name(name: &str) -> Option<(String, String, String)> {
    let caps = TILE_PATTERN.captures(name.trim_start_matches(REMOTE_PREFIX))?;
    let tile = caps[1].to_string();
    let mut tag = caps[2].to_string();
    for (from, to) in TILE_ALIASES {
        if let Some(rest) = tag.strip_prefix(from) {
            tag = format!("{to}{rest}");
            break;
        }
    }
    Some((tile, tag, caps[3].to_string()))
}

/// Resolves names against a layout and, when available, the catalog.
#[derive(Debug, Clone, Copy)]
pub struct NameResolver<'a> {
    layout: &'a Layout,
    catalog: Option<&'a Catalog>,
}

impl<'a> NameResolver<'a> {
    pub fn new(layout: &'a Layout, catalog: Option<&'a Catalog>) -> Self {
        Self { layout, catalog }
    }

    /// Resolve `name` to its local path and, if a fetch is needed, its URL.
    pub fn resolve(&self, name: &str, placement: Placement) -> RemoteResult<Resolution> {
        if is_url(name) {
            return Ok(self.resolve_url(name, placement));
        }
        if let Some(rest) = name.strip_prefix(REMOTE_PREFIX) {
            if rest.is_empty() {
                return Err(RemoteError::not_found(name));
            }
            return Ok(self.resolve_remote(rest, placement));
        }
        resolve_literal(name)
    }

    fn resolve_remote(&self, name: &str, placement: Placement) -> Resolution {
        if let Some(catalog) = self.catalog {
            if let Some(entry) = catalog.resolve(name) {
                return self.dataset(entry, placement);
            }
            if let Some(res) = self.tile(catalog, name, placement) {
                return res;
            }
        }
        self.cache_file(name, placement)
    }

    fn dataset(&self, entry: &CatalogEntry, placement: Placement) -> Resolution {
        if entry.is_tiled() {
            let dir = Layout::join_remote_dir(self.layout.user_root(), &entry.remote_dir).join(entry.tag());
            return Resolution {
                name: entry.tag().to_string(),
                target: Target::TiledDataset { id: entry.id },
                local: dir,
                remote: None,
                published_as: None,
            };
        }
        let local = match placement {
            Placement::Default | Placement::User => {
                Layout::join_remote_dir(self.layout.user_root(), &entry.remote_dir).join(&entry.file)
            }
            other => self.layout.root_for(other, Placement::User).join(&entry.file),
        };
        let remote = self.layout.url_for(&entry.remote_path());
        Resolution {
            name: entry.file.clone(),
            target: Target::Dataset { id: entry.id },
            remote: self.remote_unless_present(&local, remote),
            local,
            published_as: Some(entry.file.clone()),
        }
    }

    fn tile(&self, catalog: &Catalog, name: &str, placement: Placement) -> Option<Resolution> {
        let (tile, tag, _) = parse_tile_name(name)?;
        let entry = catalog.tiled(&tag)?;
        let file = entry.tile_file_name(&tile);
        let local = match placement {
            Placement::Default | Placement::User => Layout::join_remote_dir(self.layout.user_root(), &entry.remote_dir)
                .join(entry.tag())
                .join(&file),
            other => self.layout.root_for(other, Placement::User).join(&file),
        };
        let remote = self.layout.url_for(&entry.remote_tile_path(&tile));
        Some(Resolution {
            name: file,
            target: Target::Tile {
                id: entry.id,
                tile: tile.clone(),
            },
            remote: self.remote_unless_present(&local, remote),
            local,
            published_as: Some(entry.remote_tile_file_name(&tile)),
        })
    }

    fn cache_file(&self, name: &str, placement: Placement) -> Resolution {
        let local = self.layout.root_for(placement, Placement::Cache).join(name);
        let remote = self.layout.url_for(&format!("{REMOTE_CACHE_DIR}/{name}"));
        Resolution {
            name: name.to_string(),
            target: Target::Cache,
            remote: self.remote_unless_present(&local, remote),
            local,
            published_as: Some(name.to_string()),
        }
    }

    fn resolve_url(&self, url: &str, placement: Placement) -> Resolution {
        let file = url_file_name(url);
        let local = self.layout.root_for(placement, Placement::Cache).join(file);
        Resolution {
            name: file.to_string(),
            target: Target::Url,
            remote: self.remote_unless_present(&local, url.to_string()),
            local,
            published_as: None,
        }
    }

    /// A local copy is trusted when it is readable and no download of it is
    /// in progress or was abandoned.
    fn remote_unless_present(&self, local: &Path, remote: String) -> Option<String> {
        let complete = File::open(local).is_ok() && !FileLock::in_progress(self.layout.lock_dir(), local);
        (!complete).then_some(remote)
    }
}

/// Last path segment of a URL, without query or fragment.
fn url_file_name(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = url[..end].trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}

fn resolve_literal(name: &str) -> RemoteResult<Resolution> {
    let path = PathBuf::from(name);
    if let Err(e) = File::open(&path) {
        return Err(match e.kind() {
            ErrorKind::NotFound => RemoteError::not_found(name),
            ErrorKind::PermissionDenied => RemoteError::BadPermission(path),
            _ => e.into(),
        });
    }
    Ok(Resolution {
        name: name.to_string(),
        target: Target::Literal,
        local: path,
        remote: None,
        published_as: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::catalog::tests::sample;
    use tempfile::tempdir;

    fn layout(root: &Path) -> Layout {
        Layout::new(root.join("user"), root.join("cache"), root.join("locks"), "https://example.org")
            .with_local_dir(root.join("cwd"))
    }

    #[test]
    fn test_name_classification() {
        assert!(is_url("https://example.org/x.nc"));
        assert!(is_url("FTP://example.org/x.nc"));
        assert!(!is_url("https://"));
        assert!(!is_url("地形图.nc"));
        assert!(!is_url("/tmp/ü.nc"));
        assert!(is_remote("@earth_relief_01d"));
        assert!(!is_remote("earth_relief_01d"));
    }

    #[test]
    fn test_parse_tile_name_with_alias() {
        assert_eq!(
            parse_tile_name("@N29W081.srtm_relief_01s_g.nc"),
            Some(("N29W081".into(), "earth_relief_01s_g".into(), "nc".into()))
        );
        assert_eq!(parse_tile_name("N2W081.earth_relief_01s_g.nc"), None);
    }

    #[test]
    fn test_dataset_paths() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        let catalog = sample();
        let resolver = NameResolver::new(&layout, Some(&catalog));

        let res = resolver.resolve("@earth_relief_01d", Placement::Default).unwrap();
        assert_eq!(res.name, "earth_relief_01d_p.grd");
        assert_eq!(
            res.local,
            dir.path().join("user/server/earth/earth_relief/earth_relief_01d_p.grd")
        );
        assert_eq!(
            res.remote.as_deref(),
            Some("https://example.org/server/earth/earth_relief/earth_relief_01d_p.grd")
        );

        let local = resolver.resolve("@earth_relief_01d_g.grd", Placement::Local).unwrap();
        assert_eq!(local.local, dir.path().join("cwd/earth_relief_01d_g.grd"));
    }

    #[test]
    fn test_present_file_needs_no_fetch_unless_marked() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        let catalog = sample();
        let resolver = NameResolver::new(&layout, Some(&catalog));

        let res = resolver.resolve("@earth_relief_01d_g", Placement::Default).unwrap();
        std::fs::create_dir_all(res.local.parent().unwrap()).unwrap();
        std::fs::write(&res.local, b"grid").unwrap();
        assert!(!resolver.resolve("@earth_relief_01d_g", Placement::Default).unwrap().needs_fetch());

        std::fs::create_dir_all(layout.lock_dir()).unwrap();
        std::fs::write(layout.lock_dir().join("earth_relief_01d_g.grd.download"), b"").unwrap();
        assert!(resolver.resolve("@earth_relief_01d_g", Placement::Default).unwrap().needs_fetch());
    }

    #[test]
    fn test_tile_paths() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        let catalog = sample();
        let res = NameResolver::new(&layout, Some(&catalog))
            .resolve("@N29W081.earth_relief_01s_g.nc", Placement::Default)
            .unwrap();
        assert_eq!(
            res.target,
            Target::Tile {
                id: catalog.get("earth_relief_01s_g").unwrap().id,
                tile: "N29W081".into()
            }
        );
        assert_eq!(
            res.local,
            dir.path()
                .join("user/server/earth/earth_relief/earth_relief_01s_g/N29W081.earth_relief_01s_g.nc")
        );
        assert_eq!(
            res.remote.as_deref(),
            Some("https://example.org/server/earth/earth_relief/earth_relief_01s_g/N29W081.earth_relief_01s_g.jp2")
        );
        assert_eq!(res.published_as.as_deref(), Some("N29W081.earth_relief_01s_g.jp2"));
    }

    #[test]
    fn test_tiled_dataset_and_cache_fallback() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        let catalog = sample();
        let resolver = NameResolver::new(&layout, Some(&catalog));

        let tiled = resolver.resolve("@earth_relief_15s", Placement::Default).unwrap();
        assert!(matches!(tiled.target, Target::TiledDataset { .. }));
        assert!(!tiled.needs_fetch());

        let cache = resolver.resolve("@hotspots.txt", Placement::Default).unwrap();
        assert_eq!(cache.target, Target::Cache);
        assert_eq!(cache.local, dir.path().join("cache/hotspots.txt"));
        assert_eq!(cache.remote.as_deref(), Some("https://example.org/cache/hotspots.txt"));
    }

    #[test]
    fn test_url_and_literal() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        let resolver = NameResolver::new(&layout, None);

        let url = resolver
            .resolve("https://example.org/data/coast.txt?v=2", Placement::Default)
            .unwrap();
        assert_eq!(url.local, dir.path().join("cache/coast.txt"));
        assert_eq!(url.target, Target::Url);

        let path = dir.path().join("mine.nc");
        std::fs::write(&path, b"x").unwrap();
        let lit = resolver.resolve(path.to_str().unwrap(), Placement::Default).unwrap();
        assert_eq!(lit.local, path);
        assert!(!lit.needs_fetch());

        let missing = resolver.resolve("/no/such/file.nc", Placement::Default).unwrap_err();
        assert!(matches!(missing, RemoteError::NotFound { .. }));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let dir = tempdir().unwrap();
        let layout = layout(dir.path());
        let catalog = sample();
        let resolver = NameResolver::new(&layout, Some(&catalog));
        for entry in catalog.entries() {
            let name = format!("@{}", entry.tag());
            let a = resolver.resolve(&name, Placement::Default).unwrap();
            let b = resolver.resolve(&name, Placement::Default).unwrap();
            assert_eq!(a, b);
        }
    }
}
