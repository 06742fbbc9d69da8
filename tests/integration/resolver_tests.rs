use geofetch::lock::FileLock;
use geofetch::manifest::Catalog;
use geofetch::resolver::{NameResolver, Target};
use geofetch::{Placement, RemoteError};
use tempfile::tempdir;

use super::common::{layout, CATALOG};

#[test]
fn test_every_name_kind() {
    let dir = tempdir().unwrap();
    let layout = layout(dir.path()).with_local_dir(dir.path().join("here"));
    let catalog = Catalog::parse(CATALOG).unwrap();
    let resolver = NameResolver::new(&layout, Some(&catalog));
    let relief = layout.server_dir().join("earth").join("earth_relief");

    let dataset = resolver.resolve("@earth_relief_01d", Placement::Default).unwrap();
    assert!(matches!(dataset.target, Target::Dataset { .. }));
    assert_eq!(dataset.local, relief.join("earth_relief_01d_g.grd"));
    assert_eq!(
        dataset.remote.as_deref(),
        Some("https://data.example.org/server/earth/earth_relief/earth_relief_01d_g.grd")
    );

    let tiled = resolver.resolve("@earth_relief_01s", Placement::Default).unwrap();
    assert!(matches!(tiled.target, Target::TiledDataset { .. }));
    assert_eq!(tiled.local, relief.join("earth_relief_01s_g"));
    assert!(!tiled.needs_fetch());

    let tile = resolver
        .resolve("@N29W081.earth_relief_01s_g.nc", Placement::Default)
        .unwrap();
    assert_eq!(
        tile.target,
        Target::Tile {
            id: tiled.dataset_id().unwrap(),
            tile: "N29W081".into()
        }
    );
    assert_eq!(
        tile.local,
        relief.join("earth_relief_01s_g").join("N29W081.earth_relief_01s_g.nc")
    );
    assert_eq!(
        tile.remote.as_deref(),
        Some("https://data.example.org/server/earth/earth_relief/earth_relief_01s_g/N29W081.earth_relief_01s_g.jp2")
    );
    assert_eq!(tile.published_as.as_deref(), Some("N29W081.earth_relief_01s_g.jp2"));

    let cached = resolver.resolve("@topo.cpt", Placement::Default).unwrap();
    assert_eq!(cached.target, Target::Cache);
    assert_eq!(cached.local, layout.cache_root().join("topo.cpt"));
    assert_eq!(cached.remote.as_deref(), Some("https://data.example.org/cache/topo.cpt"));

    let url = resolver
        .resolve("https://other.example.com/grids/ridge.nc?v=2", Placement::Local)
        .unwrap();
    assert_eq!(url.target, Target::Url);
    assert_eq!(url.local, dir.path().join("here").join("ridge.nc"));
}

#[test]
fn test_srtm_tiles_live_with_earth_relief() {
    let dir = tempdir().unwrap();
    let layout = layout(dir.path());
    let catalog = Catalog::parse(CATALOG).unwrap();
    let resolver = NameResolver::new(&layout, Some(&catalog));

    let srtm = resolver
        .resolve("@N29W081.srtm_relief_01s_g.nc", Placement::Default)
        .unwrap();
    let earth = resolver
        .resolve("@N29W081.earth_relief_01s_g.nc", Placement::Default)
        .unwrap();
    assert_eq!(srtm, earth);
}

#[test]
fn test_resolution_is_deterministic() {
    let dir = tempdir().unwrap();
    let layout = layout(dir.path());
    let catalog = Catalog::parse(CATALOG).unwrap();
    let resolver = NameResolver::new(&layout, Some(&catalog));
    for name in [
        "@earth_relief_01d_g.grd",
        "@earth_relief_15s",
        "@S01E000.earth_relief_15s_p.nc",
        "@missing.nc",
        "ftp://ftp.example.net/pub/a.grd",
    ] {
        let first = resolver.resolve(name, Placement::Default).unwrap();
        for _ in 0..3 {
            assert_eq!(resolver.resolve(name, Placement::Default).unwrap(), first);
        }
    }
}

#[test]
fn test_present_copy_needs_no_fetch_unless_in_progress() {
    let dir = tempdir().unwrap();
    let layout = layout(dir.path());
    let resolver = NameResolver::new(&layout, None);
    let local = layout.cache_root().join("topo.cpt");
    std::fs::create_dir_all(layout.cache_root()).unwrap();
    std::fs::write(&local, "palette").unwrap();

    assert!(!resolver.resolve("@topo.cpt", Placement::Default).unwrap().needs_fetch());

    let lock = FileLock::acquire(layout.lock_dir(), &local, None).unwrap();
    assert!(resolver.resolve("@topo.cpt", Placement::Default).unwrap().needs_fetch());
    lock.release();
    assert!(!resolver.resolve("@topo.cpt", Placement::Default).unwrap().needs_fetch());
}

#[test]
fn test_literal_paths() {
    let dir = tempdir().unwrap();
    let layout = layout(dir.path());
    let resolver = NameResolver::new(&layout, None);

    let existing = dir.path().join("mine.grd");
    std::fs::write(&existing, "grid").unwrap();
    let res = resolver
        .resolve(existing.to_str().unwrap(), Placement::Default)
        .unwrap();
    assert_eq!(res.target, Target::Literal);
    assert_eq!(res.local, existing);
    assert!(!res.needs_fetch());

    let missing = dir.path().join("absent.grd");
    assert!(matches!(
        resolver.resolve(missing.to_str().unwrap(), Placement::Default),
        Err(RemoteError::NotFound { .. })
    ));
    assert!(resolver.resolve("@", Placement::Default).is_err());
}

#[test]
fn test_non_ascii_literal_paths() {
    let dir = tempdir().unwrap();
    let layout = layout(dir.path());
    let resolver = NameResolver::new(&layout, None);

    assert!(matches!(
        resolver.resolve("地形图.nc", Placement::Default),
        Err(RemoteError::NotFound { .. })
    ));

    let accented = dir.path().join("ü.nc");
    std::fs::write(&accented, "grid").unwrap();
    let res = resolver
        .resolve(accented.to_str().unwrap(), Placement::Default)
        .unwrap();
    assert_eq!(res.target, Target::Literal);
    assert_eq!(res.local, accented);
}

#[cfg(unix)]
#[test]
fn test_unreadable_literal_path() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let layout = layout(dir.path());
    let resolver = NameResolver::new(&layout, None);
    let locked = dir.path().join("locked.grd");
    std::fs::write(&locked, "grid").unwrap();
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

    // Permission bits do not apply to root.
    if std::fs::File::open(&locked).is_ok() {
        return;
    }

    let result = resolver.resolve(locked.to_str().unwrap(), Placement::Default);
    assert!(matches!(result, Err(RemoteError::BadPermission(ref path)) if *path == locked));
}
