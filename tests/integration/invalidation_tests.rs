use std::time::{Duration, SystemTime};

use filetime::{set_file_mtime, FileTime};
use geofetch::manifest::hash::render;
use geofetch::manifest::{HashEntry, ManifestKind};
use geofetch::Placement;
use tempfile::tempdir;

use super::common::{remote, server, sha256_hex, url, GRID_BODY};

const PALETTE: &str = "0 black 1 white";

fn published(grid_hash: &str, with_palette: bool) -> String {
    let mut entries = vec![HashEntry::new(
        "earth_relief_01d_g.grd",
        grid_hash,
        GRID_BODY.len() as u64,
    )];
    if with_palette {
        entries.push(HashEntry::new(
            "topo.cpt",
            sha256_hex(PALETTE.as_bytes()),
            PALETTE.len() as u64,
        ));
    }
    render(&entries)
}

fn expire(path: &std::path::Path) {
    let then = SystemTime::now() - Duration::from_secs(3 * 24 * 3600);
    set_file_mtime(path, FileTime::from_system_time(then)).unwrap();
}

#[test]
fn test_republished_file_is_evicted_and_refetched() {
    let dir = tempdir().unwrap();
    let transport = server();
    transport.insert(url("hash_server.txt"), published(&sha256_hex(GRID_BODY.as_bytes()), true));
    transport.insert(url("cache/topo.cpt"), PALETTE);

    let first = remote(dir.path(), &transport);
    let grid = first.locate("@earth_relief_01d_g", Placement::Default).unwrap();
    let palette = first.locate("@topo.cpt", Placement::Default).unwrap();
    assert!(grid.is_file() && palette.is_file());
    expire(&first.store().path(ManifestKind::Hash));

    // The grid is republished with new content; the palette is unchanged.
    transport.insert(url("hash_server.txt"), published("0123abcd", true));
    let next_run = remote(dir.path(), &transport);
    next_run.refresh_manifests();
    assert!(!grid.exists());
    assert!(palette.is_file());

    let fetched = transport.fetch_count();
    assert_eq!(next_run.locate("@earth_relief_01d_g", Placement::Default).unwrap(), grid);
    assert!(grid.is_file());
    assert_eq!(transport.fetch_count(), fetched + 1);
}

#[test]
fn test_discontinued_file_is_evicted() {
    let dir = tempdir().unwrap();
    let transport = server();
    transport.insert(url("hash_server.txt"), published(&sha256_hex(GRID_BODY.as_bytes()), true));
    transport.insert(url("cache/topo.cpt"), PALETTE);

    let first = remote(dir.path(), &transport);
    let palette = first.locate("@topo.cpt", Placement::Default).unwrap();
    expire(&first.store().path(ManifestKind::Hash));

    transport.insert(url("hash_server.txt"), published(&sha256_hex(GRID_BODY.as_bytes()), false));
    remote(dir.path(), &transport).refresh_manifests();
    assert!(!palette.exists());
}

#[test]
fn test_files_the_server_never_published_are_untouched() {
    let dir = tempdir().unwrap();
    let transport = server();
    let first = remote(dir.path(), &transport);
    first.refresh_manifests();
    let mine = first.layout().cache_root().join("my_notes.txt");
    std::fs::create_dir_all(mine.parent().unwrap()).unwrap();
    std::fs::write(&mine, "keep me").unwrap();
    expire(&first.store().path(ManifestKind::Hash));

    transport.insert(url("hash_server.txt"), published("ffff", false));
    remote(dir.path(), &transport).refresh_manifests();
    assert!(mine.is_file());
}

#[test]
fn test_tile_directory_older_than_release_is_expired() {
    let dir = tempdir().unwrap();
    let transport = server();
    let first = remote(dir.path(), &transport);
    first.refresh_manifests();

    let tiles_root = first.layout().server_dir().join("earth").join("earth_relief");
    let old_dir = tiles_root.join("earth_relief_01s_g");
    let new_dir = tiles_root.join("srtm_relief_01s_g");
    for d in [&old_dir, &new_dir] {
        std::fs::create_dir_all(d).unwrap();
        std::fs::write(d.join("N29W081.tile.nc"), "tile").unwrap();
    }
    // 2019-01-01, before the 2020-06-01 release.
    set_file_mtime(&old_dir, FileTime::from_unix_time(1_546_300_800, 0)).unwrap();
    expire(&first.store().path(ManifestKind::Catalog));

    remote(dir.path(), &transport).refresh_manifests();
    assert!(!old_dir.exists());
    assert!(new_dir.is_dir());
}
