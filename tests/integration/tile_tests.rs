use geofetch::tiles::{parse_blend_list, Prefetch, Region, TileAssembler};
use geofetch::RemoteError;
use tempfile::tempdir;

use super::common::{remote, server, url};

const TILE_DIR: &str = "/server/earth/earth_relief/earth_relief_01s_g";

fn region(w: f64, e: f64, s: f64, n: f64) -> Region {
    Region::new(w, e, s, n).unwrap()
}

#[test]
fn test_single_tile_is_fetched_and_listed() {
    let dir = tempdir().unwrap();
    let transport = server();
    transport.insert(url(&format!("{TILE_DIR}/N29W081.earth_relief_01s_g.jp2")), "tile bytes");
    let remote = remote(dir.path(), &transport);
    let area = region(-81.0, -80.0, 29.0, 30.0);

    let request = remote.tiles_for("@earth_relief_01s", &area).unwrap();
    assert_eq!(request.tiles, vec!["@N29W081.earth_relief_01s_g.nc".to_string()]);
    assert!(!request.need_filler);
    assert_eq!(request.background, Some(0.0));

    let summary = remote.grid_for_region("@earth_relief_01s", &area, &Prefetch).unwrap();
    assert!(summary.missing.is_empty());
    assert_eq!(summary.available.len(), 1);
    let tile = &summary.available[0];
    assert!(tile.ends_with("earth/earth_relief/earth_relief_01s_g/N29W081.earth_relief_01s_g.nc"));
    assert_eq!(std::fs::read_to_string(tile).unwrap(), "tile bytes");

    let list = TileAssembler::new(remote.layout().blend_dir()).list_path(&request);
    assert_eq!(
        list.file_name().unwrap().to_str().unwrap(),
        format!("tiled_{}_g_W081W080N029N030.lis", request.dataset_id)
    );
    let entries = parse_blend_list(&std::fs::read_to_string(&list).unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file, "@N29W081.earth_relief_01s_g.nc");
}

#[test]
fn test_ocean_cells_fall_back_to_filler() {
    let dir = tempdir().unwrap();
    let transport = server();
    // One row of 1-degree cells over 82W..80W: ocean, then land.
    transport.insert(url("cache/srtm_tiles.nc"), "-82 29 1 2 1\n02\n");
    transport.insert(url(&format!("{TILE_DIR}/N29W081.earth_relief_01s_g.jp2")), "land");
    let remote = remote(dir.path(), &transport);

    let area = region(-82.0, -80.0, 29.0, 30.0);
    let request = remote.tiles_for("earth_relief_01s", &area).unwrap();
    assert!(request.need_filler);
    assert_eq!(
        request.tiles,
        vec![
            "@N29W081.earth_relief_01s_g.nc".to_string(),
            "@N20W090.earth_relief_15s_p.nc".to_string(),
        ]
    );

    // The filler tile is not published; the blend carries on without it.
    let summary = remote.grid_for_region("earth_relief_01s", &area, &Prefetch).unwrap();
    assert_eq!(summary.available.len(), 1);
    assert_eq!(summary.missing, vec!["@N20W090.earth_relief_15s_p.nc".to_string()]);
}

#[test]
fn test_antimeridian_region_wraps_tile_names() {
    let dir = tempdir().unwrap();
    let transport = server();
    let remote = remote(dir.path(), &transport);

    let request = remote
        .tiles_for("@earth_relief_01s", &region(179.0, 181.0, 0.0, 1.0))
        .unwrap();
    assert_eq!(
        request.tiles,
        vec![
            "@N00E179.earth_relief_01s_g.nc".to_string(),
            "@N00W180.earth_relief_01s_g.nc".to_string(),
        ]
    );
}

#[test]
fn test_untiled_dataset_is_rejected() {
    let dir = tempdir().unwrap();
    let transport = server();
    let remote = remote(dir.path(), &transport);
    assert!(matches!(
        remote.tiles_for("@earth_relief_01d", &region(0.0, 1.0, 0.0, 1.0)),
        Err(RemoteError::NotTiled(_))
    ));
    assert!(matches!(
        remote.tiles_for("@no_such_relief", &region(0.0, 1.0, 0.0, 1.0)),
        Err(RemoteError::NotFound { .. })
    ));
}

#[test]
fn test_repeated_request_reuses_blend_list() {
    let dir = tempdir().unwrap();
    let transport = server();
    let remote = remote(dir.path(), &transport);
    let request = remote
        .tiles_for("@earth_relief_15s", &region(0.0, 25.0, 0.0, 5.0))
        .unwrap();
    assert_eq!(request.tiles.len(), 3);

    let assembler = TileAssembler::new(remote.layout().blend_dir());
    let first = assembler.write_list(&request).unwrap();
    let before = std::fs::metadata(&first).unwrap().modified().unwrap();
    let second = assembler.write_list(&request).unwrap();
    assert_eq!(first, second);
    assert_eq!(std::fs::metadata(&second).unwrap().modified().unwrap(), before);
}
