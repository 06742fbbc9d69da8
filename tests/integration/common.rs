use std::path::Path;
use std::sync::Arc;

use geofetch::config::Config;
use geofetch::download::{MemoryTransport, Transport};
use geofetch::manifest::hash::render;
use geofetch::manifest::HashEntry;
use geofetch::{Layout, RemoteData};

pub const BASE: &str = "https://data.example.org";

pub const CATALOG: &str = "\
4
# 0.1.0 or newer is required
/server/earth/earth_relief/\tearth_relief_01d_g.grd\t01d\tg\t0.5\t0\t128K\t0\t2020-06-01\t-\t-\t@earth_relief.cpt\tEarth Relief at 1x1 arc degrees
/server/earth/earth_relief/\tearth_relief_15s_p/\t15s\tp\t0.5\t0\t3G\t10\t2020-06-01\t-\t-\t@earth_relief.cpt\tEarth Relief at 15 arc seconds
/server/earth/earth_relief/\tearth_relief_01s_g/\t01s\tg\t1\t0\t41G\t1\t2020-06-01\t@srtm_tiles.nc\t@earth_relief_15s_p\t@earth_relief.cpt\tEarth Relief at 1 arc second [SRTM1S]
/server/earth/earth_relief/\tsrtm_relief_01s_g/\t01s\tg\t1\t0\t41G\t1\t2020-06-01\t@srtm_tiles.nc\t-\t@srtm.cpt\tSRTM Relief at 1 arc second
";

pub const GRID_BODY: &str = "global relief";

/// Layout rooted in a scratch directory.
pub fn layout(root: &Path) -> Layout {
    Layout::new(
        root.join("user"),
        root.join("cache"),
        root.join("locks"),
        BASE,
    )
}

pub fn url(path: &str) -> String {
    format!("{BASE}/{}", path.trim_start_matches('/'))
}

/// A server publishing the catalog, a hash manifest and one grid.
pub fn server() -> Arc<MemoryTransport> {
    let transport = Arc::new(MemoryTransport::new());
    transport.insert(url("data_server.txt"), CATALOG);
    transport.insert(
        url("hash_server.txt"),
        render(&[HashEntry::new(
            "earth_relief_01d_g.grd",
            sha256_hex(GRID_BODY.as_bytes()),
            GRID_BODY.len() as u64,
        )]),
    );
    transport.insert(url("/server/earth/earth_relief/earth_relief_01d_g.grd"), GRID_BODY);
    transport
}

pub fn remote(root: &Path, transport: &Arc<MemoryTransport>) -> RemoteData {
    remote_with(root, transport, Config::default())
}

pub fn remote_with(root: &Path, transport: &Arc<MemoryTransport>, config: Config) -> RemoteData {
    RemoteData::new(
        &config,
        layout(root),
        Arc::clone(transport) as Arc<dyn Transport>,
    )
}

pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(data))
}
