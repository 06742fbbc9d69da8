use std::time::Duration;

use geofetch::config::Config;
use geofetch::Layout;
use tempfile::tempdir;

#[test]
fn test_load_explicit_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("geofetch.toml");
    std::fs::write(
        &path,
        "server_url = \"https://mirror.example.org/\"\n\
         refresh_interval_hours = 1\n\
         lock_timeout_secs = 5\n\
         max_download_size = 1048576\n",
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.server_base(), "https://mirror.example.org");
    assert_eq!(config.refresh_interval(), Duration::from_secs(3600));
    assert_eq!(config.lock_timeout(), Some(Duration::from_secs(5)));
    assert_eq!(config.max_download_size, 1_048_576);
    assert!(!config.offline);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("geofetch.toml");
    std::fs::write(&path, "refresh_interval_hours = \"soon\"\n").unwrap();
    assert!(Config::load(Some(&path)).is_err());
}

#[test]
fn test_layout_uses_configured_directories() {
    let dir = tempdir().unwrap();
    let config = Config {
        user_dir: Some(dir.path().join("data")),
        cache_dir: Some(dir.path().join("cache")),
        lock_dir: Some(dir.path().join("locks")),
        server_url: "https://mirror.example.org/".into(),
        ..Config::default()
    };
    let layout = Layout::from_config(&config).unwrap();
    assert_eq!(layout.user_root(), dir.path().join("data"));
    assert_eq!(layout.server_dir(), dir.path().join("data").join("server"));
    assert_eq!(layout.cache_root(), dir.path().join("cache"));
    assert_eq!(layout.lock_dir(), dir.path().join("locks"));
    assert_eq!(
        layout.url_for("/server/earth/earth_relief_01d_g.grd"),
        "https://mirror.example.org/server/earth/earth_relief_01d_g.grd"
    );
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = Config {
        verify_hash: true,
        timeout_secs: 90,
        ..Config::default()
    };
    config.save(&path).unwrap();
    assert_eq!(Config::load(Some(&path)).unwrap(), config);
}
