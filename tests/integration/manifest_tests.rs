use std::sync::Arc;
use std::time::{Duration, SystemTime};

use filetime::{set_file_mtime, FileTime};
use geofetch::config::Config;
use geofetch::download::{Downloader, Transport};
use geofetch::manifest::{ManifestKind, ManifestStore, RefreshOutcome};
use geofetch::session::Session;
use geofetch::RemoteError;
use tempfile::tempdir;

use super::common::{layout, remote, server, url, CATALOG};

fn age(path: &std::path::Path, hours: u64) {
    let then = SystemTime::now() - Duration::from_secs(hours * 3600);
    set_file_mtime(path, FileTime::from_system_time(then)).unwrap();
}

#[test]
fn test_first_use_downloads_both_manifests() {
    let dir = tempdir().unwrap();
    let transport = server();
    let remote = remote(dir.path(), &transport);

    let outcomes = remote.refresh_manifests();
    assert_eq!(
        outcomes,
        vec![
            (ManifestKind::Hash, RefreshOutcome::Downloaded),
            (ManifestKind::Catalog, RefreshOutcome::Downloaded),
        ]
    );
    assert!(remote.store().path(ManifestKind::Hash).is_file());
    assert_eq!(remote.catalog().unwrap().len(), 4);
}

#[test]
fn test_refresh_happens_once_per_session() {
    let dir = tempdir().unwrap();
    let transport = server();
    let remote = remote(dir.path(), &transport);

    remote.refresh_manifests();
    let fetched = transport.fetch_count();
    let again = remote.refresh_manifests();
    assert!(again.iter().all(|(_, o)| *o == RefreshOutcome::Skipped));
    assert_eq!(transport.fetch_count(), fetched);
}

#[test]
fn test_young_manifest_is_not_refetched() {
    let dir = tempdir().unwrap();
    let transport = server();
    remote(dir.path(), &transport).refresh_manifests();
    let fetched = transport.fetch_count();

    let next_run = remote(dir.path(), &transport);
    let outcomes = next_run.refresh_manifests();
    assert!(outcomes.iter().all(|(_, o)| *o == RefreshOutcome::Fresh));
    assert_eq!(transport.fetch_count(), fetched);
}

#[test]
fn test_expired_manifest_is_replaced() {
    let dir = tempdir().unwrap();
    let transport = server();
    let first = remote(dir.path(), &transport);
    first.refresh_manifests();
    let path = first.store().path(ManifestKind::Catalog);
    age(&path, 48);

    let updated = CATALOG.replacen("Earth Relief at 1x1 arc degrees", "Relief, revised", 1);
    transport.insert(url("data_server.txt"), updated.as_str());

    let next_run = remote(dir.path(), &transport);
    let outcomes = next_run.refresh_manifests();
    assert!(outcomes.contains(&(ManifestKind::Catalog, RefreshOutcome::Updated)));
    assert!(std::fs::read_to_string(&path).unwrap().contains("Relief, revised"));
    assert!(!path.with_file_name("data_server.txt.old").exists());
    assert!(!path.with_file_name("data_server.txt.new").exists());
}

#[test]
fn test_unusable_download_keeps_local_copy() {
    let dir = tempdir().unwrap();
    let transport = server();
    let first = remote(dir.path(), &transport);
    first.refresh_manifests();
    let path = first.store().path(ManifestKind::Catalog);
    age(&path, 48);

    transport.insert(url("data_server.txt"), "7\nnot a manifest\n");
    let next_run = remote(dir.path(), &transport);
    let outcomes = next_run.refresh_manifests();
    assert!(outcomes.contains(&(ManifestKind::Catalog, RefreshOutcome::KeptExisting)));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), CATALOG);
    assert_eq!(next_run.catalog().unwrap().len(), 4);
}

#[test]
fn test_server_down_keeps_existing_manifests() {
    let dir = tempdir().unwrap();
    let transport = server();
    let first = remote(dir.path(), &transport);
    first.refresh_manifests();
    age(&first.store().path(ManifestKind::Hash), 48);
    age(&first.store().path(ManifestKind::Catalog), 48);

    transport.set_unreachable(true);
    let next_run = remote(dir.path(), &transport);
    assert!(next_run
        .refresh_manifests()
        .iter()
        .all(|(_, o)| *o == RefreshOutcome::KeptExisting));
    assert!(next_run.catalog().is_some());
    assert!(next_run.session().network_disabled());
}

#[test]
fn test_truncated_manifest_is_corrupt_and_removed() {
    let dir = tempdir().unwrap();
    let layout = layout(dir.path());
    let downloader = Downloader::new(
        server() as Arc<dyn Transport>,
        Arc::new(Session::new()),
        layout.lock_dir(),
    );
    let store = ManifestStore::new(layout.clone(), downloader);
    let path = store.path(ManifestKind::Hash);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "3\na.grd 00ff 10\nb.grd 11ee 20\n").unwrap();

    assert!(matches!(store.load_hash(), Err(RemoteError::Corrupt { .. })));
    assert!(!path.exists());
}

#[test]
fn test_offline_session_never_fetches() {
    let dir = tempdir().unwrap();
    let transport = server();
    let config = Config {
        offline: true,
        ..Config::default()
    };
    let remote = super::common::remote_with(dir.path(), &transport, config);
    assert!(remote.catalog().is_none());
    assert!(remote.locate("@earth_relief_01d_g", geofetch::Placement::Default).is_err());
    assert_eq!(transport.fetch_count(), 0);
}
