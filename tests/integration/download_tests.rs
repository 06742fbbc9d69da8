use std::sync::Arc;
use std::thread;
use std::time::Duration;

use geofetch::download::{Downloader, FetchOutcome, MemoryTransport, Transport};
use geofetch::lock::FileLock;
use geofetch::session::Session;
use geofetch::RemoteError;
use tempfile::tempdir;

use super::common::url;

fn downloader(transport: &Arc<MemoryTransport>, lock_dir: &std::path::Path) -> Downloader {
    Downloader::new(
        Arc::clone(transport) as Arc<dyn Transport>,
        Arc::new(Session::new()),
        lock_dir,
    )
}

#[test]
fn test_concurrent_fetches_download_once() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let target = url("cache/topo.nc");
    transport.insert(&target, vec![7u8; 256]);
    transport.set_delay(Some(Duration::from_millis(5)));

    let dest = dir.path().join("cache").join("topo.nc");
    let locks = dir.path().join("locks");
    let outcomes: Vec<FetchOutcome> = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                // Separate downloaders stand in for separate processes.
                let dl = downloader(&transport, &locks);
                let (target, dest) = (&target, &dest);
                s.spawn(move || dl.fetch(target, dest).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(transport.fetch_count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, FetchOutcome::AlreadyPresent))
            .count(),
        1
    );
    assert_eq!(std::fs::read(&dest).unwrap(), vec![7u8; 256]);
    assert!(!FileLock::in_progress(&locks, &dest));
}

#[test]
fn test_aborted_transfer_leaves_nothing_behind() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let target = url("cache/big.nc");
    transport.insert(&target, vec![1u8; 1000]);
    transport.set_abort_after(Some(100));

    let dest = dir.path().join("big.nc");
    let locks = dir.path().join("locks");
    let dl = downloader(&transport, &locks);
    assert!(dl.fetch(&target, &dest).is_err());
    assert!(!dest.exists());
    assert!(!FileLock::in_progress(&locks, &dest));

    // The next attempt starts over and succeeds.
    transport.set_abort_after(None);
    assert!(matches!(
        dl.fetch(&target, &dest).unwrap(),
        FetchOutcome::Downloaded { bytes: 1000 }
    ));
}

#[test]
fn test_size_limit_rejects_before_transfer() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let target = url("cache/huge.nc");
    transport.insert(&target, vec![0u8; 4096]);

    let dest = dir.path().join("huge.nc");
    let dl = downloader(&transport, &dir.path().join("locks")).with_size_limit(1024);
    assert!(matches!(
        dl.fetch(&target, &dest),
        Err(RemoteError::TooLarge { .. })
    ));
    assert!(!dest.exists());
}

#[test]
fn test_unreachable_server_disables_network_for_session() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    transport.insert(url("cache/a.nc"), "a");
    transport.insert(url("cache/b.nc"), "b");
    transport.set_unreachable(true);

    let dl = downloader(&transport, &dir.path().join("locks"));
    let first = dl.fetch(&url("cache/a.nc"), &dir.path().join("a.nc"));
    assert!(matches!(first, Err(RemoteError::NetworkUnavailable(_))));
    assert!(dl.session().network_disabled());

    transport.set_unreachable(false);
    let second = dl.fetch(&url("cache/b.nc"), &dir.path().join("b.nc"));
    assert!(matches!(second, Err(RemoteError::NetworkUnavailable(_))));
    assert!(!dir.path().join("b.nc").exists());
}

#[test]
fn test_missing_remote_file_is_soft() {
    let dir = tempdir().unwrap();
    let transport = Arc::new(MemoryTransport::new());
    let dl = downloader(&transport, &dir.path().join("locks"));
    let err = dl
        .fetch(&url("cache/nothing.nc"), &dir.path().join("nothing.nc"))
        .unwrap_err();
    assert!(err.is_soft());
    assert!(!dl.session().network_disabled());
}

#[test]
fn test_tampered_download_is_rejected_before_unlock() {
    use geofetch::config::Config;
    use geofetch::Placement;

    use super::common::{layout, remote_with, server};

    let dir = tempdir().unwrap();
    let transport = server();
    transport.insert(
        url("/server/earth/earth_relief/earth_relief_01d_g.grd"),
        "tampered relief",
    );
    let config = Config {
        verify_hash: true,
        ..Config::default()
    };
    let remote = remote_with(dir.path(), &transport, config);

    let err = remote.locate("@earth_relief_01d", Placement::Default).unwrap_err();
    assert!(matches!(err, RemoteError::Corrupt { .. }));

    let layout = layout(dir.path());
    let dest = layout
        .server_dir()
        .join("earth")
        .join("earth_relief")
        .join("earth_relief_01d_g.grd");
    assert!(!dest.exists());
    assert!(!FileLock::in_progress(layout.lock_dir(), &dest));
}
