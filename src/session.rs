//! Per-process session state shared by the acquisition components.
//!
//! Holds the few facts that must persist for the lifetime of a run but must
//! not live on shared catalog records:
//!
//! * whether the network has been found unreachable (sticky),
//! * which manifests have already had their refresh attempted,
//! * which datasets have already shown their attribution notice.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::manifest::ManifestKind;

/// Session-wide flags. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct Session {
    network_disabled: AtomicBool,
    network_used: AtomicBool,
    refreshed: Mutex<HashSet<ManifestKind>>,
    attributed: Mutex<HashSet<usize>>,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that never touches the network.
    #[must_use]
    pub fn offline() -> Self {
        let session = Self::default();
        session.network_disabled.store(true, Ordering::SeqCst);
        session
    }

    /// Whether network access has been disabled for the rest of the session.
    #[must_use]
    pub fn network_disabled(&self) -> bool {
        self.network_disabled.load(Ordering::SeqCst)
    }

    /// Disable further network attempts. Returns `true` the first time.
    pub fn disable_network(&self) -> bool {
        !self.network_disabled.swap(true, Ordering::SeqCst)
    }

    /// Record a network round-trip. Returns `true` only for the first one.
    pub fn note_network_use(&self) -> bool {
        !self.network_used.swap(true, Ordering::SeqCst)
    }

    /// Claim the one refresh attempt allowed per manifest kind.
    ///
    /// Returns `false` if a refresh of `kind` was already attempted.
    pub fn claim_refresh(&self, kind: ManifestKind) -> bool {
        let mut refreshed = self.refreshed.lock().unwrap_or_else(|e| e.into_inner());
        refreshed.insert(kind)
    }

    /// Claim the attribution notice for a dataset id.
    ///
    /// Returns `true` the first time a given id is seen.
    pub fn claim_attribution(&self, dataset_id: usize) -> bool {
        let mut attributed = self.attributed.lock().unwrap_or_else(|e| e.into_inner());
        attributed.insert(dataset_id)
    }
}
