//! In-memory transport.
//!
//! Serves a fixed set of URLs from memory and counts requests. Used to run
//! the acquisition pipeline without a network, in tests and benchmarks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use super::transport::{ChunkSink, Transport, TransportError};

const CHUNK: usize = 16;

/// Transport answering from a URL -> body map.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
    unreachable: AtomicBool,
    abort_after: Mutex<Option<usize>>,
    delay: Mutex<Option<Duration>>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `body` at `url`, replacing any previous body.
    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into(), body.into());
    }

    pub fn remove(&self, url: &str) {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).remove(url);
    }

    /// Number of body transfers started.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Make every request fail as if the server were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Cut every transfer off after `bytes` bytes.
    pub fn set_abort_after(&self, bytes: Option<usize>) {
        *self.abort_after.lock().unwrap_or_else(|e| e.into_inner()) = bytes;
    }

    /// Sleep between chunks, to widen race windows.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    fn body(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(url.to_string()))
    }
}

impl Transport for MemoryTransport {
    fn content_length(&self, url: &str) -> Result<Option<u64>, TransportError> {
        Ok(Some(self.body(url)?.len() as u64))
    }

    fn fetch(&self, url: &str, sink: &mut ChunkSink<'_>) -> Result<u64, TransportError> {
        let body = self.body(url)?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let abort_after = *self.abort_after.lock().unwrap_or_else(|e| e.into_inner());
        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());

        let limit = abort_after.map_or(body.len(), |n| n.min(body.len()));
        let mut sent = 0u64;
        for chunk in body[..limit].chunks(CHUNK) {
            if let Some(d) = delay {
                thread::sleep(d);
            }
            sink(chunk).map_err(TransportError::Sink)?;
            sent += chunk.len() as u64;
        }
        if abort_after.is_some() {
            return Err(TransportError::Aborted(url.to_string()));
        }
        Ok(sent)
    }
}
