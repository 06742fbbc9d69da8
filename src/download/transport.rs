//! Network transport seam.
//!
//! [`Transport`] is the only place that talks to the network. The
//! production implementation is [`super::HttpTransport`]; tests plug in
//! counting or failing transports.

use std::io;

/// Classified network failure.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server could not be reached at all.
    #[error("cannot connect to {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The connection or transfer timed out.
    #[error("timed out fetching {0}")]
    Timeout(String),

    /// The server does not have the resource.
    #[error("{0} not found on server")]
    NotFound(String),

    /// Any other error status.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The transfer was cut off before completion.
    #[error("transfer of {0} aborted")]
    Aborted(String),

    /// Writing a received chunk failed.
    #[error("failed to store received data: {0}")]
    Sink(#[source] io::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether the failure means the server itself is unavailable.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Timeout(_))
    }
}

/// Receives body chunks in order. Returning an error aborts the transfer.
pub type ChunkSink<'a> = dyn FnMut(&[u8]) -> io::Result<()> + 'a;

/// Blocking transport for remote files.
pub trait Transport: Send + Sync {
    /// Size of the remote resource from a metadata-only request.
    ///
    /// `Ok(None)` means the server did not say.
    fn content_length(&self, url: &str) -> Result<Option<u64>, TransportError>;

    /// Stream the body of `url` into `sink`. Returns the number of bytes
    /// delivered.
    fn fetch(&self, url: &str, sink: &mut ChunkSink<'_>) -> Result<u64, TransportError>;
}
