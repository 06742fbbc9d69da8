//! Network transfer of remote files.
//!
//! # Architecture
//!
//! * [`transport`]: the [`Transport`] trait, the only code that talks to a
//!   server, and its classified [`TransportError`].
//! * [`http`]: the production transport on `reqwest::blocking`.
//! * [`memory`]: an in-memory transport for offline runs and tests.
//! * [`fetch`]: the [`Downloader`], which wraps a transport with locking,
//!   size limits, interrupt cleanup and progress reporting.

pub mod fetch;
pub mod http;
pub mod memory;
pub mod transport;

pub use fetch::{sha256_file, verify_sha256, Downloader, FetchOutcome};
pub use http::{HttpOptions, HttpTransport};
pub use memory::MemoryTransport;
pub use transport::{ChunkSink, Transport, TransportError};
