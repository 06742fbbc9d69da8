//! HTTP(S) transport on the blocking reqwest client.

use std::io::{ErrorKind, Read};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_LENGTH;
use reqwest::redirect::Policy;
use reqwest::StatusCode;

use super::transport::{ChunkSink, Transport, TransportError};
use crate::config::Config;

const CHUNK_SIZE: usize = 64 * 1024;
const MAX_REDIRECTS: usize = 10;

/// Client settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub connect_timeout: Duration,
    /// Overall per-request timeout.
    pub timeout: Option<Duration>,
    pub verify_peer: bool,
    pub follow_redirects: bool,
    /// Treat 4xx/5xx responses as failures instead of saving the body.
    pub fail_on_error: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl HttpOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            timeout: config.timeout(),
            verify_peer: config.verify_peer,
            follow_redirects: config.follow_redirects,
            fail_on_error: config.fail_on_error,
        }
    }
}

/// Transport backed by `reqwest::blocking`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    options: HttpOptions,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("options", &self.options)
            .finish()
    }
}

impl HttpTransport {
    pub fn new(options: HttpOptions) -> Result<Self, TransportError> {
        let redirect = if options.follow_redirects {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };
        let mut builder = Client::builder()
            .connect_timeout(options.connect_timeout)
            .danger_accept_invalid_certs(!options.verify_peer)
            .redirect(redirect)
            .user_agent(concat!("geofetch/", env!("CARGO_PKG_VERSION")));
        // The blocking client applies a 30 s default; an explicit None lifts it.
        builder = builder.timeout(options.timeout);
        let client = builder
            .build()
            .map_err(|e| TransportError::Other(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, options })
    }

    fn check_status(&self, url: &str, status: StatusCode) -> Result<(), TransportError> {
        if status == StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(url.to_string()));
        }
        if self.options.fail_on_error && (status.is_client_error() || status.is_server_error()) {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

fn classify(err: reqwest::Error, url: &str) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(url.to_string())
    } else if err.is_connect() {
        TransportError::Unreachable {
            url: url.to_string(),
            reason: err.to_string(),
        }
    } else if let Some(status) = err.status() {
        TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        TransportError::Other(format!("{url}: {err}"))
    }
}

impl Transport for HttpTransport {
    fn content_length(&self, url: &str) -> Result<Option<u64>, TransportError> {
        let response = self.client.head(url).send().map_err(|e| classify(e, url))?;
        self.check_status(url, response.status())?;
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok()))
    }

    fn fetch(&self, url: &str, sink: &mut ChunkSink<'_>) -> Result<u64, TransportError> {
        let mut response = self.client.get(url).send().map_err(|e| classify(e, url))?;
        self.check_status(url, response.status())?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = match response.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    return Err(TransportError::Timeout(url.to_string()))
                }
                Err(e) => return Err(TransportError::Other(format!("{url}: {e}"))),
            };
            sink(&buf[..n]).map_err(TransportError::Sink)?;
            total += n as u64;
        }
        Ok(total)
    }
}
