//! HTTP plumbing shared by the Overpass transport and the extract fetcher.

use std::future::Future;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

/// Default user agent for outbound requests.
pub const DEFAULT_USER_AGENT: &str = "woladen-engine/0.1 (+https://woladen.de)";

/// A request failed before a usable response arrived.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with an unexpected status.
    #[error("request to {url} failed with status {status}")]
    Http {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
    /// Connection, TLS or body streaming failed.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Request URL.
        url: String,
        /// I/O error reported by the client.
        #[source]
        source: io::Error,
    },
    /// The request did not finish within the client timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Request URL.
        url: String,
        /// Configured timeout.
        timeout_secs: u64,
    },
}

pub(crate) fn convert_reqwest_error(error: reqwest::Error, url: &str, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout {
            url: url.to_owned(),
            timeout_secs: timeout.as_secs(),
        };
    }
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
        };
    }
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::other(error),
    }
}

/// Drive `future` to completion from synchronous code.
///
/// Inside a multi-threaded Tokio runtime the caller's handle is used through
/// [`tokio::task::block_in_place`]; otherwise `fallback` runs the future.
pub(crate) fn block_on<F: Future>(fallback: &Runtime, future: F) -> F::Output {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| handle.block_on(future))
        }
        _ => fallback.block_on(future),
    }
}

pub(crate) fn current_thread_runtime() -> io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
