//! HTTP transport for Overpass queries.
//!
//! [`OverpassTransport`] is synchronous so the enrichment loop stays a plain
//! sequential loop. [`HttpOverpassTransport`] bridges to `reqwest` by
//! blocking on a Tokio runtime it owns.

use std::io;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::runtime::Runtime;

use crate::http::{
    DEFAULT_USER_AGENT, TransportError, block_on, convert_reqwest_error, current_thread_runtime,
};

/// Public Overpass endpoint used when none is configured.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Default client-side request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Raw HTTP outcome of a query: any status, including error statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Response with the given status and body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends one query to the service.
pub trait OverpassTransport {
    /// Endpoint the transport posts to, for diagnostics.
    fn endpoint(&self) -> &str;

    /// Post `query` as the form field `data` and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no HTTP status was received. Error
    /// statuses are returned as responses, not errors.
    fn post_query(&self, query: &str) -> Result<TransportResponse, TransportError>;
}

impl<T: OverpassTransport + ?Sized> OverpassTransport for &T {
    fn endpoint(&self) -> &str {
        (**self).endpoint()
    }

    fn post_query(&self, query: &str) -> Result<TransportResponse, TransportError> {
        (**self).post_query(query)
    }
}

/// Errors building an [`HttpOverpassTransport`].
#[derive(Debug, Error)]
pub enum TransportBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// Configuration for [`HttpOverpassTransport`].
#[derive(Debug, Clone)]
pub struct HttpOverpassConfig {
    /// Interpreter endpoint URL.
    pub endpoint: String,
    /// Connect and request timeout.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpOverpassConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_OVERPASS_URL.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpOverpassConfig {
    /// Configuration targeting `endpoint` with default timeout and agent.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// `reqwest`-backed transport.
///
/// Outside any Tokio runtime, or inside a `current_thread` one, requests run
/// on the transport's own runtime. Inside a multi-threaded runtime the
/// caller's handle is used through [`tokio::task::block_in_place`].
pub struct HttpOverpassTransport {
    client: Client,
    config: HttpOverpassConfig,
    runtime: Runtime,
}

impl std::fmt::Debug for HttpOverpassTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOverpassTransport")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl HttpOverpassTransport {
    /// Build a transport from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn with_config(config: HttpOverpassConfig) -> Result<Self, TransportBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(TransportBuildError::HttpClient)?;
        let runtime = current_thread_runtime().map_err(TransportBuildError::Runtime)?;
        Ok(Self {
            client,
            config,
            runtime,
        })
    }

    async fn post_async(&self, query: &str) -> Result<TransportResponse, TransportError> {
        let url = self.config.endpoint.as_str();
        let response = self
            .client
            .post(url)
            .form(&[("data", query)])
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url, self.config.timeout))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| convert_reqwest_error(err, url, self.config.timeout))?;
        Ok(TransportResponse::new(status, body.to_vec()))
    }
}

impl OverpassTransport for HttpOverpassTransport {
    fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn post_query(&self, query: &str) -> Result<TransportResponse, TransportError> {
        block_on(&self.runtime, self.post_async(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn config_builders_override_defaults() {
        let config = HttpOverpassConfig::new("http://localhost:12345/api/interpreter")
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("test-agent/1.0");
        assert_eq!(config.endpoint, "http://localhost:12345/api/interpreter");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test-agent/1.0");
        assert_eq!(HttpOverpassConfig::default().endpoint, DEFAULT_OVERPASS_URL);
    }

    #[rstest]
    fn unreachable_endpoints_surface_as_transport_errors() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let config = HttpOverpassConfig::new("http://127.0.0.1:9/api/interpreter")
            .with_timeout(Duration::from_secs(2));
        let transport = HttpOverpassTransport::with_config(config).expect("build transport");
        let err = transport
            .post_query("[out:json];out;")
            .expect_err("nothing listens on the discard port");
        assert!(matches!(
            err,
            TransportError::Network { .. } | TransportError::Timeout { .. }
        ));
    }
}
