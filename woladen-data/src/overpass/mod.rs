//! Remote amenity lookups against an Overpass interpreter.
//!
//! The pieces compose bottom-up: [`build_overpass_query`] renders the rule
//! table into Overpass QL, [`send_with_retry`] posts it through an
//! [`OverpassTransport`] under a [`BackoffPolicy`], [`parse_elements`]
//! decodes the response and [`RemoteBackend`] drives the per-station cache,
//! budget and pacing policy.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use woladen_core::{RuleTable, Station};
//! use woladen_data::cache::AmenityCache;
//! use woladen_data::overpass::{
//!     HttpOverpassConfig, HttpOverpassTransport, RemoteBackend, RemoteSettings,
//! };
//!
//! let transport = HttpOverpassTransport::with_config(HttpOverpassConfig::default())?;
//! let cache = AmenityCache::load("data/amenity_cache.json")?;
//! let mut backend = RemoteBackend::new(
//!     RuleTable::default(),
//!     transport,
//!     cache,
//!     RemoteSettings::default(),
//!     Utc::now(),
//! );
//! let station = Station::new("DE-1", 52.52, 13.405)?;
//! let result = backend.enrich_station(&station);
//! println!("{} amenities ({})", result.total, result.source);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod backend;
mod query;
mod response;
mod retry;
mod transport;

#[doc(hidden)]
pub mod test_support;

use thiserror::Error;

pub use backend::{LookupStats, RemoteBackend, RemoteSettings};
pub use query::{QUERY_TIMEOUT_SECS, build_overpass_query};
pub use response::{OverpassElement, parse_elements};
pub use retry::{BackoffPolicy, Pause, RETRYABLE_STATUSES, ThreadPause, send_with_retry};
pub use transport::{
    DEFAULT_OVERPASS_URL, HttpOverpassConfig, HttpOverpassTransport, OverpassTransport,
    TransportBuildError, TransportResponse,
};

pub use crate::http::{DEFAULT_USER_AGENT, TransportError};

/// Errors from a single remote lookup.
#[derive(Debug, Error)]
pub enum OverpassError {
    /// The service answered with an error status.
    #[error("request to {url} failed with status {status} after {attempts} attempt(s)")]
    Status {
        /// Endpoint URL.
        url: String,
        /// Last HTTP status.
        status: u16,
        /// Attempts made.
        attempts: u32,
    },
    /// No HTTP status was received.
    #[error("request failed after {attempts} attempt(s)")]
    Transport {
        /// Attempts made.
        attempts: u32,
        /// Last transport failure.
        #[source]
        source: TransportError,
    },
    /// The body was not valid JSON.
    #[error("failed to decode Overpass response")]
    Decode {
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// The body was JSON but not shaped like an Overpass response.
    #[error("malformed Overpass response: {reason}")]
    Malformed {
        /// What was wrong.
        reason: &'static str,
    },
}
