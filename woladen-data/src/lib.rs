//! Data access for the Woladen amenity engine.
//!
//! Responsibilities:
//! - Persist remote lookups in a JSON cache with schema and freshness rules.
//! - Query an Overpass interpreter with retries, a budget and pacing.
//! - Scan OSM PBF extracts and answer radius queries locally.
//! - Drive either backend over a station list and summarise the run.
//!
//! Boundaries:
//! - Classification, distances, grids and ranking live in `woladen-core`.
//! - Network and extract I/O sit behind traits with stub implementations
//!   in `test_support` modules.
//!
//! Invariants:
//! - Stations are processed sequentially in input order.
//! - No global mutable state.

pub mod cache;
pub mod enrichment;
pub mod extract;
mod http;
pub mod overpass;
pub mod rules;

pub use cache::{AmenityCache, CACHE_SCHEMA_VERSION, CacheEntry, CacheError, cache_key};
pub use enrichment::{
    AmenityBackend, BackendChoice, BackendKind, EnrichmentError, EnrichmentRun,
    EnrichmentSettings, EnrichmentSummary, ProgressSettings, enrich_stations, run_enrichment,
};
pub use extract::{ExtractError, ExtractStats, LocalExtractBackend};
pub use http::{DEFAULT_USER_AGENT, TransportError};
pub use overpass::{LookupStats, RemoteBackend, RemoteSettings};
pub use rules::{RulesFileError, load_rule_table};
