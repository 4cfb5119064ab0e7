//! Facade crate for the Woladen amenity enrichment engine.
//!
//! This crate re-exports the core domain types and the enrichment backends.
//! PBF extract support sits behind the `extract-pbf` feature.

#![forbid(unsafe_code)]

pub use woladen_core::{
    AmenityCounts, AmenityExample, AmenityRule, EnrichedStation, EnrichmentResult, GridCell,
    GridStep, Provenance, RuleTable, RuleTableError, Station, StationError, TagSelector, Tags,
};

pub use woladen_data::{
    AmenityBackend, AmenityCache, BackendChoice, BackendKind, EnrichmentError, EnrichmentRun,
    EnrichmentSettings, EnrichmentSummary, LocalExtractBackend, LookupStats, RemoteBackend,
    RemoteSettings, enrich_stations, load_rule_table, run_enrichment,
};

#[cfg(feature = "extract-pbf")]
pub use woladen_data::extract::PbfExtract;
