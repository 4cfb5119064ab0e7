//! Core domain types for the woladen amenity enrichment engine.
//!
//! Responsibilities:
//! - Describe amenity categories as tag-selector rules.
//! - Count and rank amenities found around a charging station.
//! - Provide the spherical distance and grid helpers shared by backends.
//!
//! Boundaries:
//! - No I/O. Caches, HTTP clients and extract readers live in
//!   `woladen-data`.
//!
//! Constructors return `Result` to surface invalid input early.

mod amenity;
pub mod distance;
mod enrichment;
mod grid;
mod rules;
mod station;
mod tags;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use amenity::{
    AmenityCounts, AmenityDetails, AmenityExample, AmenityLookup, AmenityTally, ElementKind,
    ElementRef, MAX_EXAMPLES, ParseElementKindError, rank_examples,
};
pub use enrichment::{EnrichedStation, EnrichmentResult, Provenance};
pub use grid::{CoverageBox, GridCell, GridStep, GridStepError};
pub use rules::{AmenityRule, RuleTable, RuleTableError, TagSelector};
pub use station::{Station, StationError};
pub use tags::Tags;
