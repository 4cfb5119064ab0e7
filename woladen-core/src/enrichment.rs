//! Enrichment results attached to stations.

use std::fmt;

use crate::{AmenityCounts, AmenityExample, AmenityLookup, RuleTable, Station};

/// How a station's result was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Provenance {
    /// Reused from a fresh cache entry.
    #[cfg_attr(feature = "serde", serde(rename = "cache"))]
    Cache,
    /// Fetched from the remote service during this run.
    #[cfg_attr(feature = "serde", serde(rename = "live"))]
    Live,
    /// Skipped because the query budget was exhausted.
    #[cfg_attr(feature = "serde", serde(rename = "deferred"))]
    Deferred,
    /// The remote lookup failed.
    #[cfg_attr(feature = "serde", serde(rename = "error"))]
    Error,
    /// Answered from a local PBF extract.
    #[cfg_attr(feature = "serde", serde(rename = "osm-pbf-backend"))]
    OsmPbfBackend,
}

impl Provenance {
    /// Wire name of the provenance tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Live => "live",
            Self::Deferred => "deferred",
            Self::Error => "error",
            Self::OsmPbfBackend => "osm-pbf-backend",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amenity summary for one station.
///
/// `total` always equals the sum of `counts`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EnrichmentResult {
    /// Counts for every configured category.
    pub counts: AmenityCounts,
    /// Sum of `counts`.
    pub total: u32,
    /// Ranked examples.
    pub examples: Vec<AmenityExample>,
    /// Provenance tag.
    pub source: Provenance,
}

impl EnrichmentResult {
    /// Build a result from a backend lookup.
    #[must_use]
    pub fn from_lookup(lookup: AmenityLookup, source: Provenance) -> Self {
        Self {
            total: lookup.counts.total(),
            counts: lookup.counts,
            examples: lookup.examples,
            source,
        }
    }

    /// Zero counts and no examples, e.g. for deferred or failed lookups.
    #[must_use]
    pub fn empty(rules: &RuleTable, source: Provenance) -> Self {
        Self::from_lookup(AmenityLookup::empty(rules), source)
    }
}

/// A station paired with its enrichment result.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedStation {
    /// The input station.
    pub station: Station,
    /// Its amenity summary.
    pub result: EnrichmentResult,
}
