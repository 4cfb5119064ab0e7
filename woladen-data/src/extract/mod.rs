//! Local amenity lookups from an OpenStreetMap extract.
//!
//! Responsibilities:
//! - Stream an extract once through an [`ExtractVisitor`], keeping only
//!   classified geometries that fall in a coarse cell near some station.
//! - Index the survivors on a fine grid sized to the search radius.
//! - Answer per-station radius queries from memory.
//!
//! Boundaries:
//! - PBF decoding lives behind [`ExtractSource`]; `osmpbf` is only used by
//!   [`PbfExtract`], compiled with the `extract-pbf` feature.
//! - No cache: every run rescans the extract.

use std::io;

use camino::Utf8PathBuf;
use geo::Coord;
use serde::Serialize;
use thiserror::Error;
use woladen_core::{GridStepError, Tags};

use crate::http::TransportError;

mod backend;
mod collector;
mod fetch;
mod index;
#[cfg(feature = "extract-pbf")]
mod pbf;

#[doc(hidden)]
pub mod test_support;

pub use backend::LocalExtractBackend;
pub use collector::{AmenityPoint, COARSE_STEP, CoarseFilter};
pub use fetch::{ExtractDownloader, HttpExtractDownloader, fetch_extract, fetch_extract_blocking};
pub use index::{FineIndex, MIN_FINE_STEP_DEG};
#[cfg(feature = "extract-pbf")]
pub use pbf::PbfExtract;

/// A node with a valid coordinate.
#[derive(Debug, Clone, Copy)]
pub struct RawNode<'a> {
    /// Node id.
    pub id: i64,
    /// WGS84 position.
    pub location: Coord<f64>,
    /// Tags in stream order.
    pub tags: &'a [(&'a str, &'a str)],
}

/// A way whose node references have been resolved.
#[derive(Debug, Clone, Copy)]
pub struct RawWay<'a> {
    /// Way id.
    pub id: i64,
    /// Way tags.
    pub tags: &'a Tags,
    /// Positions of the referenced nodes that could be resolved, in order.
    pub nodes: &'a [Coord<f64>],
}

/// A relation; members are not resolved.
#[derive(Debug, Clone, Copy)]
pub struct RawRelation<'a> {
    /// Relation id.
    pub id: i64,
    /// Tags in stream order.
    pub tags: &'a [(&'a str, &'a str)],
}

/// Callbacks invoked while an extract is scanned.
///
/// Ways are offered twice: [`ExtractVisitor::wants_way`] sees the tags as
/// the way is read, and only accepted ways are later passed to
/// [`ExtractVisitor::visit_way`] with their node positions resolved.
pub trait ExtractVisitor {
    /// Called for every node with a valid coordinate.
    fn visit_node(&mut self, node: RawNode<'_>);

    /// Whether the way `id` with `tags` should be resolved and visited.
    fn wants_way(&mut self, id: i64, tags: &[(&str, &str)]) -> bool;

    /// Called for every accepted way once its nodes are resolved.
    fn visit_way(&mut self, way: RawWay<'_>);

    /// Called for every relation.
    fn visit_relation(&mut self, relation: RawRelation<'_>);
}

/// Element counts reported by an [`ExtractSource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Nodes read, including dense nodes.
    pub nodes: u64,
    /// Ways read.
    pub ways: u64,
    /// Relations read.
    pub relations: u64,
}

impl ScanSummary {
    /// Total elements read.
    #[must_use]
    pub fn objects(&self) -> u64 {
        self.nodes + self.ways + self.relations
    }
}

/// Something that can stream OSM elements into a visitor.
pub trait ExtractSource {
    /// Human-readable location for logs.
    fn describe(&self) -> String;

    /// Stream every element through `visitor`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the extract cannot be opened or decoded.
    fn scan(&self, visitor: &mut dyn ExtractVisitor) -> Result<ScanSummary, ExtractError>;
}

/// Statistics of a local backend run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    /// Nodes, ways and relations read.
    pub objects_scanned: u64,
    /// Nodes read.
    pub nodes: u64,
    /// Ways read.
    pub ways: u64,
    /// Relations read.
    pub relations: u64,
    /// Classified geometries kept after the coarse filter.
    pub points_retained: usize,
    /// Coarse cells in the acceptance filter.
    pub coarse_cells: usize,
    /// Non-empty fine index cells.
    pub grid_cells: usize,
}

/// Errors raised while fetching or scanning an extract.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The extract does not exist and fetching it is not permitted.
    #[error("OSM extract not found at {path}")]
    Missing {
        /// Expected location.
        path: Utf8PathBuf,
    },
    /// The extract could not be opened.
    #[cfg(feature = "extract-pbf")]
    #[error("failed to open OSM PBF file at {path}")]
    Open {
        /// Extract location.
        path: Utf8PathBuf,
        /// Decoder failure.
        #[source]
        source: osmpbf::Error,
    },
    /// The extract could not be decoded.
    #[cfg(feature = "extract-pbf")]
    #[error("failed to decode OSM PBF data at {path}")]
    Decode {
        /// Extract location.
        path: Utf8PathBuf,
        /// Decoder failure.
        #[source]
        source: osmpbf::Error,
    },
    /// A grid step derived from the radius was unusable.
    #[error("invalid grid for the search radius")]
    Grid(#[from] GridStepError),
    /// Downloading the extract failed.
    #[error("failed to download OSM extract from {url}")]
    Download {
        /// Source URL.
        url: String,
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// Writing the downloaded extract failed.
    #[error("failed to write OSM extract to {path}")]
    Write {
        /// Target location.
        path: Utf8PathBuf,
        /// I/O failure.
        #[source]
        source: io::Error,
    },
    /// A runtime for the download could not be started.
    #[error("failed to start download runtime")]
    Runtime(#[source] io::Error),
}
