//! Local backend: one pass over an extract, then in-memory radius queries.

use log::info;
use woladen_core::{
    AmenityDetails, AmenityTally, EnrichmentResult, Provenance, RuleTable, Station,
};

use super::collector::AmenityCollector;
use super::{AmenityPoint, CoarseFilter, ExtractError, ExtractSource, ExtractStats, FineIndex};

/// Answers station lookups from a scanned OSM extract.
#[derive(Debug)]
pub struct LocalExtractBackend<S> {
    rules: RuleTable,
    source: S,
    radius_m: u32,
    points: Vec<AmenityPoint>,
    index: FineIndex,
    stats: ExtractStats,
}

impl<S: ExtractSource> LocalExtractBackend<S> {
    /// Backend reading `source` for a search radius of `radius_m`.
    #[must_use]
    pub fn new(rules: RuleTable, source: S, radius_m: u32) -> Self {
        Self {
            rules,
            source,
            radius_m,
            points: Vec::new(),
            index: FineIndex::default(),
            stats: ExtractStats::default(),
        }
    }

    /// Scan the extract once and index the geometries near `stations`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the extract cannot be read.
    pub fn prepare(&mut self, stations: &[Station]) -> Result<ExtractStats, ExtractError> {
        let radius = f64::from(self.radius_m);
        let filter = CoarseFilter::for_stations(stations, radius);
        info!(
            "scanning {} for {} stations ({} coarse cells)",
            self.source.describe(),
            stations.len(),
            filter.len()
        );
        let mut collector = AmenityCollector::new(&self.rules, &filter);
        let summary = self.source.scan(&mut collector)?;
        self.points = collector.into_points();
        self.index = FineIndex::build(&self.points, stations, radius)?;
        self.stats = ExtractStats {
            objects_scanned: summary.objects(),
            nodes: summary.nodes,
            ways: summary.ways,
            relations: summary.relations,
            points_retained: self.points.len(),
            coarse_cells: filter.len(),
            grid_cells: self.index.cell_count(),
        };
        info!(
            "extract scan complete: {} objects, {} amenity points retained in {} cells",
            self.stats.objects_scanned, self.stats.points_retained, self.stats.grid_cells
        );
        Ok(self.stats)
    }

    /// Result for one station. Before [`Self::prepare`] every count is zero.
    #[must_use]
    pub fn enrich_station(&self, station: &Station) -> EnrichmentResult {
        let origin = station.location();
        let mut tally = AmenityTally::new(&self.rules, origin);
        for position in self.index.within(&self.points, origin, f64::from(self.radius_m)) {
            let Some(point) = self.points.get(position) else {
                continue;
            };
            let categories: Vec<&str> = point.categories.iter().map(String::as_str).collect();
            let details = AmenityDetails {
                name: point.name.as_deref(),
                opening_hours: point.opening_hours.as_deref(),
                location: Some(point.location),
            };
            tally.record(point.element, &categories, details);
        }
        EnrichmentResult::from_lookup(tally.finish(), Provenance::OsmPbfBackend)
    }

    /// Prepare for `stations` and enrich each of them in order.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the extract cannot be read.
    pub fn enrich(&mut self, stations: &[Station]) -> Result<Vec<EnrichmentResult>, ExtractError> {
        self.prepare(stations)?;
        Ok(stations
            .iter()
            .map(|station| self.enrich_station(station))
            .collect())
    }

    /// Statistics of the last [`Self::prepare`].
    #[must_use]
    pub fn stats(&self) -> ExtractStats {
        self.stats
    }
}
