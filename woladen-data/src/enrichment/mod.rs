//! Drives a backend over a station list.
//!
//! Responsibilities:
//! - Resolve which backend to use from a [`BackendChoice`].
//! - Enrich stations sequentially, in input order, logging progress.
//! - Aggregate per-run statistics into an [`EnrichmentSummary`].
//!
//! Boundaries:
//! - Reading stations and writing output documents belong to the caller.

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use thiserror::Error;
use woladen_core::{EnrichedStation, EnrichmentResult, Provenance, RuleTable, Station};

use crate::cache::{AmenityCache, CacheError};
use crate::extract::{ExtractError, ExtractSource, ExtractStats, LocalExtractBackend};
#[cfg(feature = "extract-pbf")]
use crate::extract::{HttpExtractDownloader, PbfExtract, fetch_extract_blocking};
use crate::overpass::{
    HttpOverpassConfig, HttpOverpassTransport, LookupStats, OverpassTransport, Pause,
    RemoteBackend, RemoteSettings, TransportBuildError,
};

mod progress;

pub use progress::{ProgressReporter, ProgressSettings};

/// Backend requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BackendChoice {
    /// Local extract when available, otherwise remote.
    #[default]
    Auto,
    /// Always query the remote service.
    Remote,
    /// Always scan the local extract.
    Local,
}

impl BackendChoice {
    /// Canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Remote => "overpass",
            Self::Local => "osm-pbf",
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown backend name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown amenity backend {0:?}; expected auto, overpass or osm-pbf")]
pub struct ParseBackendChoiceError(pub String);

impl FromStr for BackendChoice {
    type Err = ParseBackendChoiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "overpass" | "remote" => Ok(Self::Remote),
            "osm-pbf" | "local" => Ok(Self::Local),
            _ => Err(ParseBackendChoiceError(value.to_owned())),
        }
    }
}

/// Backend actually used for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackendKind {
    /// Remote Overpass lookups with a cache.
    #[serde(rename = "overpass")]
    Remote,
    /// Local OSM PBF extract.
    #[serde(rename = "osm-pbf")]
    Local,
}

impl BackendKind {
    /// Name used in summaries and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "overpass",
            Self::Local => "osm-pbf",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort an enrichment run.
#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// The cache could not be persisted.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// The extract was missing, could not be fetched or could not be read.
    #[error(transparent)]
    Extract(#[from] ExtractError),
    /// The HTTP client could not be built.
    #[error(transparent)]
    Transport(#[from] TransportBuildError),
    /// The local backend was requested but PBF support is not compiled in.
    #[error("the osm-pbf backend requires the `extract-pbf` feature")]
    LocalUnavailable,
}

/// A source of per-station results driven by [`enrich_stations`].
pub trait AmenityBackend {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Called once with the full station list before any lookup.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError`] when the backend cannot serve the run.
    fn prepare(&mut self, stations: &[Station]) -> Result<(), EnrichmentError>;

    /// Result for one station. Never fails; failures become provenance tags.
    fn enrich_station(&mut self, station: &Station) -> EnrichmentResult;

    /// Called once after the last station.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError`] when final bookkeeping fails.
    fn finish(&mut self) -> Result<BackendStats, EnrichmentError>;
}

/// Statistics reported by a backend at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Remote lookup counters; all zero for the local backend.
    pub lookup: LookupStats,
    /// Extract scan counters, for the local backend.
    pub extract: Option<ExtractStats>,
}

impl<T: OverpassTransport, P: Pause> AmenityBackend for RemoteBackend<T, P> {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn prepare(&mut self, _stations: &[Station]) -> Result<(), EnrichmentError> {
        Ok(())
    }

    fn enrich_station(&mut self, station: &Station) -> EnrichmentResult {
        Self::enrich_station(self, station)
    }

    fn finish(&mut self) -> Result<BackendStats, EnrichmentError> {
        Ok(BackendStats {
            lookup: Self::finish(self)?,
            extract: None,
        })
    }
}

impl<S: ExtractSource> AmenityBackend for LocalExtractBackend<S> {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn prepare(&mut self, stations: &[Station]) -> Result<(), EnrichmentError> {
        Self::prepare(self, stations)?;
        Ok(())
    }

    fn enrich_station(&mut self, station: &Station) -> EnrichmentResult {
        Self::enrich_station(self, station)
    }

    fn finish(&mut self) -> Result<BackendStats, EnrichmentError> {
        Ok(BackendStats {
            lookup: LookupStats::default(),
            extract: Some(self.stats()),
        })
    }
}

/// Run statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnrichmentSummary {
    /// Backend used.
    pub backend: BackendKind,
    /// Stations enriched.
    pub stations: usize,
    /// Stations with at least one amenity.
    pub stations_with_amenities: usize,
    /// Remote lookup counters.
    #[serde(flatten)]
    pub lookup: LookupStats,
    /// Extract scan counters.
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractStats>,
}

/// Enriched stations in input order plus the run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentRun {
    /// One entry per input station, same order.
    pub stations: Vec<EnrichedStation>,
    /// Run statistics.
    pub summary: EnrichmentSummary,
}

/// Enrich `stations` one after another with `backend`.
///
/// # Errors
///
/// Returns [`EnrichmentError`] when the backend cannot be prepared or
/// finished. Per-station lookup failures are reported through provenance.
pub fn enrich_stations<B: AmenityBackend + ?Sized>(
    backend: &mut B,
    stations: &[Station],
    progress: ProgressSettings,
) -> Result<EnrichmentRun, EnrichmentError> {
    backend.prepare(stations)?;
    let mut reporter = ProgressReporter::new(progress, stations.len());
    let mut tally = SourceTally::default();
    let mut enriched = Vec::with_capacity(stations.len());
    for station in stations {
        let result = backend.enrich_station(station);
        tally.record(result.source);
        enriched.push(EnrichedStation {
            station: station.clone(),
            result,
        });
        reporter.record(enriched.len(), || tally.to_string());
    }
    let stats = backend.finish()?;
    let summary = EnrichmentSummary {
        backend: backend.kind(),
        stations: enriched.len(),
        stations_with_amenities: enriched
            .iter()
            .filter(|entry| entry.result.total > 0)
            .count(),
        lookup: stats.lookup,
        extract: stats.extract,
    };
    info!(
        "amenity enrichment finished with {} backend: {} stations, {} with amenities",
        summary.backend, summary.stations, summary.stations_with_amenities
    );
    Ok(EnrichmentRun {
        stations: enriched,
        summary,
    })
}

#[derive(Debug, Default)]
struct SourceTally {
    live: usize,
    cache: usize,
    deferred: usize,
    error: usize,
    local: usize,
}

impl SourceTally {
    fn record(&mut self, source: Provenance) {
        match source {
            Provenance::Live => self.live += 1,
            Provenance::Cache => self.cache += 1,
            Provenance::Deferred => self.deferred += 1,
            Provenance::Error => self.error += 1,
            Provenance::OsmPbfBackend => self.local += 1,
        }
    }
}

impl fmt::Display for SourceTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.local > 0 {
            return write!(f, "osm-pbf={}", self.local);
        }
        write!(
            f,
            "live={} cache={} deferred={} error={}",
            self.live, self.cache, self.deferred, self.error
        )
    }
}

/// Everything needed to run enrichment end to end.
#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    /// Requested backend.
    pub backend: BackendChoice,
    /// Remote lookup parameters; `radius_m` is used by both backends.
    pub remote: RemoteSettings,
    /// Remote endpoint, timeout and user agent.
    pub http: HttpOverpassConfig,
    /// Cache file for the remote backend.
    pub cache_path: Utf8PathBuf,
    /// OSM extract for the local backend.
    pub extract_path: Utf8PathBuf,
    /// Where to fetch the extract from when it is missing.
    pub extract_url: Option<String>,
    /// Whether a missing extract may be downloaded.
    pub allow_extract_download: bool,
    /// Enrich at most this many stations; zero means all.
    pub max_stations: usize,
    /// Progress logging cadence.
    pub progress: ProgressSettings,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            remote: RemoteSettings::default(),
            http: HttpOverpassConfig::default(),
            cache_path: Utf8PathBuf::from("data/amenity_cache.json"),
            extract_path: Utf8PathBuf::from("data/osm/germany-latest.osm.pbf"),
            extract_url: None,
            allow_extract_download: false,
            max_stations: 0,
            progress: ProgressSettings::default(),
        }
    }
}

/// Decide which backend serves the run.
///
/// `Auto` picks the local backend only when PBF support is compiled in and
/// the extract exists; it never downloads. `Local` requires the extract, or
/// permission and a URL to fetch it.
///
/// # Errors
///
/// Returns [`EnrichmentError::LocalUnavailable`] or
/// [`ExtractError::Missing`] when `Local` cannot be honoured.
pub fn resolve_backend(settings: &EnrichmentSettings) -> Result<BackendKind, EnrichmentError> {
    let pbf_supported = cfg!(feature = "extract-pbf");
    let extract_present = extract_exists(&settings.extract_path);
    match settings.backend {
        BackendChoice::Remote => Ok(BackendKind::Remote),
        BackendChoice::Auto if pbf_supported && extract_present => Ok(BackendKind::Local),
        BackendChoice::Auto => Ok(BackendKind::Remote),
        BackendChoice::Local if !pbf_supported => Err(EnrichmentError::LocalUnavailable),
        BackendChoice::Local
            if extract_present
                || (settings.allow_extract_download && settings.extract_url.is_some()) =>
        {
            Ok(BackendKind::Local)
        }
        BackendChoice::Local => Err(ExtractError::Missing {
            path: settings.extract_path.clone(),
        }
        .into()),
    }
}

fn extract_exists(path: &Utf8Path) -> bool {
    woladen_fs::file_is_file(path).unwrap_or(false)
}

/// Apply the station cap.
#[must_use]
pub fn cap_stations(stations: &[Station], max_stations: usize) -> &[Station] {
    if max_stations == 0 {
        return stations;
    }
    stations.get(..max_stations).unwrap_or(stations)
}

/// Resolve the backend, build it and enrich `stations`.
///
/// `now` is the run's reference time for cache freshness.
///
/// # Errors
///
/// Returns [`EnrichmentError`] for configuration problems, extract failures
/// and cache write failures.
pub fn run_enrichment(
    rules: RuleTable,
    stations: &[Station],
    settings: &EnrichmentSettings,
    now: DateTime<Utc>,
) -> Result<EnrichmentRun, EnrichmentError> {
    let stations = cap_stations(stations, settings.max_stations);
    let kind = resolve_backend(settings)?;
    info!(
        "enriching {} stations with the {kind} backend (requested {})",
        stations.len(),
        settings.backend
    );
    match kind {
        BackendKind::Remote => {
            let cache = AmenityCache::load(settings.cache_path.clone())?;
            let transport = HttpOverpassTransport::with_config(settings.http.clone())?;
            let mut backend =
                RemoteBackend::new(rules, transport, cache, settings.remote.clone(), now);
            enrich_stations(&mut backend, stations, settings.progress)
        }
        BackendKind::Local => run_local(rules, stations, settings),
    }
}

#[cfg(feature = "extract-pbf")]
fn run_local(
    rules: RuleTable,
    stations: &[Station],
    settings: &EnrichmentSettings,
) -> Result<EnrichmentRun, EnrichmentError> {
    ensure_extract(settings)?;
    let source = PbfExtract::new(settings.extract_path.clone());
    let mut backend = LocalExtractBackend::new(rules, source, settings.remote.radius_m);
    enrich_stations(&mut backend, stations, settings.progress)
}

#[cfg(not(feature = "extract-pbf"))]
fn run_local(
    _rules: RuleTable,
    _stations: &[Station],
    _settings: &EnrichmentSettings,
) -> Result<EnrichmentRun, EnrichmentError> {
    Err(EnrichmentError::LocalUnavailable)
}

/// Download the extract when it is missing and downloading is permitted.
#[cfg(feature = "extract-pbf")]
fn ensure_extract(settings: &EnrichmentSettings) -> Result<(), EnrichmentError> {
    if extract_exists(&settings.extract_path) {
        return Ok(());
    }
    match (&settings.extract_url, settings.allow_extract_download) {
        (Some(url), true) => {
            let downloader = HttpExtractDownloader::new()?;
            fetch_extract_blocking(&downloader, url, &settings.extract_path)?;
            Ok(())
        }
        _ => Err(ExtractError::Missing {
            path: settings.extract_path.clone(),
        }
        .into()),
    }
}
