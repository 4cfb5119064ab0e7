//! Test helpers: temporary station lists and a scripted enrichment runner.

use std::cell::RefCell;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use woladen_core::{
    AmenityCounts, AmenityLookup, EnrichedStation, EnrichmentResult, Provenance, RuleTable,
    Station,
};
use woladen_data::enrichment::cap_stations;
use woladen_data::{
    BackendKind, EnrichmentError, EnrichmentRun, EnrichmentSettings, EnrichmentSummary,
    LookupStats,
};

use crate::enrich::EnrichmentRunner;

pub(super) const THREE_STATIONS: &str = r#"[
    {"station_id": "a", "lat": 52.52, "lon": 13.405, "operator": "Ionity"},
    {"station_id": "b", "lat": 53.55, "lon": 10.0, "operator": "EnBW"},
    {"id": "c", "lat": 48.137, "lon": 11.575}
]"#;

/// A temporary workspace with input and output paths.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub(super) fn stations(&self) -> Utf8PathBuf {
        self.path("stations.json")
    }

    pub(super) fn output(&self) -> Utf8PathBuf {
        self.path("out/chargers.geojson")
    }

    pub(super) fn summary(&self) -> Utf8PathBuf {
        self.path("out/summary.json")
    }

    pub(super) fn write_stations(&self, contents: &str) -> Utf8PathBuf {
        let path = self.stations();
        write_utf8(&path, contents.as_bytes());
        path
    }
}

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    std::fs::write(path.as_std_path(), contents).expect("write fixture");
}

pub(super) fn read_json(path: &Utf8Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path.as_std_path()).expect("read output");
    serde_json::from_str(&text).expect("output is JSON")
}

/// Runner that reports a fixed number of cafes per station index.
#[derive(Debug, Default)]
pub(super) struct ScriptedRunner {
    cafes: Vec<u32>,
    seen: RefCell<Option<EnrichmentSettings>>,
}

impl ScriptedRunner {
    pub(super) fn new(cafes: &[u32]) -> Self {
        Self {
            cafes: cafes.to_vec(),
            seen: RefCell::new(None),
        }
    }

    pub(super) fn settings(&self) -> Option<EnrichmentSettings> {
        self.seen.borrow().clone()
    }
}

impl EnrichmentRunner for ScriptedRunner {
    fn run(
        &self,
        rules: RuleTable,
        stations: &[Station],
        settings: &EnrichmentSettings,
        _now: DateTime<Utc>,
    ) -> Result<EnrichmentRun, EnrichmentError> {
        self.seen.replace(Some(settings.clone()));
        let stations = cap_stations(stations, settings.max_stations);
        let enriched: Vec<EnrichedStation> = stations
            .iter()
            .enumerate()
            .map(|(index, station)| EnrichedStation {
                station: station.clone(),
                result: cafe_result(&rules, self.cafes.get(index).copied().unwrap_or(0)),
            })
            .collect();
        let stations_with_amenities = enriched
            .iter()
            .filter(|entry| entry.result.total > 0)
            .count();
        Ok(EnrichmentRun {
            summary: EnrichmentSummary {
                backend: BackendKind::Remote,
                stations: enriched.len(),
                stations_with_amenities,
                lookup: LookupStats {
                    queries_used: u32::try_from(enriched.len()).expect("small run"),
                    ..LookupStats::default()
                },
                extract: None,
            },
            stations: enriched,
        })
    }
}

pub(super) fn cafe_result(rules: &RuleTable, cafes: u32) -> EnrichmentResult {
    let mut counts = AmenityCounts::zeroed(rules);
    for _ in 0..cafes {
        counts.increment("cafe");
    }
    EnrichmentResult::from_lookup(
        AmenityLookup {
            counts,
            examples: Vec::new(),
        },
        Provenance::Live,
    )
}
