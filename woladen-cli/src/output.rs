//! Output documents: the enriched GeoJSON and the run summary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use woladen_core::{EnrichedStation, RuleTable};
use woladen_data::{EnrichmentRun, EnrichmentSummary};

use crate::stations::StationRecord;

/// Build the `FeatureCollection` for `run`.
///
/// `records` are the input rows; the run covers a prefix of them when a
/// station cap applied. Features are ordered by `amenities_total`
/// descending, ties keeping input order.
pub(crate) fn feature_collection(
    records: &[StationRecord],
    run: &EnrichmentRun,
    rules: &RuleTable,
    generated_at: DateTime<Utc>,
) -> Value {
    let mut enriched: Vec<(&StationRecord, &EnrichedStation)> =
        records.iter().zip(&run.stations).collect();
    enriched.sort_by(|(_, a), (_, b)| b.result.total.cmp(&a.result.total));
    let features: Vec<Value> = enriched
        .into_iter()
        .map(|(record, entry)| station_feature(record, entry, rules))
        .collect();
    json!({
        "type": "FeatureCollection",
        "generated_at": generated_at,
        "features": features,
    })
}

fn station_feature(record: &StationRecord, entry: &EnrichedStation, rules: &RuleTable) -> Value {
    let mut properties: Map<String, Value> = record.properties.clone();
    let result = &entry.result;
    properties.insert("station_id".to_owned(), json!(entry.station.id()));
    for category in rules.categories() {
        properties.insert(
            format!("amenity_{category}"),
            json!(result.counts.get(category)),
        );
    }
    properties.insert("amenities_total".to_owned(), json!(result.total));
    properties.insert("amenities_source".to_owned(), json!(result.source));
    properties.insert("amenity_examples".to_owned(), json!(result.examples));
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": [entry.station.lon(), entry.station.lat()],
        },
        "properties": properties,
    })
}

/// Start and end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct RunWindow {
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) finished_at: DateTime<Utc>,
}

/// Parameters the run was invoked with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RunParams {
    pub(crate) backend: String,
    pub(crate) radius_m: u32,
    pub(crate) query_budget: u32,
    pub(crate) refresh_days: u32,
    pub(crate) overpass_delay_ms: u64,
    pub(crate) force_refresh: bool,
    pub(crate) max_stations: usize,
}

/// Station counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct RunRecords {
    pub(crate) stations_total: usize,
    pub(crate) stations_enriched: usize,
    pub(crate) stations_with_amenities: usize,
}

/// The summary document written next to the GeoJSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RunSummary {
    pub(crate) run: RunWindow,
    pub(crate) params: RunParams,
    pub(crate) records: RunRecords,
    pub(crate) amenity_lookup: EnrichmentSummary,
}

impl RunSummary {
    pub(crate) fn new(
        window: RunWindow,
        params: RunParams,
        stations_total: usize,
        summary: EnrichmentSummary,
    ) -> Self {
        Self {
            run: window,
            params,
            records: RunRecords {
                stations_total,
                stations_enriched: summary.stations,
                stations_with_amenities: summary.stations_with_amenities,
            },
            amenity_lookup: summary,
        }
    }
}
