//! Tests for the GeoJSON and summary documents.

use super::helpers::cafe_result;
use crate::output::{RunParams, RunSummary, RunWindow, feature_collection};
use crate::stations::StationRecord;
use chrono::{TimeZone, Utc};
use rstest::rstest;
use serde_json::{Map, json};
use woladen_core::{EnrichedStation, RuleTable, Station};
use woladen_data::{BackendKind, EnrichmentRun, EnrichmentSummary, LookupStats};

fn record(id: &str, lat: f64, lon: f64) -> StationRecord {
    let mut properties = Map::new();
    properties.insert("operator".to_owned(), json!(format!("op-{id}")));
    properties.insert("amenities_total".to_owned(), json!("stale"));
    StationRecord {
        station_id: id.to_owned(),
        lat,
        lon,
        properties,
    }
}

fn run_with(rules: &RuleTable, records: &[StationRecord], cafes: &[u32]) -> EnrichmentRun {
    let stations: Vec<EnrichedStation> = records
        .iter()
        .zip(cafes)
        .map(|(record, count)| EnrichedStation {
            station: Station::new(record.station_id.clone(), record.lat, record.lon)
                .expect("valid station"),
            result: cafe_result(rules, *count),
        })
        .collect();
    EnrichmentRun {
        summary: EnrichmentSummary {
            backend: BackendKind::Local,
            stations: stations.len(),
            stations_with_amenities: 0,
            lookup: LookupStats::default(),
            extract: None,
        },
        stations,
    }
}

#[rstest]
fn features_are_sorted_by_total_with_stable_ties() {
    let rules = RuleTable::default();
    let records = vec![
        record("a", 52.0, 13.0),
        record("b", 52.1, 13.1),
        record("c", 52.2, 13.2),
        record("d", 52.3, 13.3),
    ];
    let run = run_with(&rules, &records, &[1, 3, 0, 1]);
    let generated_at = Utc
        .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp");

    let collection = feature_collection(&records, &run, &rules, generated_at);

    assert_eq!(collection["type"], "FeatureCollection");
    assert_eq!(collection["generated_at"], "2026-03-01T12:00:00Z");
    let ids: Vec<&str> = collection["features"]
        .as_array()
        .expect("features array")
        .iter()
        .filter_map(|feature| feature["properties"]["station_id"].as_str())
        .collect();
    assert_eq!(ids, vec!["b", "a", "d", "c"]);
}

#[rstest]
fn feature_properties_carry_counts_and_passthrough_fields() {
    let rules = RuleTable::default();
    let records = vec![record("a", 52.5, 13.4)];
    let run = run_with(&rules, &records, &[2]);

    let collection = feature_collection(&records, &run, &rules, Utc::now());
    let feature = &collection["features"][0];

    assert_eq!(feature["geometry"]["type"], "Point");
    assert_eq!(feature["geometry"]["coordinates"], json!([13.4, 52.5]));
    let properties = &feature["properties"];
    assert_eq!(properties["operator"], "op-a");
    assert_eq!(properties["amenities_total"], 2);
    assert_eq!(properties["amenities_source"], "live");
    assert_eq!(properties["amenity_cafe"], 2);
    assert_eq!(properties["amenity_pharmacy"], 0);
    assert_eq!(properties["amenity_examples"], json!([]));
    let amenity_keys = properties
        .as_object()
        .expect("properties object")
        .keys()
        .filter(|key| key.starts_with("amenity_") && key.as_str() != "amenity_examples")
        .count();
    assert_eq!(amenity_keys, rules.categories().count());
}

#[rstest]
fn capped_runs_emit_only_enriched_stations() {
    let rules = RuleTable::default();
    let records = vec![record("a", 52.0, 13.0), record("b", 52.1, 13.1)];
    let run = run_with(&rules, &records[..1], &[0]);

    let collection = feature_collection(&records, &run, &rules, Utc::now());

    assert_eq!(collection["features"].as_array().map(Vec::len), Some(1));
}

#[rstest]
fn summaries_group_run_params_records_and_lookup() {
    let at = Utc
        .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp");
    let summary = RunSummary::new(
        RunWindow {
            started_at: at,
            finished_at: at,
        },
        RunParams {
            backend: "auto".to_owned(),
            radius_m: 100,
            query_budget: 500,
            refresh_days: 30,
            overpass_delay_ms: 250,
            force_refresh: false,
            max_stations: 0,
        },
        5,
        EnrichmentSummary {
            backend: BackendKind::Remote,
            stations: 4,
            stations_with_amenities: 2,
            lookup: LookupStats {
                cache_hits: 3,
                ..LookupStats::default()
            },
            extract: None,
        },
    );

    let json = serde_json::to_value(&summary).expect("serialise summary");

    assert_eq!(json["run"]["started_at"], "2026-03-01T12:00:00Z");
    assert_eq!(json["params"]["query_budget"], 500);
    assert_eq!(json["records"]["stations_total"], 5);
    assert_eq!(json["records"]["stations_enriched"], 4);
    assert_eq!(json["records"]["stations_with_amenities"], 2);
    assert_eq!(json["amenity_lookup"]["backend"], "overpass");
    assert_eq!(json["amenity_lookup"]["cache_hits"], 3);
}
