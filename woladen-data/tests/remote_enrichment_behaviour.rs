//! Behavioural tests for the remote backend's per-station policy.
//!
//! [`ScriptedTransport`] stands in for the Overpass service and
//! [`RecordingPause`] replaces sleeping.

use std::cell::RefCell;

use chrono::{DateTime, TimeZone, Utc};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use woladen_core::test_support::north_of;
use woladen_core::{EnrichmentResult, RuleTable, Station};
use woladen_data::cache::AmenityCache;
use woladen_data::overpass::test_support::{RecordingPause, ScriptedTransport};
use woladen_data::overpass::{LookupStats, RemoteBackend, RemoteSettings, TransportResponse};

#[derive(Default)]
struct RemoteWorld {
    station: RefCell<Option<Station>>,
    transport: RefCell<Option<ScriptedTransport>>,
    budget: RefCell<u32>,
    result: RefCell<Option<EnrichmentResult>>,
    stats: RefCell<Option<LookupStats>>,
}

#[fixture]
fn world() -> RemoteWorld {
    RemoteWorld::default()
}

fn run_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn enrich(world: &RemoteWorld, times: usize) {
    let station = world.station.borrow().clone().expect("station configured");
    let transport = world.transport.borrow();
    let transport = transport.as_ref().expect("service configured");
    let pause = RecordingPause::default();
    let settings = RemoteSettings {
        query_budget: *world.budget.borrow(),
        ..RemoteSettings::default()
    };
    let mut backend = RemoteBackend::with_pause(
        RuleTable::default(),
        transport,
        &pause,
        AmenityCache::empty("unused-cache.json"),
        settings,
        run_start(),
    );
    let mut last = None;
    for _ in 0..times {
        last = Some(backend.enrich_station(&station));
    }
    world.result.replace(last);
    world.stats.replace(Some(backend.stats()));
}

fn with_result<R>(world: &RemoteWorld, check: impl FnOnce(&EnrichmentResult) -> R) -> R {
    let result = world.result.borrow();
    check(result.as_ref().expect("station enriched"))
}

// --- Given steps ---

#[given("a station at 52.52, 13.405")]
fn given_station(world: &RemoteWorld) {
    let station = Station::new("berlin-mitte", 52.52, 13.405).expect("valid station");
    world.station.replace(Some(station));
}

#[given("an Overpass service returning a cafe 40 metres north")]
fn given_cafe_service(world: &RemoteWorld) {
    let station = world.station.borrow().clone().expect("station configured");
    let cafe = north_of(station.location(), 40.0);
    let body = format!(
        r#"{{"elements": [{{"type": "node", "id": 42, "lat": {}, "lon": {}, "tags": {{"amenity": "cafe", "name": "Ladecafé"}}}}]}}"#,
        cafe.y, cafe.x
    );
    world
        .transport
        .replace(Some(ScriptedTransport::with_body(&body)));
}

#[given("an Overpass service answering 503 to every request")]
fn given_unavailable_service(world: &RemoteWorld) {
    world.transport.replace(Some(ScriptedTransport::repeating(
        TransportResponse::new(503, b"busy".to_vec()),
    )));
}

#[given("a query budget of {budget}")]
fn given_budget(world: &RemoteWorld, budget: u32) {
    world.budget.replace(budget);
}

// --- When steps ---

#[when("the station is enriched")]
fn when_enriched(world: &RemoteWorld) {
    enrich(world, 1);
}

#[when("the station is enriched twice")]
fn when_enriched_twice(world: &RemoteWorld) {
    enrich(world, 2);
}

// --- Then steps ---

#[then("the result source is {source}")]
fn then_source(world: &RemoteWorld, source: String) {
    let actual = with_result(world, |result| result.source.as_str().to_owned());
    assert_eq!(actual, source.trim_matches('"'));
}

#[then("the {category} count is {count}")]
fn then_category_count(world: &RemoteWorld, category: String, count: u32) {
    let actual = with_result(world, |result| result.counts.get(&category));
    assert_eq!(actual, count, "unexpected {category} count");
}

#[then("the total is {total}")]
fn then_total(world: &RemoteWorld, total: u32) {
    assert_eq!(with_result(world, |result| result.total), total);
}

#[then("the first example is {distance} metres away")]
fn then_first_example(world: &RemoteWorld, distance: u32) {
    let first = with_result(world, |result| {
        result.examples.first().and_then(|example| example.distance_m)
    });
    assert_eq!(first, Some(distance));
}

#[then("the service received {count} requests")]
fn then_requests(world: &RemoteWorld, count: usize) {
    let transport = world.transport.borrow();
    assert_eq!(transport.as_ref().expect("service configured").calls(), count);
}

#[then("{count} lookup error is recorded")]
fn then_lookup_errors(world: &RemoteWorld, count: u32) {
    let stats = world.stats.borrow();
    assert_eq!(stats.as_ref().expect("stats recorded").lookup_errors, count);
}

#[scenario(path = "tests/features/remote_enrichment.feature", index = 0)]
fn scenario_live_cafe(world: RemoteWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/remote_enrichment.feature", index = 1)]
fn scenario_budget_exhausted(world: RemoteWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/remote_enrichment.feature", index = 2)]
fn scenario_service_unavailable(world: RemoteWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/remote_enrichment.feature", index = 3)]
fn scenario_cache_reuse(world: RemoteWorld) {
    let _ = world;
}
