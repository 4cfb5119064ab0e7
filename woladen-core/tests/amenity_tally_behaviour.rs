//! Behavioural tests for classifying and tallying amenities.

use std::cell::RefCell;

use geo::Coord;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use woladen_core::distance::METRES_PER_DEGREE;
use woladen_core::{
    AmenityDetails, AmenityLookup, AmenityTally, ElementKind, ElementRef, RuleTable, Tags,
};

const ORIGIN: Coord<f64> = Coord { x: 13.405, y: 52.52 };

fn north_of(origin: Coord<f64>, metres: f64) -> Coord<f64> {
    Coord {
        x: origin.x,
        y: origin.y + metres / METRES_PER_DEGREE,
    }
}

#[fixture]
fn rules() -> RefCell<Option<RuleTable>> {
    RefCell::new(None)
}

#[fixture]
fn lookup() -> RefCell<Option<AmenityLookup>> {
    RefCell::new(None)
}

fn record_tagged(
    rules: &RefCell<Option<RuleTable>>,
    lookup: &RefCell<Option<AmenityLookup>>,
    element: ElementRef,
    tags: &Tags,
    repeats: usize,
) {
    let rules = rules.borrow();
    let table = rules.as_ref().expect("rules configured");
    let categories = table.classify(tags);
    let mut tally = AmenityTally::new(table, ORIGIN);
    for _ in 0..repeats {
        tally.record(element, &categories, AmenityDetails::default());
    }
    *lookup.borrow_mut() = Some(tally.finish());
}

#[given("the default amenity rules")]
fn given_default_rules(#[from(rules)] rules: &RefCell<Option<RuleTable>>) {
    *rules.borrow_mut() = Some(RuleTable::default());
}

#[when("a way tagged amenity=cafe and shop=bakery is recorded twice")]
fn when_multi_category_way(
    #[from(rules)] rules: &RefCell<Option<RuleTable>>,
    #[from(lookup)] lookup: &RefCell<Option<AmenityLookup>>,
) {
    let tags = Tags::from_pairs([("amenity", "cafe"), ("shop", "bakery")]);
    let element = ElementRef::new(ElementKind::Way, 9);
    record_tagged(rules, lookup, element, &tags, 2);
}

#[when("a node tagged amenity=casino is recorded")]
fn when_unconfigured_node(
    #[from(rules)] rules: &RefCell<Option<RuleTable>>,
    #[from(lookup)] lookup: &RefCell<Option<AmenityLookup>>,
) {
    let tags = Tags::from_pairs([("amenity", "casino")]);
    record_tagged(rules, lookup, ElementRef::new(ElementKind::Node, 1), &tags, 1);
}

#[when("twenty unnamed cafes are recorded at increasing distances")]
fn when_many_cafes(
    #[from(rules)] rules: &RefCell<Option<RuleTable>>,
    #[from(lookup)] lookup: &RefCell<Option<AmenityLookup>>,
) {
    let rules = rules.borrow();
    let table = rules.as_ref().expect("rules configured");
    let mut tally = AmenityTally::new(table, ORIGIN);
    // Record far-to-near so ranking has work to do.
    for id in (0..20_i64).rev() {
        let location = north_of(ORIGIN, 25.0 * (id as f64 + 1.0));
        let details = AmenityDetails {
            location: Some(location),
            ..AmenityDetails::default()
        };
        tally.record(ElementRef::new(ElementKind::Node, id), &["cafe"], details);
    }
    *lookup.borrow_mut() = Some(tally.finish());
}

#[then("the cafe count is 1")]
fn then_cafe_once(#[from(lookup)] lookup: &RefCell<Option<AmenityLookup>>) {
    let lookup = lookup.borrow();
    let counts = &lookup.as_ref().expect("lookup recorded").counts;
    assert_eq!(counts.get("cafe"), 1, "expected a single cafe");
}

#[then("the bakery count is 1")]
fn then_bakery_once(#[from(lookup)] lookup: &RefCell<Option<AmenityLookup>>) {
    let lookup = lookup.borrow();
    let counts = &lookup.as_ref().expect("lookup recorded").counts;
    assert_eq!(counts.get("bakery"), 1, "expected a single bakery");
}

#[then("the total is 2")]
fn then_total_two(#[from(lookup)] lookup: &RefCell<Option<AmenityLookup>>) {
    let lookup = lookup.borrow();
    assert_eq!(lookup.as_ref().expect("lookup recorded").counts.total(), 2);
}

#[then("the total is 0")]
fn then_total_zero(#[from(lookup)] lookup: &RefCell<Option<AmenityLookup>>) {
    let lookup = lookup.borrow();
    assert_eq!(lookup.as_ref().expect("lookup recorded").counts.total(), 0);
}

#[then("12 examples are kept")]
fn then_capped(#[from(lookup)] lookup: &RefCell<Option<AmenityLookup>>) {
    let lookup = lookup.borrow();
    assert_eq!(lookup.as_ref().expect("lookup recorded").examples.len(), 12);
}

#[then("no examples are kept")]
fn then_no_examples(#[from(lookup)] lookup: &RefCell<Option<AmenityLookup>>) {
    let lookup = lookup.borrow();
    assert!(lookup.as_ref().expect("lookup recorded").examples.is_empty());
}

#[then("the examples are ordered nearest first")]
fn then_nearest_first(#[from(lookup)] lookup: &RefCell<Option<AmenityLookup>>) {
    let lookup = lookup.borrow();
    let distances: Vec<u32> = lookup
        .as_ref()
        .expect("lookup recorded")
        .examples
        .iter()
        .filter_map(|example| example.distance_m)
        .collect();
    assert_eq!(distances.len(), 12, "every example has a distance");
    assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(distances.first().copied(), Some(25));
}

#[scenario(path = "tests/features/amenity_tally.feature", index = 0)]
fn scenario_multi_category(
    rules: RefCell<Option<RuleTable>>,
    lookup: RefCell<Option<AmenityLookup>>,
) {
    let _ = (rules, lookup);
}

#[scenario(path = "tests/features/amenity_tally.feature", index = 1)]
fn scenario_ranked_examples(
    rules: RefCell<Option<RuleTable>>,
    lookup: RefCell<Option<AmenityLookup>>,
) {
    let _ = (rules, lookup);
}

#[scenario(path = "tests/features/amenity_tally.feature", index = 2)]
fn scenario_unconfigured_tags(
    rules: RefCell<Option<RuleTable>>,
    lookup: RefCell<Option<AmenityLookup>>,
) {
    let _ = (rules, lookup);
}
