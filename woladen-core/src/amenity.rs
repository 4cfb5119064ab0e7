//! Per-station amenity tallies and ranked examples.
//!
//! [`AmenityTally`] is shared by every lookup backend: it receives classified
//! geometries one at a time, counts each `(kind, id, category)` once, keeps a
//! single presentation example per key and finally ranks the examples.

use std::{cmp::Ordering, collections::BTreeMap, collections::HashSet, fmt, str::FromStr};

use geo::Coord;
use thiserror::Error;

use crate::{RuleTable, distance::rounded_distance_m};

/// Maximum number of examples kept per station.
pub const MAX_EXAMPLES: usize = 12;

/// OpenStreetMap element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum ElementKind {
    /// A point.
    Node,
    /// An ordered list of nodes.
    Way,
    /// A group of members.
    Relation,
}

impl ElementKind {
    /// Lowercase wire name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown element kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown OSM element kind {0:?}")]
pub struct ParseElementKindError(pub String);

impl FromStr for ElementKind {
    type Err = ParseElementKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "node" => Ok(Self::Node),
            "way" => Ok(Self::Way),
            "relation" => Ok(Self::Relation),
            other => Err(ParseElementKindError(other.to_owned())),
        }
    }
}

/// Stable identity of a geometry: its kind plus its id within that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementRef {
    /// Element kind.
    pub kind: ElementKind,
    /// Identifier, unique within `kind`.
    pub id: i64,
}

impl ElementRef {
    /// Construct an element reference.
    #[must_use]
    pub const fn new(kind: ElementKind, id: i64) -> Self {
        Self { kind, id }
    }
}

/// Presentation-ready example of a nearby amenity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AmenityExample {
    /// Matched category.
    pub category: String,
    /// `name` tag, when present.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    /// `opening_hours` tag, when present.
    #[cfg_attr(feature = "serde", serde(default))]
    pub opening_hours: Option<String>,
    /// Rounded distance from the station, when the location is known.
    #[cfg_attr(feature = "serde", serde(default))]
    pub distance_m: Option<u32>,
    /// Latitude of the amenity, when known.
    #[cfg_attr(feature = "serde", serde(default))]
    pub lat: Option<f64>,
    /// Longitude of the amenity, when known.
    #[cfg_attr(feature = "serde", serde(default))]
    pub lon: Option<f64>,
}

impl AmenityExample {
    fn folded_name(&self) -> String {
        self.name.as_deref().unwrap_or_default().to_lowercase()
    }

    /// Ordering used for ranking: distance (unknown last), category, then
    /// case-insensitive name.
    #[must_use]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        let distance_key = |example: &Self| (example.distance_m.is_none(), example.distance_m);
        distance_key(self)
            .cmp(&distance_key(other))
            .then_with(|| self.category.cmp(&other.category))
            .then_with(|| self.folded_name().cmp(&other.folded_name()))
    }
}

/// Sort examples by [`AmenityExample::rank_cmp`] and keep the first
/// [`MAX_EXAMPLES`]. The sort is stable.
pub fn rank_examples(examples: &mut Vec<AmenityExample>) {
    examples.sort_by(AmenityExample::rank_cmp);
    examples.truncate(MAX_EXAMPLES);
}

/// Per-category amenity counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct AmenityCounts(BTreeMap<String, u32>);

impl AmenityCounts {
    /// Zero counts for every category in `rules`.
    #[must_use]
    pub fn zeroed(rules: &RuleTable) -> Self {
        Self(
            rules
                .categories()
                .map(|category| (category.to_owned(), 0))
                .collect(),
        )
    }

    /// Re-key `self` onto `rules`: missing categories become zero and
    /// categories no longer configured are dropped.
    #[must_use]
    pub fn projected(&self, rules: &RuleTable) -> Self {
        Self(
            rules
                .categories()
                .map(|category| (category.to_owned(), self.get(category)))
                .collect(),
        )
    }

    /// Add one to `category`.
    pub fn increment(&mut self, category: &str) {
        match self.0.get_mut(category) {
            Some(count) => *count = count.saturating_add(1),
            None => {
                self.0.insert(category.to_owned(), 1);
            }
        }
    }

    /// Count for `category`, zero when absent.
    #[must_use]
    pub fn get(&self, category: &str) -> u32 {
        self.0.get(category).copied().unwrap_or_default()
    }

    /// Sum over all categories.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.0
            .values()
            .fold(0_u32, |acc, count| acc.saturating_add(*count))
    }

    /// Iterate over `(category, count)` in category order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(category, count)| (category.as_str(), *count))
    }
}

/// Counts and ranked examples produced for one station.
#[derive(Debug, Clone, PartialEq)]
pub struct AmenityLookup {
    /// Counts for every configured category.
    pub counts: AmenityCounts,
    /// At most [`MAX_EXAMPLES`] ranked examples.
    pub examples: Vec<AmenityExample>,
}

impl AmenityLookup {
    /// A lookup with zero counts and no examples.
    #[must_use]
    pub fn empty(rules: &RuleTable) -> Self {
        Self {
            counts: AmenityCounts::zeroed(rules),
            examples: Vec::new(),
        }
    }
}

/// Presentation attributes of a matched geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AmenityDetails<'a> {
    /// `name` tag.
    pub name: Option<&'a str>,
    /// `opening_hours` tag.
    pub opening_hours: Option<&'a str>,
    /// Point or centroid of the geometry, when known.
    pub location: Option<Coord<f64>>,
}

/// Accumulates matched geometries for a single station.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use woladen_core::{AmenityDetails, AmenityTally, ElementKind, ElementRef, RuleTable};
///
/// let rules = RuleTable::default();
/// let station = Coord { x: 13.405, y: 52.52 };
/// let mut tally = AmenityTally::new(&rules, station);
/// let cafe = ElementRef::new(ElementKind::Node, 7);
/// let details = AmenityDetails { name: Some("Café X"), ..AmenityDetails::default() };
/// tally.record(cafe, &["cafe"], details);
/// tally.record(cafe, &["cafe"], details);
/// let lookup = tally.finish();
/// assert_eq!(lookup.counts.get("cafe"), 1);
/// assert_eq!(lookup.examples.len(), 1);
/// ```
#[derive(Debug)]
pub struct AmenityTally<'r> {
    rules: &'r RuleTable,
    origin: Coord<f64>,
    seen: HashSet<(ElementRef, String)>,
    counts: AmenityCounts,
    examples: Vec<AmenityExample>,
}

impl<'r> AmenityTally<'r> {
    /// Start a tally for a station at `origin`.
    #[must_use]
    pub fn new(rules: &'r RuleTable, origin: Coord<f64>) -> Self {
        Self {
            rules,
            origin,
            seen: HashSet::new(),
            counts: AmenityCounts::zeroed(rules),
            examples: Vec::new(),
        }
    }

    /// Record a geometry matched to `categories`.
    ///
    /// Each `(element, category)` pair is counted and exemplified at most once;
    /// categories not present in the rule table are ignored.
    pub fn record(&mut self, element: ElementRef, categories: &[&str], details: AmenityDetails<'_>) {
        for category in categories {
            if !self.rules.contains(category) {
                continue;
            }
            if !self.seen.insert((element, (*category).to_owned())) {
                continue;
            }
            self.counts.increment(category);
            let example = self.example(category, details);
            self.examples.push(example);
        }
    }

    fn example(&self, category: &str, details: AmenityDetails<'_>) -> AmenityExample {
        AmenityExample {
            category: category.to_owned(),
            name: details.name.map(str::to_owned),
            opening_hours: details.opening_hours.map(str::to_owned),
            distance_m: details
                .location
                .map(|location| rounded_distance_m(self.origin, location)),
            lat: details.location.map(|location| location.y),
            lon: details.location.map(|location| location.x),
        }
    }

    /// Rank the examples and return the final lookup.
    #[must_use]
    pub fn finish(self) -> AmenityLookup {
        let mut examples = self.examples;
        rank_examples(&mut examples);
        AmenityLookup {
            counts: self.counts,
            examples,
        }
    }
}
