//! First-phase filtering: classify, then keep only geometries in a coarse
//! cell that some station's search box touches.

use std::collections::HashSet;

use geo::Coord;
use woladen_core::{CoverageBox, ElementKind, ElementRef, GridCell, GridStep, RuleTable, Station};

use super::{ExtractVisitor, RawNode, RawRelation, RawWay};

/// Coarse acceptance grid: 0.02° of latitude by 0.03° of longitude.
pub const COARSE_STEP: GridStep = GridStep::COARSE;

/// A classified geometry retained for the fine index.
#[derive(Debug, Clone, PartialEq)]
pub struct AmenityPoint {
    /// Identity used for deduplication.
    pub element: ElementRef,
    /// Node position or way centroid.
    pub location: Coord<f64>,
    /// Matched categories in rule order.
    pub categories: Vec<String>,
    /// `name` tag.
    pub name: Option<String>,
    /// `opening_hours` tag.
    pub opening_hours: Option<String>,
}

/// Union of the coarse cells touched by every station's search box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoarseFilter {
    cells: HashSet<GridCell>,
}

impl CoarseFilter {
    /// Filter for `stations` searched with `radius_m`.
    #[must_use]
    pub fn for_stations(stations: &[Station], radius_m: f64) -> Self {
        let cells = stations
            .iter()
            .flat_map(|station| CoverageBox::around(station.location(), radius_m).cells(COARSE_STEP))
            .collect();
        Self { cells }
    }

    /// Whether `location` lies in an accepted cell.
    #[must_use]
    pub fn accepts(&self, location: Coord<f64>) -> bool {
        self.cells
            .contains(&GridCell::containing(location, COARSE_STEP))
    }

    /// Number of accepted cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Visitor that collects [`AmenityPoint`]s.
#[derive(Debug)]
pub(super) struct AmenityCollector<'a> {
    rules: &'a RuleTable,
    filter: &'a CoarseFilter,
    points: Vec<AmenityPoint>,
}

impl<'a> AmenityCollector<'a> {
    pub(super) fn new(rules: &'a RuleTable, filter: &'a CoarseFilter) -> Self {
        Self {
            rules,
            filter,
            points: Vec::new(),
        }
    }

    pub(super) fn into_points(self) -> Vec<AmenityPoint> {
        self.points
    }

    fn retain(
        &mut self,
        element: ElementRef,
        location: Coord<f64>,
        categories: &[&str],
        name: Option<&str>,
        opening_hours: Option<&str>,
    ) {
        if !self.filter.accepts(location) {
            return;
        }
        self.points.push(AmenityPoint {
            element,
            location,
            categories: categories.iter().map(|category| (*category).to_owned()).collect(),
            name: name.map(str::to_owned),
            opening_hours: opening_hours.map(str::to_owned),
        });
    }
}

impl ExtractVisitor for AmenityCollector<'_> {
    fn visit_node(&mut self, node: RawNode<'_>) {
        let categories = self.rules.classify_pairs(node.tags.iter().copied());
        if categories.is_empty() {
            return;
        }
        self.retain(
            ElementRef::new(ElementKind::Node, node.id),
            node.location,
            &categories,
            non_blank(node.tags, "name"),
            non_blank(node.tags, "opening_hours"),
        );
    }

    fn wants_way(&mut self, _id: i64, tags: &[(&str, &str)]) -> bool {
        !self.rules.classify_pairs(tags.iter().copied()).is_empty()
    }

    fn visit_way(&mut self, way: RawWay<'_>) {
        let categories = self.rules.classify(way.tags);
        if categories.is_empty() {
            return;
        }
        let Some(location) = centroid(way.nodes) else {
            return;
        };
        self.retain(
            ElementRef::new(ElementKind::Way, way.id),
            location,
            &categories,
            way.tags.non_blank("name"),
            way.tags.non_blank("opening_hours"),
        );
    }

    fn visit_relation(&mut self, _relation: RawRelation<'_>) {}
}

/// Arithmetic mean of `nodes`, or `None` when empty.
fn centroid(nodes: &[Coord<f64>]) -> Option<Coord<f64>> {
    if nodes.is_empty() {
        return None;
    }
    let sum = nodes.iter().fold(Coord { x: 0.0, y: 0.0 }, |acc, node| Coord {
        x: acc.x + node.x,
        y: acc.y + node.y,
    });
    let count = nodes.len() as f64;
    Some(Coord {
        x: sum.x / count,
        y: sum.y / count,
    })
}

fn non_blank<'t>(tags: &[(&'t str, &'t str)], key: &str) -> Option<&'t str> {
    tags.iter()
        .rev()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}
