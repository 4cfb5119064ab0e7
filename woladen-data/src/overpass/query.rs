//! Overpass QL query construction.

use std::fmt::Write as _;

use geo::Coord;
use woladen_core::RuleTable;

/// Server-side timeout requested in the query header, in seconds.
pub const QUERY_TIMEOUT_SECS: u32 = 30;

const ELEMENT_KINDS: [&str; 3] = ["node", "way", "relation"];

/// Build a query returning every node, way and relation within `radius_m`
/// of `location` that matches any selector of `rules`.
///
/// Coordinates are written with six decimals and results are requested as
/// `out tags center`, so ways and relations carry a centroid.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use woladen_core::{AmenityRule, RuleTable, TagSelector};
/// use woladen_data::overpass::build_overpass_query;
///
/// let rules = RuleTable::new(vec![
///     AmenityRule::new("cafe", vec![TagSelector::new("amenity", "cafe")]).expect("valid rule"),
/// ])
/// .expect("valid table");
/// let query = build_overpass_query(&rules, Coord { x: 13.405, y: 52.52 }, 100);
/// assert!(query.contains(r#"way["amenity"="cafe"](around:100,52.520000,13.405000);"#));
/// assert!(query.ends_with("out tags center;"));
/// ```
#[must_use]
pub fn build_overpass_query(rules: &RuleTable, location: Coord<f64>, radius_m: u32) -> String {
    let mut query = format!("[out:json][timeout:{QUERY_TIMEOUT_SECS}];\n(\n");
    let around = format!("(around:{radius_m},{:.6},{:.6})", location.y, location.x);
    for selector in rules.selectors() {
        let key = escape(&selector.key);
        let value = escape(&selector.value);
        for kind in ELEMENT_KINDS {
            // Writing into a String cannot fail.
            let _ = writeln!(query, "  {kind}[\"{key}\"=\"{value}\"]{around};");
        }
    }
    query.push_str(");\nout tags center;");
    query
}

fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn default_rules_produce_three_clauses_per_selector() {
        let rules = RuleTable::default();
        let query = build_overpass_query(&rules, Coord { x: 13.405, y: 52.52 }, 100);
        let clauses = query.lines().filter(|line| line.contains("(around:")).count();
        assert_eq!(clauses, 3 * rules.selectors().count());
        assert!(query.starts_with("[out:json][timeout:30];\n(\n"));
        assert!(query.contains(r#"relation["shop"="chemist"](around:100,52.520000,13.405000);"#));
    }

    #[rstest]
    fn quotes_in_selectors_are_escaped() {
        assert_eq!(escape(r#"a"b\c"#), r#"a\"b\\c"#);
    }
}
