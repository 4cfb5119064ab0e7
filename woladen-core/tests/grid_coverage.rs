//! Property-based tests for the coverage box and grid helpers.
//!
//! # Invariants tested
//!
//! - **No false negatives:** every point within the radius of a centre lies
//!   inside the centre's coverage box and in one of the cells it touches.
//! - **Determinism:** cell assignment is a pure function of the coordinate.

use geo::Coord;
use proptest::prelude::*;
use woladen_core::distance::{EARTH_RADIUS_M, haversine_m};
use woladen_core::{CoverageBox, GridCell, GridStep};

/// Point reached by travelling `distance_m` from `origin` along `bearing_deg`.
fn destination(origin: Coord<f64>, bearing_deg: f64, distance_m: f64) -> Coord<f64> {
    let angular = distance_m / EARTH_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.y.to_radians();
    let lon1 = origin.x.to_radians();
    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());
    Coord {
        x: lon2.to_degrees(),
        y: lat2.to_degrees(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the coverage box of a station contains every point within
    /// its radius, and so does the set of cells the box touches.
    #[test]
    fn coverage_box_has_no_false_negatives(
        lat in -80.0_f64..80.0,
        lon in -170.0_f64..170.0,
        radius_m in 50.0_f64..5_000.0,
        bearing in 0.0_f64..360.0,
        fraction in 0.0_f64..1.0,
        lat_step in 0.001_f64..0.1,
        lon_step in 0.001_f64..0.1,
    ) {
        let centre = Coord { x: lon, y: lat };
        let point = destination(centre, bearing, radius_m * fraction);
        prop_assume!(haversine_m(centre, point) <= radius_m);

        let bounds = CoverageBox::around(centre, radius_m);
        prop_assert!(bounds.min.y <= point.y && point.y <= bounds.max.y);
        prop_assert!(bounds.min.x <= point.x && point.x <= bounds.max.x);

        let step = GridStep::new(lat_step, lon_step).expect("valid step");
        let cell = GridCell::containing(point, step);
        prop_assert!(bounds.cells(step).any(|candidate| candidate == cell));
    }

    /// Property: cell assignment is deterministic and the cell's bounds
    /// enclose the coordinate.
    #[test]
    fn cells_enclose_their_coordinates(
        lat in -89.0_f64..89.0,
        lon in -179.0_f64..179.0,
        lat_step in 0.001_f64..1.0,
        lon_step in 0.001_f64..1.0,
    ) {
        let step = GridStep::new(lat_step, lon_step).expect("valid step");
        let location = Coord { x: lon, y: lat };
        let cell = GridCell::containing(location, step);
        prop_assert_eq!(cell, GridCell::containing(location, step));

        let south = cell.lat_index as f64 * lat_step;
        let west = cell.lon_index as f64 * lon_step;
        prop_assert!(south <= lat + 1e-9 && lat < south + lat_step + 1e-9);
        prop_assert!(west <= lon + 1e-9 && lon < west + lon_step + 1e-9);
    }
}
