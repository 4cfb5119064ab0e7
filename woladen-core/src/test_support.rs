//! Test-only helpers for placing amenities at known distances from a
//! station.

use geo::Coord;

use crate::{
    Station,
    distance::{EARTH_RADIUS_M, METRES_PER_DEGREE, longitude_half_width_deg},
};

/// Coordinate `metres` due north of `origin` on the reference sphere.
#[must_use]
pub fn north_of(origin: Coord<f64>, metres: f64) -> Coord<f64> {
    Coord {
        x: origin.x,
        y: origin.y + metres / METRES_PER_DEGREE,
    }
}

/// Coordinate roughly `metres` due east of `origin`.
///
/// Uses the parallel-of-latitude approximation, which overestimates the
/// great-circle distance slightly; callers should keep a margin of a metre.
#[must_use]
pub fn east_of(origin: Coord<f64>, metres: f64) -> Coord<f64> {
    let degrees = metres / (METRES_PER_DEGREE * origin.y.to_radians().cos());
    Coord {
        x: origin.x + degrees,
        y: origin.y,
    }
}

/// Point reached by travelling `metres` from `origin` along `bearing_deg`
/// on the reference sphere.
#[must_use]
pub fn destination(origin: Coord<f64>, bearing_deg: f64, metres: f64) -> Coord<f64> {
    let angular = metres / EARTH_RADIUS_M;
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.y.to_radians();
    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = origin.x.to_radians()
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());
    Coord {
        x: lon2.to_degrees(),
        y: lat2.to_degrees(),
    }
}

/// Upper bound of the longitude half-width used by the grids, for tests
/// that want to sit just outside a station's coverage.
#[must_use]
pub fn coverage_lon_half_width(origin: Coord<f64>, radius_m: f64) -> f64 {
    longitude_half_width_deg(radius_m, origin.y)
}

/// Station in central Berlin used across scenarios.
///
/// # Panics
///
/// Never panics: the coordinates are valid constants.
#[must_use]
pub fn berlin_station() -> Station {
    Station::new("berlin-mitte", 52.52, 13.405).expect("constant station is valid")
}
