//! Great-circle distances and metre/degree conversions.
//!
//! Coordinates are WGS84 with `x = longitude` and `y = latitude`. All
//! distances use a spherical Earth of radius [`EARTH_RADIUS_M`].

use geo::Coord;

/// Sphere radius used for every distance calculation, in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Length of one degree of latitude on the reference sphere, in metres.
pub const METRES_PER_DEGREE: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Latitudes beyond this are clamped when scaling longitude widths.
const MAX_SCALING_LATITUDE: f64 = 89.0;

/// Haversine distance between two coordinates, in metres.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use woladen_core::distance::haversine_m;
///
/// let berlin = Coord { x: 13.405, y: 52.52 };
/// assert_eq!(haversine_m(berlin, berlin), 0.0);
/// ```
#[must_use]
pub fn haversine_m(from: Coord<f64>, to: Coord<f64>) -> f64 {
    let from_lat = from.y.to_radians();
    let to_lat = to.y.to_radians();
    let half_dlat = (to.y - from.y).to_radians() / 2.0;
    let half_dlon = (to.x - from.x).to_radians() / 2.0;
    let a = half_dlat.sin().powi(2) + from_lat.cos() * to_lat.cos() * half_dlon.sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Haversine distance rounded to whole metres.
#[must_use]
pub fn rounded_distance_m(from: Coord<f64>, to: Coord<f64>) -> u32 {
    let metres = haversine_m(from, to).round();
    // Saturating cast: distances on the sphere never exceed ~20 000 km.
    metres as u32
}

/// Latitude half-width, in degrees, of a box covering `radius_m`.
#[must_use]
pub fn latitude_half_width_deg(radius_m: f64) -> f64 {
    radius_m / METRES_PER_DEGREE
}

/// Longitude half-width, in degrees, of a box covering `radius_m` around a
/// point at `latitude_deg`.
///
/// The width is scaled by `1 / cos(latitude)` evaluated at the most poleward
/// edge of the box, so the box always contains the full circle.
#[must_use]
pub fn longitude_half_width_deg(radius_m: f64, latitude_deg: f64) -> f64 {
    let lat_half = latitude_half_width_deg(radius_m);
    let poleward = (latitude_deg.abs() + lat_half).min(MAX_SCALING_LATITUDE);
    lat_half / poleward.to_radians().cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn north_of(origin: Coord<f64>, metres: f64) -> Coord<f64> {
        Coord {
            x: origin.x,
            y: origin.y + metres / METRES_PER_DEGREE,
        }
    }

    #[rstest]
    #[case(0.0)]
    #[case(40.0)]
    #[case(100.0)]
    #[case(2_500.0)]
    fn meridian_offsets_round_trip(#[case] metres: f64) {
        let origin = Coord { x: 13.405, y: 52.52 };
        let distance = haversine_m(origin, north_of(origin, metres));
        assert!((distance - metres).abs() < 1.0e-6, "got {distance}");
    }

    #[rstest]
    fn distance_is_symmetric() {
        let a = Coord { x: 13.405, y: 52.52 };
        let b = Coord { x: 11.576, y: 48.137 };
        assert!((haversine_m(a, b) - haversine_m(b, a)).abs() < 1.0e-9);
        // Berlin to Munich is roughly 504 km.
        assert_eq!(rounded_distance_m(a, b) / 1_000, 504);
    }

    #[rstest]
    fn longitude_width_grows_towards_the_poles() {
        let equator = longitude_half_width_deg(100.0, 0.0);
        let berlin = longitude_half_width_deg(100.0, 52.52);
        let arctic = longitude_half_width_deg(100.0, 89.9);
        assert!(equator >= latitude_half_width_deg(100.0));
        assert!(berlin > equator);
        assert!(arctic > berlin);
        assert!(arctic.is_finite());
    }
}
