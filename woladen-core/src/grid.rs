//! Regular latitude/longitude grids used for spatial hashing.
//!
//! A [`GridCell`] is a pure function of a coordinate and a [`GridStep`]:
//! `floor(lat / lat_step)` and `floor(lon / lon_step)`.

use geo::Coord;
use thiserror::Error;

use crate::distance::{latitude_half_width_deg, longitude_half_width_deg};

/// Errors returned by [`GridStep::new`].
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum GridStepError {
    /// A step was zero, negative or not finite.
    #[error("grid steps must be positive and finite (lat {lat_deg}, lon {lon_deg})")]
    InvalidStep {
        /// Requested latitude step in degrees.
        lat_deg: f64,
        /// Requested longitude step in degrees.
        lon_deg: f64,
    },
}

/// Cell edge lengths in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStep {
    lat_deg: f64,
    lon_deg: f64,
}

impl GridStep {
    /// 0.02° of latitude by 0.03° of longitude; used to prefilter extracts.
    pub const COARSE: Self = Self {
        lat_deg: 0.02,
        lon_deg: 0.03,
    };

    /// Validates and constructs a [`GridStep`].
    ///
    /// # Errors
    ///
    /// Returns [`GridStepError::InvalidStep`] unless both steps are positive
    /// and finite.
    pub fn new(lat_deg: f64, lon_deg: f64) -> Result<Self, GridStepError> {
        let valid = |step: f64| step.is_finite() && step > 0.0;
        if valid(lat_deg) && valid(lon_deg) {
            Ok(Self { lat_deg, lon_deg })
        } else {
            Err(GridStepError::InvalidStep { lat_deg, lon_deg })
        }
    }

    /// Latitude edge in degrees.
    #[must_use]
    pub const fn lat_deg(&self) -> f64 {
        self.lat_deg
    }

    /// Longitude edge in degrees.
    #[must_use]
    pub const fn lon_deg(&self) -> f64 {
        self.lon_deg
    }
}

/// Integer `(lat, lon)` index of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    /// Row index, `floor(lat / lat_step)`.
    pub lat_index: i64,
    /// Column index, `floor(lon / lon_step)`.
    pub lon_index: i64,
}

impl GridCell {
    /// Cell containing `location`.
    ///
    /// # Examples
    /// ```
    /// use geo::Coord;
    /// use woladen_core::{GridCell, GridStep};
    ///
    /// let step = GridStep::new(0.5, 0.5).expect("valid step");
    /// let cell = GridCell::containing(Coord { x: -0.25, y: 1.75 }, step);
    /// assert_eq!(cell, GridCell { lat_index: 3, lon_index: -1 });
    /// ```
    #[must_use]
    pub fn containing(location: Coord<f64>, step: GridStep) -> Self {
        Self {
            lat_index: (location.y / step.lat_deg).floor() as i64,
            lon_index: (location.x / step.lon_deg).floor() as i64,
        }
    }

    /// Every cell within `lat_span` rows and `lon_span` columns of `self`.
    pub fn neighbourhood(self, lat_span: i64, lon_span: i64) -> impl Iterator<Item = Self> {
        let lat_range = (self.lat_index - lat_span)..=(self.lat_index + lat_span);
        lat_range.flat_map(move |lat_index| {
            ((self.lon_index - lon_span)..=(self.lon_index + lon_span))
                .map(move |lon_index| Self {
                    lat_index,
                    lon_index,
                })
        })
    }
}

/// Axis-aligned box, in degrees, that contains every point within
/// `radius_m` of `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageBox {
    /// South-west corner.
    pub min: Coord<f64>,
    /// North-east corner.
    pub max: Coord<f64>,
}

impl CoverageBox {
    /// Box around `center` wide enough for `radius_m`.
    ///
    /// Longitudes are not wrapped at the antimeridian: a box around a
    /// centre within `radius_m` of ±180° extends past it and misses cells
    /// on the far side. Station data never comes that close.
    #[must_use]
    pub fn around(center: Coord<f64>, radius_m: f64) -> Self {
        let lat_half = latitude_half_width_deg(radius_m);
        let lon_half = longitude_half_width_deg(radius_m, center.y);
        Self {
            min: Coord {
                x: center.x - lon_half,
                y: center.y - lat_half,
            },
            max: Coord {
                x: center.x + lon_half,
                y: center.y + lat_half,
            },
        }
    }

    /// Every cell of `step` that the box touches.
    pub fn cells(&self, step: GridStep) -> impl Iterator<Item = GridCell> + use<> {
        let low = GridCell::containing(self.min, step);
        let high = GridCell::containing(self.max, step);
        (low.lat_index..=high.lat_index).flat_map(move |lat_index| {
            (low.lon_index..=high.lon_index).map(move |lon_index| GridCell {
                lat_index,
                lon_index,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 0.1)]
    #[case(0.1, -1.0)]
    #[case(f64::NAN, 0.1)]
    #[case(0.1, f64::INFINITY)]
    fn rejects_invalid_steps(#[case] lat: f64, #[case] lon: f64) {
        assert!(GridStep::new(lat, lon).is_err());
    }

    #[rstest]
    fn negative_coordinates_floor_downwards() {
        let step = GridStep::new(0.02, 0.03).expect("valid step");
        let cell = GridCell::containing(Coord { x: -0.01, y: -0.01 }, step);
        assert_eq!(
            cell,
            GridCell {
                lat_index: -1,
                lon_index: -1
            }
        );
    }

    #[rstest]
    fn neighbourhood_is_a_full_square() {
        let centre = GridCell {
            lat_index: 10,
            lon_index: -4,
        };
        let cells: Vec<GridCell> = centre.neighbourhood(2, 1).collect();
        assert_eq!(cells.len(), 15);
        assert!(cells.contains(&GridCell {
            lat_index: 8,
            lon_index: -5
        }));
        assert!(cells.contains(&GridCell {
            lat_index: 12,
            lon_index: -3
        }));
    }

    #[rstest]
    fn coverage_box_touching_a_boundary_spans_two_cells() {
        let step = GridStep::new(0.02, 0.03).expect("valid step");
        // 52.52 sits on a 0.02° row boundary; a 100 m box straddles it.
        let bounds = CoverageBox::around(Coord { x: 13.405, y: 52.52 }, 100.0);
        let rows: std::collections::BTreeSet<i64> =
            bounds.cells(step).map(|cell| cell.lat_index).collect();
        assert_eq!(rows.len(), 2);
    }

    #[rstest]
    fn coverage_boxes_are_not_wrapped_at_the_antimeridian() {
        let bounds = CoverageBox::around(Coord { x: 179.9995, y: 0.0 }, 200.0);
        assert!(bounds.max.x > 180.0);
        assert!(bounds.min.x < 180.0);
    }
}
