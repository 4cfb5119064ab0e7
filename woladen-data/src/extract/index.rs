//! Fine spatial hash over retained amenity points.

use std::collections::HashMap;

use geo::Coord;
use woladen_core::distance::{
    METRES_PER_DEGREE, haversine_m, latitude_half_width_deg, longitude_half_width_deg,
};
use woladen_core::{GridCell, GridStep, GridStepError, Station};

use super::AmenityPoint;

/// Smallest latitude step of the fine grid, roughly 111 m.
pub const MIN_FINE_STEP_DEG: f64 = 0.001;

/// Points bucketed by fine grid cell.
///
/// The latitude step is the radius in degrees, clamped to
/// [`MIN_FINE_STEP_DEG`]. The longitude step is widened for the most
/// poleward station so a cell is never narrower, in metres, than the radius.
#[derive(Debug, Clone, Default)]
pub struct FineIndex {
    step: Option<GridStep>,
    cells: HashMap<GridCell, Vec<usize>>,
}

impl FineIndex {
    /// Index `points` for radius queries of `radius_m` around `stations`.
    ///
    /// # Errors
    ///
    /// Returns [`GridStepError`] if the derived steps are not finite.
    pub fn build(
        points: &[AmenityPoint],
        stations: &[Station],
        radius_m: f64,
    ) -> Result<Self, GridStepError> {
        let lat_step = latitude_half_width_deg(radius_m).max(MIN_FINE_STEP_DEG);
        let poleward = stations
            .iter()
            .map(|station| station.lat().abs())
            .fold(0.0_f64, f64::max);
        let lon_step = longitude_half_width_deg(lat_step * METRES_PER_DEGREE, poleward);
        let step = GridStep::new(lat_step, lon_step)?;

        let mut cells: HashMap<GridCell, Vec<usize>> = HashMap::new();
        for (position, point) in points.iter().enumerate() {
            cells
                .entry(GridCell::containing(point.location, step))
                .or_default()
                .push(position);
        }
        Ok(Self {
            step: Some(step),
            cells,
        })
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Grid step, if the index was built.
    #[must_use]
    pub fn step(&self) -> Option<GridStep> {
        self.step
    }

    /// Positions of the points within `radius_m` of `center`, ascending.
    ///
    /// Candidate cells are taken from a neighbourhood one cell wider than the
    /// coverage box in every direction, then filtered by exact distance.
    #[must_use]
    pub fn within(&self, points: &[AmenityPoint], center: Coord<f64>, radius_m: f64) -> Vec<usize> {
        let Some(step) = self.step else {
            return Vec::new();
        };
        let lat_span = span(latitude_half_width_deg(radius_m), step.lat_deg());
        let lon_span = span(longitude_half_width_deg(radius_m, center.y), step.lon_deg());
        let mut found: Vec<usize> = GridCell::containing(center, step)
            .neighbourhood(lat_span, lon_span)
            .filter_map(|cell| self.cells.get(&cell))
            .flatten()
            .copied()
            .filter(|position| {
                points
                    .get(*position)
                    .is_some_and(|point| haversine_m(center, point.location) <= radius_m)
            })
            .collect();
        found.sort_unstable();
        found
    }
}

fn span(half_width_deg: f64, step_deg: f64) -> i64 {
    (half_width_deg / step_deg).ceil() as i64 + 1
}
