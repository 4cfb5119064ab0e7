use geo::Coord;
use thiserror::Error;

/// A charging station to be enriched.
///
/// Coordinates are WGS84 with `x = longitude` and `y = latitude`.
///
/// # Examples
/// ```
/// use woladen_core::Station;
///
/// # fn main() -> Result<(), woladen_core::StationError> {
/// let station = Station::new("DE-1", 52.52, 13.405)?;
/// assert_eq!(station.lat(), 52.52);
/// assert_eq!(station.location().x, 13.405);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    id: String,
    location: Coord<f64>,
}

/// Errors returned by [`Station::new`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StationError {
    /// The identifier was blank.
    #[error("station id must not be blank")]
    BlankId,
    /// Latitude or longitude was outside the WGS84 range or not finite.
    #[error("station {id:?} has invalid coordinates ({lat}, {lon})")]
    InvalidCoordinate {
        /// Station identifier.
        id: String,
        /// Supplied latitude.
        lat: f64,
        /// Supplied longitude.
        lon: f64,
    },
}

impl Station {
    /// Validates and constructs a [`Station`].
    ///
    /// # Errors
    ///
    /// Returns [`StationError::BlankId`] for a blank identifier and
    /// [`StationError::InvalidCoordinate`] for out-of-range coordinates.
    pub fn new(id: impl Into<String>, lat: f64, lon: f64) -> Result<Self, StationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(StationError::BlankId);
        }
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if !valid {
            return Err(StationError::InvalidCoordinate { id, lat, lon });
        }
        Ok(Self {
            id,
            location: Coord { x: lon, y: lat },
        })
    }

    /// Station identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.location.y
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lon(&self) -> f64 {
        self.location.x
    }

    /// Position as a `geo` coordinate.
    #[must_use]
    pub const fn location(&self) -> Coord<f64> {
        self.location
    }
}
