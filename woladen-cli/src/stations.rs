//! Station list input.
//!
//! The list is a JSON array of objects carrying `station_id` (or `id`),
//! `lat` and `lon`. Any other properties are kept and copied to the output
//! feature unchanged.

use camino::Utf8Path;
use serde::Deserialize;
use serde_json::{Map, Value};
use woladen_core::Station;

use crate::CliError;

/// One input row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct StationRecord {
    #[serde(alias = "id")]
    pub(crate) station_id: String,
    pub(crate) lat: f64,
    pub(crate) lon: f64,
    #[serde(flatten)]
    pub(crate) properties: Map<String, Value>,
}

/// Records in file order with their validated stations.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StationList {
    pub(crate) records: Vec<StationRecord>,
    pub(crate) stations: Vec<Station>,
}

/// Read and validate the station list at `path`.
pub(crate) fn load_stations(path: &Utf8Path) -> Result<StationList, CliError> {
    let text = woladen_fs::read_utf8(path).map_err(|source| CliError::ReadStations {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<StationRecord> =
        serde_json::from_str(&text).map_err(|source| CliError::ParseStations {
            path: path.to_path_buf(),
            source,
        })?;
    let stations = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            Station::new(record.station_id.clone(), record.lat, record.lon).map_err(|source| {
                CliError::InvalidStation {
                    path: path.to_path_buf(),
                    index,
                    source,
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(StationList { records, stations })
}
