//! Command-line interface for the Woladen amenity enrichment engine.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod enrich;
mod error;
mod output;
mod stations;

pub use error::CliError;

use enrich::{EnrichArgs, run_enrich};

const ARG_STATIONS: &str = "stations";
const ARG_OUTPUT: &str = "output";
const ARG_SUMMARY: &str = "summary";
const ARG_CACHE: &str = "cache";
const ARG_RADIUS_M: &str = "radius-m";
const ARG_QUERY_BUDGET: &str = "query-budget";
const ARG_REFRESH_DAYS: &str = "refresh-days";
const ARG_OVERPASS_DELAY_MS: &str = "overpass-delay-ms";
const ARG_FORCE_REFRESH: &str = "force-refresh";
const ARG_BACKEND: &str = "backend";
const ARG_OSM_PBF: &str = "osm-pbf";
const ARG_OSM_PBF_URL: &str = "osm-pbf-url";
const ARG_ALLOW_EXTRACT_DOWNLOAD: &str = "allow-extract-download";
const ARG_OVERPASS_URL: &str = "overpass-url";
const ARG_MAX_STATIONS: &str = "max-stations";
const ARG_RULES: &str = "rules";
const ENV_STATIONS: &str = "WOLADEN_CMDS_ENRICH_STATIONS";

/// Run the Woladen CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when arguments or configuration are invalid, an
/// input cannot be read, the enrichment run aborts, or an output cannot be
/// written.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Enrich(args) => run_enrich(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "woladen",
    about = "Amenity enrichment for EV charging stations",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Count amenities around each station and write GeoJSON plus a summary.
    Enrich(EnrichArgs),
}

#[cfg(test)]
mod tests;
