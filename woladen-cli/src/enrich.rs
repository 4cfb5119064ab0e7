//! Enrich command implementation for the Woladen CLI.

use std::io::Write;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, SubsecRound, Utc};
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use woladen_core::{RuleTable, Station};
use woladen_data::overpass::{DEFAULT_OVERPASS_URL, HttpOverpassConfig};
use woladen_data::{
    BackendChoice, EnrichmentError, EnrichmentRun, EnrichmentSettings, RemoteSettings,
    load_rule_table, run_enrichment,
};

use crate::output::{RunParams, RunSummary, RunWindow, feature_collection};
use crate::stations::load_stations;
use crate::{
    ARG_ALLOW_EXTRACT_DOWNLOAD, ARG_BACKEND, ARG_CACHE, ARG_FORCE_REFRESH, ARG_MAX_STATIONS,
    ARG_OSM_PBF, ARG_OSM_PBF_URL, ARG_OUTPUT, ARG_OVERPASS_DELAY_MS, ARG_OVERPASS_URL,
    ARG_QUERY_BUDGET, ARG_RADIUS_M, ARG_REFRESH_DAYS, ARG_RULES, ARG_STATIONS, ARG_SUMMARY,
    CliError, ENV_STATIONS,
};

const DEFAULT_OUTPUT: &str = "data/chargers_fast.geojson";
const DEFAULT_SUMMARY: &str = "data/summary.json";

/// CLI arguments for the `enrich` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Count amenities around each charging station, either by \
                 querying an Overpass interpreter (with a local cache and a \
                 query budget) or by scanning a local OSM PBF extract. \
                 Settings can come from CLI flags, configuration files, or \
                 environment variables.",
    about = "Enrich charging stations with nearby amenities"
)]
#[ortho_config(prefix = "WOLADEN")]
pub(crate) struct EnrichArgs {
    /// JSON list of stations with `station_id`, `lat` and `lon`.
    #[arg(long = ARG_STATIONS, value_name = "path")]
    #[serde(default)]
    pub(crate) stations: Option<Utf8PathBuf>,
    /// Where to write the enriched GeoJSON.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
    /// Where to write the run summary JSON.
    #[arg(long = ARG_SUMMARY, value_name = "path")]
    #[serde(default)]
    pub(crate) summary: Option<Utf8PathBuf>,
    /// Amenity cache used by the overpass backend.
    #[arg(long = ARG_CACHE, value_name = "path")]
    #[serde(default)]
    pub(crate) cache: Option<Utf8PathBuf>,
    /// Search radius in metres.
    #[arg(long = ARG_RADIUS_M, value_name = "metres")]
    #[serde(default)]
    pub(crate) radius_m: Option<u32>,
    /// Maximum live Overpass lookups per run.
    #[arg(long = ARG_QUERY_BUDGET, value_name = "count")]
    #[serde(default)]
    pub(crate) query_budget: Option<u32>,
    /// Refresh cache entries older than this many days.
    #[arg(long = ARG_REFRESH_DAYS, value_name = "days")]
    #[serde(default)]
    pub(crate) refresh_days: Option<u32>,
    /// Pause between live lookups.
    #[arg(long = ARG_OVERPASS_DELAY_MS, value_name = "ms")]
    #[serde(default)]
    pub(crate) overpass_delay_ms: Option<u64>,
    /// Ignore cached entries and look every station up again.
    #[arg(
        long = ARG_FORCE_REFRESH,
        value_name = "bool",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    #[serde(default)]
    pub(crate) force_refresh: Option<bool>,
    /// Amenity backend: `auto`, `overpass` or `osm-pbf`.
    #[arg(long = ARG_BACKEND, value_name = "name")]
    #[serde(default)]
    pub(crate) backend: Option<String>,
    /// Local OSM PBF extract.
    #[arg(long = ARG_OSM_PBF, value_name = "path")]
    #[serde(default)]
    pub(crate) osm_pbf: Option<Utf8PathBuf>,
    /// Download location for a missing extract.
    #[arg(long = ARG_OSM_PBF_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) osm_pbf_url: Option<String>,
    /// Permit downloading the extract when it is missing.
    #[arg(
        long = ARG_ALLOW_EXTRACT_DOWNLOAD,
        value_name = "bool",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    #[serde(default)]
    pub(crate) allow_extract_download: Option<bool>,
    /// Overpass interpreter endpoint.
    #[arg(long = ARG_OVERPASS_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) overpass_url: Option<String>,
    /// Enrich only the first N stations; 0 enriches all.
    #[arg(long = ARG_MAX_STATIONS, value_name = "count")]
    #[serde(default)]
    pub(crate) max_stations: Option<usize>,
    /// JSON rule file replacing the built-in amenity categories.
    #[arg(long = ARG_RULES, value_name = "path")]
    #[serde(default)]
    pub(crate) rules: Option<Utf8PathBuf>,
}

impl EnrichArgs {
    pub(crate) fn into_config(self) -> Result<EnrichConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        EnrichConfig::try_from(merged)
    }
}

/// Resolved `enrich` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct EnrichConfig {
    /// Station list.
    pub(crate) stations: Utf8PathBuf,
    /// Enriched GeoJSON destination.
    pub(crate) output: Utf8PathBuf,
    /// Run summary destination.
    pub(crate) summary: Utf8PathBuf,
    /// Replacement rule file, if any.
    pub(crate) rules: Option<Utf8PathBuf>,
    /// Settings handed to the enrichment run.
    pub(crate) settings: EnrichmentSettings,
}

impl EnrichConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.stations, ARG_STATIONS)?;
        if let Some(rules) = &self.rules {
            Self::require_existing(rules, ARG_RULES)?;
        }
        Ok(())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match woladen_fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) if path.exists() => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Ok(false) => Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn run_params(&self) -> RunParams {
        let settings = &self.settings;
        RunParams {
            backend: settings.backend.to_string(),
            radius_m: settings.remote.radius_m,
            query_budget: settings.remote.query_budget,
            refresh_days: settings.remote.refresh_days,
            overpass_delay_ms: u64::try_from(settings.remote.delay.as_millis())
                .unwrap_or(u64::MAX),
            force_refresh: settings.remote.force_refresh,
            max_stations: settings.max_stations,
        }
    }
}

impl TryFrom<EnrichArgs> for EnrichConfig {
    type Error = CliError;

    fn try_from(args: EnrichArgs) -> Result<Self, Self::Error> {
        let stations = args.stations.ok_or(CliError::MissingArgument {
            field: ARG_STATIONS,
            env: ENV_STATIONS,
        })?;
        let backend = match args.backend {
            Some(name) => name.parse::<BackendChoice>()?,
            None => BackendChoice::default(),
        };

        let defaults = EnrichmentSettings::default();
        let remote_defaults = RemoteSettings::default();
        let remote = RemoteSettings {
            radius_m: args.radius_m.unwrap_or(remote_defaults.radius_m),
            query_budget: args.query_budget.unwrap_or(remote_defaults.query_budget),
            refresh_days: args.refresh_days.unwrap_or(remote_defaults.refresh_days),
            delay: args
                .overpass_delay_ms
                .map_or(remote_defaults.delay, Duration::from_millis),
            force_refresh: args.force_refresh.unwrap_or(false),
            backoff: remote_defaults.backoff,
        };
        let http = HttpOverpassConfig::new(
            args.overpass_url
                .unwrap_or_else(|| DEFAULT_OVERPASS_URL.to_owned()),
        );
        let settings = EnrichmentSettings {
            backend,
            remote,
            http,
            cache_path: args.cache.unwrap_or(defaults.cache_path),
            extract_path: args.osm_pbf.unwrap_or(defaults.extract_path),
            extract_url: args.osm_pbf_url,
            allow_extract_download: args.allow_extract_download.unwrap_or(false),
            max_stations: args.max_stations.unwrap_or(0),
            progress: defaults.progress,
        };

        Ok(Self {
            stations,
            output: args
                .output
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT)),
            summary: args
                .summary
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_SUMMARY)),
            rules: args.rules,
            settings,
        })
    }
}

/// Runs the enrichment for the current invocation.
pub(super) trait EnrichmentRunner {
    fn run(
        &self,
        rules: RuleTable,
        stations: &[Station],
        settings: &EnrichmentSettings,
        now: DateTime<Utc>,
    ) -> Result<EnrichmentRun, EnrichmentError>;
}

pub(super) struct DefaultEnrichmentRunner;

impl EnrichmentRunner for DefaultEnrichmentRunner {
    fn run(
        &self,
        rules: RuleTable,
        stations: &[Station],
        settings: &EnrichmentSettings,
        now: DateTime<Utc>,
    ) -> Result<EnrichmentRun, EnrichmentError> {
        run_enrichment(rules, stations, settings, now)
    }
}

pub(super) fn run_enrich(args: EnrichArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_enrich_with(args, &DefaultEnrichmentRunner, &mut stdout)
}

pub(super) fn run_enrich_with(
    args: EnrichArgs,
    runner: &dyn EnrichmentRunner,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = resolve_enrich_config(args)?;
    let summary = execute_enrich(&config, runner)?;
    write_summary(writer, &summary)
}

pub(super) fn resolve_enrich_config(args: EnrichArgs) -> Result<EnrichConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

/// Enrich the configured stations and write both output documents.
pub(super) fn execute_enrich(
    config: &EnrichConfig,
    runner: &dyn EnrichmentRunner,
) -> Result<RunSummary, CliError> {
    let rules = match &config.rules {
        Some(path) => load_rule_table(path)?,
        None => RuleTable::default(),
    };
    let list = load_stations(&config.stations)?;
    info!(
        "loaded {} stations from {}",
        list.stations.len(),
        config.stations
    );

    let started_at = Utc::now().trunc_subsecs(0);
    let run = runner.run(rules.clone(), &list.stations, &config.settings, started_at)?;
    let finished_at = Utc::now().trunc_subsecs(0);

    let collection = feature_collection(&list.records, &run, &rules, finished_at);
    write_json(&config.output, &collection, "enriched stations")?;

    let summary = RunSummary::new(
        RunWindow {
            started_at,
            finished_at,
        },
        config.run_params(),
        list.stations.len(),
        run.summary,
    );
    write_json(&config.summary, &summary, "run summary")?;
    info!(
        "wrote {} stations to {} and the run summary to {}",
        run.stations.len(),
        config.output,
        config.summary
    );
    Ok(summary)
}

fn write_json<T: Serialize + ?Sized>(
    path: &Utf8Path,
    value: &T,
    document: &'static str,
) -> Result<(), CliError> {
    let mut payload = serde_json::to_vec_pretty(value)
        .map_err(|source| CliError::SerialiseOutput { document, source })?;
    payload.push(b'\n');
    woladen_fs::write_atomic(path, &payload).map_err(|source| CliError::WriteOutput {
        path: path.to_path_buf(),
        source,
    })
}

fn write_summary(writer: &mut dyn Write, summary: &RunSummary) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(summary).map_err(|source| {
        CliError::SerialiseOutput {
            document: "run summary",
            source,
        }
    })?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteSummary)?;
    writer.write_all(b"\n").map_err(CliError::WriteSummary)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<EnrichConfig, CliError> {
    let merged = EnrichArgs::merge_from_layers(layers).map_err(CliError::from)?;
    EnrichConfig::try_from(merged)
}
