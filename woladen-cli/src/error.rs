//! Error types emitted by the Woladen CLI.
//!
//! Library errors are wrapped rather than flattened so the `source()` chain
//! still names the failing file or URL.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use woladen_core::StationError;
use woladen_data::enrichment::ParseBackendChoiceError;
use woladen_data::{EnrichmentError, RulesFileError};

/// Errors emitted by the Woladen CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The backend name was not recognised.
    #[error(transparent)]
    InvalidBackend(#[from] ParseBackendChoiceError),
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The station list could not be read.
    #[error("failed to read stations from {path:?}: {source}")]
    ReadStations {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The station list was not valid JSON.
    #[error("failed to parse stations JSON at {path:?}: {source}")]
    ParseStations {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// A station record had a blank id or invalid coordinates.
    #[error("station #{index} in {path:?} is invalid: {source}")]
    InvalidStation {
        path: Utf8PathBuf,
        index: usize,
        #[source]
        source: StationError,
    },
    /// The rule file could not be loaded.
    #[error(transparent)]
    Rules(#[from] RulesFileError),
    /// The enrichment run aborted.
    #[error("amenity enrichment failed: {0}")]
    Enrichment(#[from] EnrichmentError),
    /// Serialising an output document failed.
    #[error("failed to serialise {document}: {source}")]
    SerialiseOutput {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// Writing an output document failed.
    #[error("failed to write {path:?}: {source}")]
    WriteOutput {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Echoing the run summary failed.
    #[error("failed to write run summary: {0}")]
    WriteSummary(#[source] std::io::Error),
}
