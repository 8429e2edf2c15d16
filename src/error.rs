//! Error types for pipeline stages.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a pipeline stage.
///
/// Recoverable conditions (unparseable timestamps, failed header patches,
/// spreadsheet export problems) never surface here; they are logged and the
/// stage continues.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet could not be opened or has no sheets
    #[error("workbook error in '{path}': {message}")]
    Workbook { path: PathBuf, message: String },

    /// Input table lacks columns the stage depends on
    #[error("missing required column(s) in '{source_name}': {}", .columns.join(", "))]
    MissingColumns {
        source_name: String,
        columns: Vec<String>,
    },

    /// Upstream artifact produced by an earlier stage is absent
    #[error("missing upstream artifact: {path} ({hint})")]
    MissingArtifact { path: PathBuf, hint: String },

    /// Input file extension is not a supported table format
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Interchange (XES) serialization or parsing failed
    #[error("XES error: {0}")]
    Xes(#[from] crate::xes::XesError),

    /// Petri net could not be written as PNML
    #[error("PNML error: {0}")]
    Pnml(#[from] crate::pnml::PnmlError),

    /// Chart could not be rendered
    #[error("chart error: {0}")]
    Chart(#[from] crate::charts::ChartError),

    /// Discovery backend could not produce a model
    #[error("discovery backend error: {0}")]
    Discovery(#[from] crate::discovery::BackendError),

    /// Invalid configuration value
    #[error("invalid configuration for {key}: {message}")]
    Config { key: String, message: String },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
