use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum PainelError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("remote data request failed: {0}")]
    RemoteHttp(String),

    #[error("remote data source returned status {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("remote data folder is not a zip archive: {0}")]
    #[diagnostic(help(
        "point DATA_FOLDER_URL at an archive export of the folder, or set remote_layout to \"files\""
    ))]
    NotAnArchive(String),

    #[error("required data files not found after download: {}", .0.join(", "))]
    #[diagnostic(help("check the remote folder for missing or renamed files"))]
    MissingDataFiles(Vec<String>),

    #[error("base dataset not found: {0}")]
    BaseDatasetMissing(String),

    #[error(
        "columns missing in {dataset}: {} (available: {})",
        .missing.join(", "),
        .available.join(", ")
    )]
    MissingBaseColumns {
        dataset: String,
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("failed to parse {name}: {message}")]
    DatasetParse { name: String, message: String },

    #[error("table operation failed: {0}")]
    Table(#[from] polars::error::PolarsError),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
