use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DownloaderError {
    #[error("game version is not valid: {0}")]
    #[diagnostic(help("pass a release known to the catalog, e.g. 1.20.1"))]
    InvalidGameVersion(String),

    #[error("loader is not valid: {0}")]
    #[diagnostic(help("pass a loader known to the catalog, e.g. fabric, forge, quilt"))]
    InvalidLoader(String),

    #[error("missing required setting: {0}")]
    MissingSetting(String),

    #[error("invalid collection reference: {0}")]
    InvalidCollectionRef(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read mod list: {0}")]
    ModListParse(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog returned status {status} for {endpoint}: {message}")]
    CatalogStatus {
        status: u16,
        endpoint: String,
        message: String,
    },

    #[error("malformed catalog payload from {endpoint}: {message}")]
    CatalogParse { endpoint: String, message: String },

    #[error("there is no matching version for project '{project_id}' ({project_name})")]
    NoMatchingVersion {
        project_id: String,
        project_name: String,
    },

    #[error("version {version_id} belongs to project {actual}, not {expected}")]
    VersionMismatch {
        version_id: String,
        expected: String,
        actual: String,
    },

    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("version cache at {path} is unusable: {message}")]
    Cache { path: String, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl DownloaderError {
    /// Errors that must stop a run even when items are otherwise skipped one by one.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DownloaderError::Filesystem(_)
                | DownloaderError::Cache { .. }
                | DownloaderError::InvalidGameVersion(_)
                | DownloaderError::InvalidLoader(_)
                | DownloaderError::MissingSetting(_)
        )
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DownloaderError::InvalidGameVersion(_)
                | DownloaderError::InvalidLoader(_)
                | DownloaderError::MissingSetting(_)
                | DownloaderError::InvalidCollectionRef(_)
                | DownloaderError::ConfigRead(_)
                | DownloaderError::ConfigParse(_)
                | DownloaderError::ModListParse(_)
        )
    }

    pub fn is_catalog(&self) -> bool {
        matches!(
            self,
            DownloaderError::CatalogHttp(_)
                | DownloaderError::CatalogStatus { .. }
                | DownloaderError::CatalogParse { .. }
                | DownloaderError::Download { .. }
        )
    }
}
