use camino::Utf8PathBuf;
use std::io;
use thiserror::Error;

/// Errors raised by the file lifecycle services
///
/// Only [`Bootstrap`](Self::Bootstrap) is terminal; the rest are recorded per
/// item in the batch reports and the batch carries on.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Failed to create directory {path}: {source}")]
    Bootstrap {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move {path} to {destination}: {source}")]
    Move {
        path: Utf8PathBuf,
        destination: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to append {path} to archive {archive}: {source}")]
    ArchiveAppend {
        path: Utf8PathBuf,
        archive: Utf8PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to open archive {archive}: {source}")]
    ArchiveContainer {
        archive: Utf8PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to delete {path}: {source}")]
    Delete {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Resource sampling failed: {0}")]
    ResourceSample(String),

    #[error("Failed to list {path}: {source}")]
    Scan {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: Utf8PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
}

impl LifecycleError {
    /// Whether the error should stop the agent rather than be recorded.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Bootstrap { .. } | Self::ConfigInvalid(_))
    }
}
