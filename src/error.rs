//! Error types for contentfaux.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while syncing fixtures or stubbing requests.
#[derive(Debug, Error)]
pub enum FauxError {
    /// Required sync settings are missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure talking to the remote API.
    #[error("network error for {url}: {message}")]
    Network {
        /// Address that was requested.
        url: String,
        /// Transport failure detail.
        message: String,
    },

    /// A response body or fixture document was not the JSON we expected.
    #[error("decode error for {origin}: {message}")]
    Decode {
        /// URL or file the document came from.
        origin: String,
        /// Parser failure detail.
        message: String,
    },

    /// Refused to recursively delete a filesystem root.
    #[error("refusing to delete {}: path resolves to the filesystem root", .0.display())]
    UnsafePath(PathBuf),

    /// The fixture directory could not be read.
    #[error("failed to load fixtures from {}: {source}", path.display())]
    FixtureLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transport hook could not be installed.
    #[error("transport hook error: {0}")]
    Hook(String),

    /// Filesystem failure while replacing the fixture directory.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FauxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FauxError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(origin: impl Into<String>, message: impl ToString) -> Self {
        FauxError::Decode {
            origin: origin.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for contentfaux operations.
pub type Result<T> = std::result::Result<T, FauxError>;
