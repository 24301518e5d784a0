#![forbid(unsafe_code)]

//! Error taxonomy shared by the pipeline modules.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A channel handle, video, or manifest file could not be found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operator supplied a malformed URL or identifier.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The remote API answered with a non-success status. `body` keeps the raw
    /// payload so the operator can see what the API complained about.
    #[error("API request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The downloader binary is missing, broken, or could not be launched.
    #[error("{} is unavailable: {reason}", program.display())]
    DownloaderUnavailable { program: PathBuf, reason: String },

    #[error("download of {url} failed after {attempts} attempt(s)")]
    DownloadFailed { url: String, attempts: u32 },

    #[error("could not set timestamps on {}: {source}", path.display())]
    TimestampWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
