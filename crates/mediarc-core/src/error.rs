use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::media::MediaFormat;

/// Errors that abort an archive run.
///
/// Anything that is merely "could not determine a date" never shows up here;
/// extractors report that as `Ok(None)`.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Source directory not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{path} was classified as {format} but its header does not match")]
    HeaderMismatch { path: PathBuf, format: MediaFormat },

    #[error("Failed to write checkpoint {path}: {reason}")]
    Checkpoint { path: PathBuf, reason: String },

    #[error("Failed to decode image {path}: {source}")]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl ArchiveError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure modes of a single timestamp extractor.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The stream does not start with the header its sniffed format requires.
    #[error("header does not match {0}")]
    HeaderMismatch(MediaFormat),
}

impl ExtractError {
    pub fn with_path(self, path: impl Into<PathBuf>) -> ArchiveError {
        match self {
            Self::Io(source) => ArchiveError::io(path, source),
            Self::HeaderMismatch(format) => ArchiveError::HeaderMismatch {
                path: path.into(),
                format,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
