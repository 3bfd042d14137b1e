use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a preview run.
///
/// Variants are grouped by the stage that raises them: configuration, filter
/// file decoding, dataset indexing, and querying. None of them are recovered
/// from; they all propagate to `main`.
#[derive(Debug, Error)]
pub enum PreviewError {
    // -- configuration --
    #[error("Unsupported modality prep string {0}")]
    UnsupportedModality(String),

    // -- filter file --
    #[error("Unable to load BIDS filter file {}", .0.display())]
    FilterFileNotFound(PathBuf),

    #[error("Unable to parse BIDS filter file {}. Check that it is valid JSON.", .path.display())]
    MalformedFilterFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // -- dataset --
    #[error("BIDS root does not exist: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("BIDS root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("'dataset_description.json' is missing from project root {}", .0.display())]
    MissingDatasetDescription(PathBuf),

    #[error("invalid dataset_description.json in {}: {reason}", .root.display())]
    InvalidDatasetDescription { root: PathBuf, reason: String },

    #[error("unable to read participants table {}", .path.display())]
    ParticipantsTable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error walking dataset")]
    Walk(#[from] walkdir::Error),

    // -- query --
    #[error("'{entity}' in bucket '{bucket}' is not a recognized entity")]
    UnknownEntity { bucket: String, entity: String },

    #[error("bucket '{bucket}' may not constrain '{entity}'; it is set from the command line")]
    ConflictingEntity { bucket: String, entity: String },
}

pub type Result<T> = std::result::Result<T, PreviewError>;

impl PreviewError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PreviewError::Io {
            path: path.into(),
            source,
        }
    }
}
