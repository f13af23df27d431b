//
// error.rs
// dcm-bids
//
// Error taxonomy shared by every pipeline step: missing input, external tool failures, and output validation.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Nothing to work on: no matching directory, no DICOM files, no converter output.
    #[error("no matching input: {0}")]
    NoMatchingInput(String),
    #[error(
        "session directory {path} does not match the expected shape {expected}",
        path = path.display()
    )]
    InvalidSessionDir { path: PathBuf, expected: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("only one subject per invocation is supported, got {0}")]
    TooManySubjects(usize),

    #[error("failed to launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("output validation failed: {0}")]
    OutputValidation(String),

    #[error("I/O error at {path}: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read DICOM file {path}: {message}", path = path.display())]
    Dicom { path: PathBuf, message: String },
    #[error("failed to read NIfTI file {path}: {source}", path = path.display())]
    Nifti {
        path: PathBuf,
        #[source]
        source: nifti::error::NiftiError,
    },
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    /// Attach the offending path to an I/O error.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
