use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single `process` call.
///
/// Nothing inside the pipeline retries or substitutes defaults; every error
/// reaches the caller, which owns the recovery policy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// A profile field cannot be represented by the engine. Raised before any
    /// stage runs, so no partial image exists.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    #[error("strength {0} is outside [0, 1]")]
    InvalidStrength(f32),

    /// The backend refused an allocation (texture too large, out of memory).
    #[error("backend resource exhaustion: {0}")]
    BackendResourceExhaustion(String),

    /// A dispatch, copy or readback failed inside the backend.
    #[error("backend internal error: {0}")]
    BackendInternal(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl PipelineError {
    pub(crate) fn profile(msg: impl Into<String>) -> Self {
        Self::InvalidProfile(msg.into())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures of the file-facing helpers used by the command-line tool.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse profile {path}: {source}")]
    Profile {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize profile: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("image codec error for {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}
