//! Error types shared across poiframe crates.

use std::path::PathBuf;

/// Top-level error type for poiframe operations.
///
/// Only [`PoiframeError::ConfigurationMissing`] aborts a batch; everything
/// else is caught at the per-recording or per-output scope and reported.
#[derive(Debug, thiserror::Error)]
pub enum PoiframeError {
    #[error("Store not initialized: {message}")]
    ConfigurationMissing { message: String },

    #[error("Input missing: {path}")]
    InputMissing { path: PathBuf },

    #[error("Invalid keyframe sequence: {message}")]
    InvalidKeyframeSequence { message: String },

    #[error("Probe failed: {message}")]
    Probe { message: String },

    #[error("Transform failed: {message}")]
    Invoker { message: String },

    #[error("Output {output_id} has no target size configured")]
    OutputConfigurationIncomplete { output_id: i64 },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using PoiframeError.
pub type PoiframeResult<T> = Result<T, PoiframeError>;

impl PoiframeError {
    pub fn configuration_missing(msg: impl Into<String>) -> Self {
        Self::ConfigurationMissing {
            message: msg.into(),
        }
    }

    pub fn invalid_keyframes(msg: impl Into<String>) -> Self {
        Self::InvalidKeyframeSequence {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe {
            message: msg.into(),
        }
    }

    pub fn invoker(msg: impl Into<String>) -> Self {
        Self::Invoker {
            message: msg.into(),
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
        }
    }

    /// Whether this error must stop the whole batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigurationMissing { .. })
    }
}
