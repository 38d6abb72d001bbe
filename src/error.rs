//! Custom error types for zoompaint.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the zoompaint library.
#[derive(Error, Debug)]
pub enum Error {
    /// An argument is outside the range the operation accepts.
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to download a model.
    #[error("failed to download model {name}: {source}")]
    ModelDownload {
        name: String,
        #[source]
        source: reqwest::Error,
    },

    /// Failed to load an ONNX model.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// A model file is not in the cache and downloads are disabled.
    #[error("model file {path} is missing and downloads are disabled")]
    ModelMissing { path: PathBuf },

    /// Failed to load the prompt tokenizer or to tokenize a prompt.
    #[error("tokenizer error: {reason}")]
    Tokenizer { reason: String },

    /// Model inference failed.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// Failed to create cache directory.
    #[error("failed to create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from the inpainting model rather than from
    /// the caller's arguments or the filesystem.
    #[must_use]
    pub const fn is_model_error(&self) -> bool {
        matches!(
            self,
            Self::ModelDownload { .. }
                | Self::ModelLoad { .. }
                | Self::ModelMissing { .. }
                | Self::Tokenizer { .. }
                | Self::Inference { .. }
                | Self::ShapeMismatch { .. }
        )
    }
}

/// Result type alias for zoompaint operations.
pub type Result<T> = std::result::Result<T, Error>;
