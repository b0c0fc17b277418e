//! Error types shared across Stride crates.
//!
//! The analysis core never fails a frame; these errors belong to the
//! surfaces around it (recordings, configuration, reports).

use std::path::PathBuf;

/// Top-level error type for Stride operations.
#[derive(Debug, thiserror::Error)]
pub enum StrideError {
    #[error("Invalid input: {message}")]
    Input { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using StrideError.
pub type StrideResult<T> = Result<T, StrideError>;

impl StrideError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
