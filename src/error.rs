//! Fatal error types for a collection run.
//!
//! Per-location failures live in [`crate::model::FeedError`]; everything here
//! stops the run and surfaces as a non-zero exit.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("cannot open location source {path}: {reason}")]
    SourceOpen { path: PathBuf, reason: String },

    #[error("cannot read layer '{layer}' from {path}: {reason}")]
    LayerNotFound {
        path: PathBuf,
        layer: String,
        reason: String,
    },

    #[error("unsupported location source {path}: {reason}")]
    UnsupportedSource { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write dataset {path}: {reason}")]
    Persist { path: PathBuf, reason: String },
}

impl CollectorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CollectorError>;
