//! Error types for the ingest crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::naming::ClassificationError;
use crate::sidecar::SidecarError;
use crate::validate::ValidationError;

/// Errors that can occur while inspecting or committing local swath files.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to list directory {path}: {message}")]
    Listing { path: PathBuf, message: String },

    #[error("Day partition missing: {0}")]
    PartitionMissing(PathBuf),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Sidecar(#[from] SidecarError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Result type for ingest operations.
pub type Result<T> = std::result::Result<T, IngestError>;
