//! This module contains the error types for the persistence layer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the persistence layer.
///
/// All of them are fatal for a run. A corrupt state file is never replaced
/// automatically; the operator resets it explicitly.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The file could not be read, written or renamed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The file exists but does not hold valid JSON of the expected shape.
    #[error("Corrupt data in {path}: {source}")]
    Corrupt {
        /// The file involved.
        path: PathBuf,
        /// The decoding error.
        source: serde_json::Error,
    },

    /// The state file was written by an incompatible version.
    #[error("Unsupported state version {found} in {path}, expected {expected}")]
    UnsupportedVersion {
        /// The file involved.
        path: PathBuf,
        /// The version in the file.
        found: u32,
        /// The version this build reads.
        expected: u32,
    },

    /// An error occurred during serialization.
    #[error("Failed to serialize data: {0}")]
    SerializationError(#[from] serde_json::Error),
}
