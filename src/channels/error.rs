//! This module contains the error types for channel stubs.

use thiserror::Error;

/// Errors a channel stub can raise while handing off a message.
///
/// The router turns these into `skipped` delivery records with reason
/// `delivery_failed`; they never abort a run.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The outbox message could not be written.
    #[error("Failed to write outbox message: {0}")]
    Io(#[from] std::io::Error),

    /// The outbox message could not be serialized.
    #[error("Failed to serialize outbox message: {0}")]
    Serialization(#[from] serde_json::Error),
}
