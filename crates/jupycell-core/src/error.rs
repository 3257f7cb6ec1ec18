//! Error types for jupycell-core.

use thiserror::Error;

/// Result type for jupycell-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in jupycell-core.
#[derive(Debug, Error)]
pub enum Error {
    /// The kernel channel could not be started.
    #[error("kernel unavailable: {0}")]
    ChannelUnavailable(String),

    /// Communication with a running kernel failed.
    #[error("kernel channel error: {0}")]
    Channel(String),

    /// Serialization error on the kernel wire.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A cell with this number already exists.
    #[error("Cell number already exists. Use 'edit' to modify it.")]
    DuplicateCell(i64),

    /// No cell with this number exists.
    #[error("Cell number does not exist.")]
    UnknownCell(i64),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
