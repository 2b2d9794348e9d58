//! Error types for the persistence layer.

use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// A data store operation failed.
    #[error("A data store operation failed: {0}")]
    OperationFailed(String),

    /// Data could not be serialized or deserialized.
    #[error("Failed to serialize or deserialize data: {0}")]
    SerializationError(String),

    /// A database migration failed.
    #[error("A data migration failed: {0}")]
    MigrationError(String),

    /// An invalid configuration or input was provided.
    #[error("An invalid configuration or input was provided: {0}")]
    InvalidInput(String),
}
