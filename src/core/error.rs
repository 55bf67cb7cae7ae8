/// Error Module
///
/// This module defines the error taxonomy for the access layer. Every
/// failure is surfaced to the immediate caller as a typed `DbError`; nothing
/// in the crate retries or swallows a backend failure.
use thiserror::Error;

/// Error type for every fallible operation in the crate.
///
/// The variants map onto what went wrong rather than where:
/// - reaching or opening the backend (`Connection`)
/// - a statement the backend rejected (`Query`)
/// - calling a result accessor before there is a result (`State`)
/// - malformed calls such as an empty field map (`InvalidArgument`)
/// - configuration loading (`Config`, `Io`)
#[derive(Error, Debug)]
pub enum DbError {
    /// The backend could not be opened or the session could not be set up.
    ///
    /// Fatal to the current operation only: the handle keeps an empty
    /// connection slot and the next call tries again.
    #[error("Connection error ({database}): {message}")]
    Connection { database: String, message: String },

    /// The backend rejected a statement. The handle stays usable.
    #[error("Failed query \"{statement}\": {message}")]
    Query { statement: String, message: String },

    /// An accessor needed a previous result that does not exist.
    #[error("State error: {0}")]
    State(String),

    /// The call itself was malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Shorthand for the error every result accessor raises before the first
    /// successful statement.
    pub(crate) fn no_query() -> Self {
        DbError::State("no query has been run".to_string())
    }
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;
