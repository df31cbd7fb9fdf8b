//! Error types shared by all Gmail endpoints

/// Error raised by endpoint functions
///
/// Every operation either fully succeeds or returns one of these before any
/// mutation is committed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input failed validation (bad shape, bad value, size limit, ...)
    #[error("{0}")]
    Validation(String),
    /// A referenced user, message, thread or draft does not exist
    #[error("{0}")]
    NotFound(String),
    /// The operation conflicts with the current state of the store
    #[error("{0}")]
    Conflict(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
