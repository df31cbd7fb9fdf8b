//! Error types shared by all GitHub endpoints

/// Error raised by endpoint functions
///
/// Variants mirror the HTTP error classes of the real API; every operation
/// either fully succeeds or returns one of these (push rollback excepted,
/// which is documented on `push_files`).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input failed validation (400-style)
    #[error("{0}")]
    Validation(String),
    /// A referenced repository, branch, commit or path does not exist (404)
    #[error("{0}")]
    NotFound(String),
    /// The operation conflicts with the current state (409)
    #[error("{0}")]
    Conflict(String),
    /// The caller is not allowed to perform the operation (403)
    #[error("{0}")]
    Forbidden(String),
    /// The input is well-formed but semantically unusable (422)
    #[error("{0}")]
    Unprocessable(String),
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

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::Unprocessable(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
