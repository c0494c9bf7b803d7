use thiserror::Error;

/// Domain failures the API layer turns into 4xx responses. Everything else
/// travelling through `anyhow` is an internal error.
#[derive(Debug, Error)]
pub enum AgoraError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
}

impl AgoraError {
    pub fn not_found(what: impl Into<String>) -> anyhow::Error {
        AgoraError::NotFound(what.into()).into()
    }

    pub fn invalid(message: impl Into<String>) -> anyhow::Error {
        AgoraError::Invalid(message.into()).into()
    }

    pub fn conflict(message: impl Into<String>) -> anyhow::Error {
        AgoraError::Conflict(message.into()).into()
    }
}
