use thiserror::Error;

/// Rejection of an incoming reading. Never mutates state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    Missing { field: &'static str },

    #[error("field `{field}` is not a finite number: {value}")]
    NotANumber { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("history capacity must be at least 1")]
    ZeroCapacity,
}

/// Failure of a storage backend call.
///
/// Backends report every failure through this type instead of panicking, so callers
/// can decide whether to retry, fall back or surface the error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The backend was selected but is not configured or cannot be reached.
    #[error("{backend} backend unavailable: {reason}")]
    Unavailable { backend: &'static str, reason: String },

    #[error("{backend} backend failed: {message}")]
    Storage { backend: &'static str, message: String },

    #[error("stored value could not be decoded: {0}")]
    Codec(String),
}

impl BackendError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
