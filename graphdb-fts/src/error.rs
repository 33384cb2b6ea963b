use thiserror::Error;

pub type Result<T> = std::result::Result<T, FtsError>;

/// Errors the full-text index can raise. Most failures bottom out in the
/// store's own error type; a handful are specific to query syntax.
#[derive(Debug, Error)]
pub enum FtsError {
    #[error("full-text query error: {message}")]
    InvalidQuery { message: String },

    #[error(transparent)]
    Backend(#[from] graphdb_api::Error),
}

impl FtsError {
    pub fn invalid_query(message: impl Into<String>) -> Self {
        FtsError::InvalidQuery { message: message.into() }
    }
}
