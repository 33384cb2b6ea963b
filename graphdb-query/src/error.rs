//! Error and result types for the query crate: parse failures carry the
//! byte position they were detected at, evaluation failures carry the
//! clause text being evaluated when they failed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("parse error at position {position}: {message}")]
    Parse { message: String, position: usize },

    #[error("evaluation error in `{clause}`: {message}")]
    Eval { message: String, clause: String },

    #[error(transparent)]
    Backend(#[from] graphdb_api::Error),
}

impl QueryError {
    pub fn parse(message: impl Into<String>, position: usize) -> Self {
        QueryError::Parse {
            message: message.into(),
            position,
        }
    }

    pub fn eval(message: impl Into<String>, clause: impl Into<String>) -> Self {
        QueryError::Eval {
            message: message.into(),
            clause: clause.into(),
        }
    }
}
