//! The top-level error type: a thin wrapper converging the storage, query,
//! and full-text crates' errors into one type for callers of [`crate::Db`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Backend(#[from] graphdb_api::Error),

    #[error(transparent)]
    Query(#[from] graphdb_query::QueryError),

    #[error(transparent)]
    Fts(#[from] graphdb_fts::FtsError),
}
