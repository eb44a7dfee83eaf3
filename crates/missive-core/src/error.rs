use missive_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The requester is not one of the two conversation participants.
    #[error("not authorized to view this conversation")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid input: {0}")]
    Invalid(&'static str),

    /// Any persistence failure, including ones raised inside a hook.
    #[error(transparent)]
    Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
