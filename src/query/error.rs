//! Errors surfaced by the query layer.

use thiserror::Error;

pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Error, Debug)]
pub enum QueryError {
    /// Transport or provider failure on a read.
    #[error("query on `{table}` failed: {detail}")]
    RemoteQuery { table: String, detail: String },

    /// A single-row fetch matched zero rows or more than one.
    #[error("expected exactly one row in `{table}`: {detail}")]
    NotFoundOrAmbiguous { table: String, detail: String },

    /// Insert/update/delete refused (constraint, policy, missing row) or lost.
    #[error("write to `{table}` rejected: {detail}")]
    WriteRejected { table: String, detail: String },

    /// Caught before reaching the provider: bad identifier, non-scalar filter
    /// value, empty patch.
    #[error("invalid query input: {0}")]
    InvalidInput(String),

    /// A row came back but does not have the expected shape.
    #[error("row from `{table}` does not decode: {detail}")]
    Decode { table: String, detail: String },
}

impl QueryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryError::NotFoundOrAmbiguous { .. })
    }
}
