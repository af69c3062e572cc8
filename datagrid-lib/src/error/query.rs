//! Backend query errors

/// A data source reported a failed query.
///
/// Surfaced as the grid's `query_error`; the previous rows are retained and
/// the query is not retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    /// Message reported by the source.
    pub message: String,
}

impl QueryError {
    /// Creates a new query error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
