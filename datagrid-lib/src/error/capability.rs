//! Capability (configuration) errors

use crate::query::FilterOperator;
use crate::query::PaginationMode;

/// A request shape the active data source does not declare support for.
///
/// Raised synchronously before dispatch; the request is never sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// The pagination mode is not supported.
    #[error("Data source '{source_name}' does not support {mode:?} pagination")]
    Pagination {
        source_name: String,
        mode: PaginationMode,
    },

    /// The source cannot sort at all.
    #[error("Data source '{source_name}' does not support sorting")]
    Sort { source_name: String },

    /// The source sorts by one field only.
    #[error("Data source '{source_name}' supports a single sort field, got {requested}")]
    MultiSort {
        source_name: String,
        requested: usize,
    },

    /// The filter operator is not supported.
    #[error("Data source '{source_name}' does not support operator '{operator}' (field '{field}')")]
    FilterOperator {
        source_name: String,
        field: String,
        operator: FilterOperator,
    },

    /// The source cannot search.
    #[error("Data source '{source_name}' does not support search")]
    Search { source_name: String },
}
