//! Column layout errors

/// Errors raised by column layout operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColumnError {
    /// No column has this key.
    #[error("Unknown column '{0}'")]
    Unknown(String),

    /// The column cannot be resized.
    #[error("Column '{0}' is not resizable")]
    NotResizable(String),

    /// The column cannot be reordered.
    #[error("Column '{0}' is not reorderable")]
    NotReorderable(String),

    /// The column cannot be pinned.
    #[error("Column '{0}' is not pinnable")]
    NotPinnable(String),

    /// The column cannot be sorted.
    #[error("Column '{0}' is not sortable")]
    NotSortable(String),

    /// The column cannot be filtered.
    #[error("Column '{0}' is not filterable")]
    NotFilterable(String),

    /// Two columns share a key.
    #[error("Duplicate column key '{0}'")]
    Duplicate(String),
}
