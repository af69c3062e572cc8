//! Edit session errors

use crate::model::RowId;

/// Errors raised by edit session operations.
///
/// Validation and persistence failures are not errors of this type: they
/// annotate the open session instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    /// Editing is disabled for the grid.
    #[error("Grid is not editable")]
    GridNotEditable,

    /// The column is not editable.
    #[error("Column '{0}' is not editable")]
    ColumnNotEditable(String),

    /// No column has this key.
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    /// The row is not in the current row set.
    #[error("Row '{0}' not found")]
    RowNotFound(RowId),

    /// There is no open edit session.
    #[error("No edit session is open")]
    NoSession,

    /// A commit is in progress.
    #[error("Edit session is saving")]
    Saving,
}
