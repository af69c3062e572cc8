//! Outward notifications.
//!
//! Every [`GridState`](crate::grid::GridState) owns a broadcast channel;
//! subscribers get a [`GridEvent`] for each applied change. Slow subscribers
//! may observe `RecvError::Lagged`, which only drops notifications, never
//! state.

use crate::column::PinSide;
use crate::model::RowId;
use crate::model::Value;
use crate::query::FilterMap;
use crate::query::SortSpec;

/// Default capacity of a grid's event channel.
pub const EVENT_CAPACITY: usize = 256;

/// A change applied to the grid.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    SelectionChanged {
        added: Vec<RowId>,
        removed: Vec<RowId>,
        /// Full selection after the change, sorted.
        selected: Vec<RowId>,
    },
    CellEdited {
        row_id: RowId,
        column_key: String,
        old_value: Value,
        new_value: Value,
    },
    SortChanged {
        sort: Vec<SortSpec>,
    },
    FiltersChanged {
        filters: FilterMap,
    },
    ColumnResized {
        column_key: String,
        width: u32,
    },
    ColumnReordered {
        column_key: String,
        index: usize,
    },
    ColumnPinChanged {
        column_key: String,
        pin: Option<PinSide>,
    },
    ColumnVisibilityChanged {
        column_key: String,
        visible: bool,
    },
    /// The latest request failed; rows were kept.
    QueryError {
        request_id: String,
        message: String,
    },
    /// The latest request succeeded.
    RowsLoaded {
        request_id: String,
        row_count: usize,
    },
}

impl GridEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            GridEvent::SelectionChanged { .. } => "selection_changed",
            GridEvent::CellEdited { .. } => "cell_edited",
            GridEvent::SortChanged { .. } => "sort_changed",
            GridEvent::FiltersChanged { .. } => "filters_changed",
            GridEvent::ColumnResized { .. } => "column_resized",
            GridEvent::ColumnReordered { .. } => "column_reordered",
            GridEvent::ColumnPinChanged { .. } => "column_pin_changed",
            GridEvent::ColumnVisibilityChanged { .. } => "column_visibility_changed",
            GridEvent::QueryError { .. } => "query_error",
            GridEvent::RowsLoaded { .. } => "rows_loaded",
        }
    }
}
