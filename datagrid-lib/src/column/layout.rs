//! Live column widths, order, pinning and visibility.

use std::collections::HashSet;

use super::AutoSizeOptions;
use super::Column;
use super::PinSide;
use super::measure_column;
use crate::error::ColumnError;
use crate::model::Row;
use crate::window::SizeAccumulator;
use crate::window::WindowRange;

/// Horizontal placement of one visible column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnOffset {
    pub key: String,
    /// Left edge, from the start of the row.
    pub left: u64,
    pub width: u32,
}

/// Ordered column state.
///
/// The order is always `[pinned-left..., unpinned..., pinned-right...]` and
/// every width stays within its column's bounds.
///
/// # Example
///
/// ```
/// use datagrid_lib::column::{Column, ColumnLayout, PinSide};
///
/// let mut layout = ColumnLayout::new(vec![
///     Column::new("a"),
///     Column::new("b").with_pin(PinSide::Left),
///     Column::new("c").with_max_width(300),
/// ])
/// .unwrap();
///
/// assert_eq!(layout.keys(), ["b", "a", "c"]);
/// assert_eq!(layout.set_width("c", 1000).unwrap(), 300);
/// ```
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    columns: Vec<Column>,
    initial: Vec<Column>,
}

fn group_rank(pin: Option<PinSide>) -> u8 {
    match pin {
        Some(PinSide::Left) => 0,
        None => 1,
        Some(PinSide::Right) => 2,
    }
}

impl ColumnLayout {
    /// Builds a layout, clamping widths and grouping pinned columns.
    pub fn new(columns: Vec<Column>) -> Result<Self, ColumnError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.key.as_str()) {
                return Err(ColumnError::Duplicate(column.key.clone()));
            }
        }

        let mut columns = columns;
        for column in &mut columns {
            column.width = column.clamp_width(column.width);
        }
        columns.sort_by_key(|column| group_rank(column.pin));

        Ok(Self {
            initial: columns.clone(),
            columns,
        })
    }

    /// All columns in display order, hidden ones included.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Keys in display order, hidden ones included.
    pub fn keys(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.key.as_str()).collect()
    }

    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.key == key)
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.key == key)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn find(&self, key: &str) -> Result<usize, ColumnError> {
        self.index_of(key)
            .ok_or_else(|| ColumnError::Unknown(key.to_string()))
    }

    fn group_bounds(&self, pin: Option<PinSide>) -> (usize, usize) {
        let rank = group_rank(pin);
        let start = self
            .columns
            .partition_point(|column| group_rank(column.pin) < rank);
        let end = self
            .columns
            .partition_point(|column| group_rank(column.pin) <= rank);
        (start, end)
    }

    // -------------------------------------------------------------------------
    // Widths
    // -------------------------------------------------------------------------

    /// Sets a column width, returning the clamped width applied.
    pub fn set_width(&mut self, key: &str, width: u32) -> Result<u32, ColumnError> {
        let index = self.find(key)?;
        let column = &mut self.columns[index];
        if !column.resizable {
            return Err(ColumnError::NotResizable(key.to_string()));
        }
        column.width = column.clamp_width(width);
        Ok(column.width)
    }

    /// Grows or shrinks a column by `delta` pixels.
    pub fn resize_by(&mut self, key: &str, delta: i64) -> Result<u32, ColumnError> {
        let current = self
            .column(key)
            .ok_or_else(|| ColumnError::Unknown(key.to_string()))?
            .width;
        let target = (i64::from(current) + delta).clamp(0, i64::from(u32::MAX));
        self.set_width(key, u32::try_from(target).unwrap_or(u32::MAX))
    }

    /// Fits a column to its header and a sample of `rows`.
    pub fn auto_size(
        &mut self,
        key: &str,
        rows: &[Row],
        options: AutoSizeOptions,
    ) -> Result<u32, ColumnError> {
        let index = self.find(key)?;
        if !self.columns[index].resizable {
            return Err(ColumnError::NotResizable(key.to_string()));
        }
        let width = measure_column(&self.columns[index], rows, options);
        self.columns[index].width = width;
        Ok(width)
    }

    // -------------------------------------------------------------------------
    // Order and pinning
    // -------------------------------------------------------------------------

    /// Moves a column to `target_index`, clamped into its pin group.
    /// Returns the index it landed on.
    pub fn reorder(&mut self, key: &str, target_index: usize) -> Result<usize, ColumnError> {
        let index = self.find(key)?;
        if !self.columns[index].reorderable {
            return Err(ColumnError::NotReorderable(key.to_string()));
        }
        let (start, end) = self.group_bounds(self.columns[index].pin);
        let target = target_index.clamp(start, end - 1);
        let column = self.columns.remove(index);
        self.columns.insert(target, column);
        Ok(target)
    }

    /// Pins or unpins a column.
    ///
    /// Pinning moves the column to the inner edge of its new group;
    /// unpinning moves it to the edge of the unpinned group next to the
    /// group it left.
    pub fn set_pin(&mut self, key: &str, side: Option<PinSide>) -> Result<(), ColumnError> {
        let index = self.find(key)?;
        if !self.columns[index].pinnable {
            return Err(ColumnError::NotPinnable(key.to_string()));
        }
        let previous = self.columns[index].pin;
        if previous == side {
            return Ok(());
        }

        let mut column = self.columns.remove(index);
        column.pin = side;
        let target = match (side, previous) {
            (Some(PinSide::Left), _) | (None, Some(PinSide::Left)) => {
                self.group_bounds(Some(PinSide::Left)).1
            }
            (Some(PinSide::Right), _) | (None, Some(PinSide::Right)) => {
                self.group_bounds(Some(PinSide::Right)).0
            }
            (None, None) => index,
        };
        self.columns.insert(target, column);
        Ok(())
    }

    pub fn set_visible(&mut self, key: &str, visible: bool) -> Result<(), ColumnError> {
        let index = self.find(key)?;
        self.columns[index].visible = visible;
        Ok(())
    }

    /// Restores the initial widths, order, pins and visibility.
    pub fn reset(&mut self) {
        self.columns = self.initial.clone();
    }

    // -------------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------------

    /// Visible columns in display order.
    pub fn visible_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|column| column.visible).collect()
    }

    /// Sum of visible widths.
    pub fn total_width(&self) -> u64 {
        self.visible_columns()
            .iter()
            .map(|column| u64::from(column.width))
            .sum()
    }

    /// Left edge of every visible column.
    pub fn column_offsets(&self) -> Vec<ColumnOffset> {
        let mut left = 0u64;
        self.visible_columns()
            .into_iter()
            .map(|column| {
                let offset = ColumnOffset {
                    key: column.key.clone(),
                    left,
                    width: column.width,
                };
                left += u64::from(column.width);
                offset
            })
            .collect()
    }

    /// Visible unpinned columns, in display order.
    pub fn scrollable_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|column| column.visible && column.pin.is_none())
            .collect()
    }

    /// Window over [`ColumnLayout::scrollable_columns`] for a horizontal
    /// scroll position. Pinned widths are taken out of the viewport first.
    pub fn visible_column_range(
        &self,
        scroll_x: u64,
        viewport_width: u64,
        overscan: usize,
    ) -> Option<WindowRange> {
        let pinned: u64 = self
            .visible_columns()
            .iter()
            .filter(|column| column.pin.is_some())
            .map(|column| u64::from(column.width))
            .sum();
        let sizes = SizeAccumulator::new(
            self.scrollable_columns()
                .iter()
                .map(|column| u64::from(column.width)),
        );
        sizes.compute_range(scroll_x, viewport_width.saturating_sub(pinned), overscan)
    }
}
