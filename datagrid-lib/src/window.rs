//! Viewport windowing.
//!
//! Computes which contiguous row range must be materialized for a scroll
//! position. Uniform row sizes are O(1) arithmetic; variable sizes go through
//! a [`SizeAccumulator`] of prefix sums with O(log n) lookup.
//!
//! All sizes and offsets are in the presentation layer's units (pixels,
//! terminal cells, ...).

use std::ops::Range;

/// The rows to materialize for one viewport position.
///
/// `end_index` is inclusive. `offset_top` is the scroll offset at which row
/// `start_index` begins, i.e. the padding to place above the first
/// materialized row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRange {
    pub start_index: usize,
    pub end_index: usize,
    pub offset_top: u64,
}

impl WindowRange {
    /// Number of rows in the window.
    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// A window always holds at least one row.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns `true` if `index` is materialized.
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start_index && index <= self.end_index
    }

    /// Half-open index range, convenient for slicing.
    pub fn as_range(&self) -> Range<usize> {
        self.start_index..self.end_index + 1
    }
}

/// Computes the window for uniformly sized rows.
///
/// Covers every row intersecting `[scroll_offset, scroll_offset +
/// viewport_size)` plus `overscan` rows on each side, clamped to
/// `[0, item_count)`. Returns `None` when there are no rows.
///
/// A zero `item_size` is treated as 1. A `scroll_offset` past the end of the
/// content clamps to the last row.
///
/// # Example
///
/// ```
/// use datagrid_lib::window::compute_range;
///
/// let range = compute_range(100, 50, 1000, 10, 2).unwrap();
/// assert_eq!(range.start_index, 8);
/// assert_eq!(range.end_index, 16);
/// assert_eq!(range.offset_top, 80);
/// ```
pub fn compute_range(
    scroll_offset: u64,
    viewport_size: u64,
    item_count: usize,
    item_size: u64,
    overscan: usize,
) -> Option<WindowRange> {
    if item_count == 0 {
        return None;
    }
    let item_size = item_size.max(1);
    let last = item_count - 1;

    let first_visible = ((scroll_offset / item_size) as usize).min(last);
    let viewport_end = scroll_offset.saturating_add(viewport_size.saturating_sub(1));
    let last_visible = ((viewport_end / item_size) as usize).clamp(first_visible, last);

    let start_index = first_visible.saturating_sub(overscan);
    let end_index = last_visible.saturating_add(overscan).min(last);

    let range = WindowRange {
        start_index,
        end_index,
        offset_top: start_index as u64 * item_size,
    };
    log::trace!(
        "[window] offset={} viewport={} count={} -> {}..={}",
        scroll_offset,
        viewport_size,
        item_count,
        range.start_index,
        range.end_index
    );
    Some(range)
}

/// Alignment used when scrolling a row into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    /// Row at the top of the viewport.
    Start,
    /// Row at the bottom of the viewport.
    End,
    /// Scroll only when the row is outside the viewport, by the minimum amount.
    #[default]
    Auto,
}

/// Returns the scroll offset that brings the row spanning
/// `[row_start, row_end)` into view.
///
/// The result is clamped to `[0, total_size - viewport_size]`.
pub fn scroll_offset_for_span(
    row_start: u64,
    row_end: u64,
    align: Align,
    current_offset: u64,
    viewport_size: u64,
    total_size: u64,
) -> u64 {
    let max_offset = total_size.saturating_sub(viewport_size);
    let target = match align {
        Align::Start => row_start,
        Align::End => row_end.saturating_sub(viewport_size),
        Align::Auto => {
            if row_start < current_offset {
                row_start
            } else if row_end > current_offset.saturating_add(viewport_size) {
                row_end.saturating_sub(viewport_size)
            } else {
                current_offset
            }
        }
    };
    target.min(max_offset)
}

/// Prefix sums over variable row sizes.
///
/// `prefix[i]` is the offset at which row `i` starts; `prefix[len]` is the
/// total content size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeAccumulator {
    prefix: Vec<u64>,
}

impl SizeAccumulator {
    /// Builds the accumulator from per-row sizes. Zero sizes count as 1.
    pub fn new(sizes: impl IntoIterator<Item = u64>) -> Self {
        let mut prefix = vec![0];
        let mut total = 0u64;
        for size in sizes {
            total = total.saturating_add(size.max(1));
            prefix.push(total);
        }
        Self { prefix }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.prefix.len() - 1
    }

    /// Returns `true` if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total content size.
    pub fn total_size(&self) -> u64 {
        self.prefix[self.prefix.len() - 1]
    }

    /// Size of row `index`.
    pub fn size_of(&self, index: usize) -> Option<u64> {
        (index < self.len()).then(|| self.prefix[index + 1] - self.prefix[index])
    }

    /// Offset at which row `index` starts. Indices past the end map to the
    /// total size.
    pub fn offset_of(&self, index: usize) -> u64 {
        self.prefix[index.min(self.len())]
    }

    /// Index of the row containing `offset`, clamped to the last row.
    pub fn index_at(&self, offset: u64) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        // First row whose end lies beyond `offset`.
        let index = self.prefix[1..].partition_point(|&end| end <= offset);
        Some(index.min(self.len() - 1))
    }

    /// Updates the size of one row. O(n) in the rows after `index`.
    pub fn set_size(&mut self, index: usize, size: u64) {
        let Some(old) = self.size_of(index) else {
            return;
        };
        let size = size.max(1);
        if size == old {
            return;
        }
        for end in &mut self.prefix[index + 1..] {
            *end = *end - old + size;
        }
    }

    /// Same contract as [`compute_range`], for variable row sizes.
    pub fn compute_range(
        &self,
        scroll_offset: u64,
        viewport_size: u64,
        overscan: usize,
    ) -> Option<WindowRange> {
        let first_visible = self.index_at(scroll_offset)?;
        let viewport_end = scroll_offset.saturating_add(viewport_size.saturating_sub(1));
        let last_visible = self
            .index_at(viewport_end)
            .unwrap_or(first_visible)
            .max(first_visible);

        let start_index = first_visible.saturating_sub(overscan);
        let end_index = last_visible.saturating_add(overscan).min(self.len() - 1);
        Some(WindowRange {
            start_index,
            end_index,
            offset_top: self.offset_of(start_index),
        })
    }

    /// Scroll offset bringing row `index` into view.
    pub fn scroll_offset_for_index(
        &self,
        index: usize,
        align: Align,
        current_offset: u64,
        viewport_size: u64,
    ) -> u64 {
        let index = index.min(self.len().saturating_sub(1));
        scroll_offset_for_span(
            self.offset_of(index),
            self.offset_of(index + 1),
            align,
            current_offset,
            viewport_size,
            self.total_size(),
        )
    }
}
