//! Grid configuration

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::column::AutoSizeOptions;
use crate::error::GridError;
use crate::query::Pagination;
use crate::query::PaginationMode;
use crate::selection::SelectionMode;

/// Behavior settings for a [`GridState`](crate::grid::GridState).
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes.
///
/// # Example
///
/// ```
/// use datagrid_lib::config::GridConfig;
/// use datagrid_lib::selection::SelectionMode;
///
/// let config = GridConfig::default()
///     .with_debounce_ms(150)
///     .with_selection_mode(SelectionMode::Single)
///     .with_editable(true);
///
/// let parsed = GridConfig::from_json(r#"{"overscan": 10, "pageSize": null}"#).unwrap();
/// assert_eq!(parsed.overscan, 10);
/// assert_eq!(parsed.page_size, None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridConfig {
    /// Quiet period before user filter and search edits are dispatched.
    ///
    /// Default: 300
    pub debounce_ms: u64,

    /// Rows rendered beyond each edge of the viewport.
    ///
    /// Default: 5
    pub overscan: usize,

    /// Uniform row height in pixels.
    ///
    /// Default: 32
    pub row_height: u64,

    /// Rows per page; `None` loads everything at once.
    ///
    /// Default: 100
    pub page_size: Option<usize>,

    /// Paging style used when `page_size` is set.
    ///
    /// Default: offset
    pub pagination: PaginationMode,

    /// Default: multiple
    pub selection_mode: SelectionMode,

    /// Whether cells can be edited at all.
    ///
    /// Default: false
    pub editable: bool,

    /// Rows measured by column auto-sizing.
    ///
    /// Default: 100
    pub auto_size_sample: usize,

    /// Pixels per display column when auto-sizing.
    ///
    /// Default: 8
    pub char_width: u32,

    /// Pixels added around auto-sized content.
    ///
    /// Default: 16
    pub cell_padding: u32,

    /// Prefix of request ids.
    ///
    /// Default: a random UUID per config
    pub request_id_prefix: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            overscan: 5,
            row_height: 32,
            page_size: Some(100),
            pagination: PaginationMode::Offset,
            selection_mode: SelectionMode::Multiple,
            editable: false,
            auto_size_sample: 100,
            char_width: 8,
            cell_padding: 16,
            request_id_prefix: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl GridConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON config; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, GridError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn with_row_height(mut self, height: u64) -> Self {
        self.row_height = height;
        self
    }

    /// Sets the page size; `None` disables paging.
    pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pagination(mut self, mode: PaginationMode) -> Self {
        self.pagination = mode;
        self
    }

    pub fn with_selection_mode(mut self, mode: SelectionMode) -> Self {
        self.selection_mode = mode;
        self
    }

    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn with_auto_size_sample(mut self, sample: usize) -> Self {
        self.auto_size_sample = sample;
        self
    }

    pub fn with_request_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.request_id_prefix = prefix.into();
        self
    }

    /// Debounce delay as a `Duration`.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// First-page pagination for the configured mode and size.
    pub fn initial_pagination(&self) -> Pagination {
        pagination_for(self.pagination, self.page_size)
    }

    /// Auto-size parameters.
    pub fn auto_size_options(&self) -> AutoSizeOptions {
        AutoSizeOptions {
            sample: self.auto_size_sample,
            char_width: self.char_width,
            padding: self.cell_padding,
        }
    }
}

/// First page of `mode` with `page_size` rows, or no paging.
pub fn pagination_for(mode: PaginationMode, page_size: Option<usize>) -> Pagination {
    match (page_size, mode) {
        (None, _) => Pagination::None,
        (Some(limit), PaginationMode::Offset) => Pagination::Offset { offset: 0, limit },
        (Some(limit), PaginationMode::Cursor) => Pagination::Cursor {
            cursor: None,
            limit,
        },
        (Some(limit), PaginationMode::Range) => Pagination::Range {
            start_index: 0,
            end_index: limit,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GridConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.overscan, 5);
        assert_eq!(
            config.initial_pagination(),
            Pagination::Offset {
                offset: 0,
                limit: 100
            }
        );
        assert!(!config.editable);
        assert_ne!(
            GridConfig::default().request_id_prefix,
            config.request_id_prefix
        );
    }

    #[test]
    fn test_from_json_partial() {
        let config = GridConfig::from_json(
            r#"{"debounceMs": 50, "selectionMode": "single", "pagination": "cursor", "requestIdPrefix": "g"}"#,
        )
        .unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.selection_mode, SelectionMode::Single);
        assert_eq!(config.request_id_prefix, "g");
        assert_eq!(
            config.initial_pagination(),
            Pagination::Cursor {
                cursor: None,
                limit: 100
            }
        );
    }

    #[test]
    fn test_from_json_invalid() {
        let err = GridConfig::from_json(r#"{"overscan": "lots"}"#).unwrap_err();
        assert!(matches!(err, GridError::Config(_)));
        assert!(err.is_configuration());
    }
}
