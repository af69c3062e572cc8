//! Query request and response shapes exchanged with a data source.

use serde::Deserialize;
use serde::Serialize;

use super::filter::Filter;
use super::order::SortSpec;
use crate::error::QueryError;
use crate::model::Row;

/// Pagination mode a data source can support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    #[default]
    Offset,
    Cursor,
    Range,
}

/// Pagination part of a request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Pagination {
    /// Everything at once.
    #[default]
    None,
    /// `limit` rows starting at `offset`.
    Offset { offset: usize, limit: usize },
    /// `limit` rows after an opaque cursor (`None` for the first page).
    Cursor {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor: Option<String>,
        limit: usize,
    },
    /// Rows `start_index..end_index` (end exclusive).
    Range { start_index: usize, end_index: usize },
}

impl Pagination {
    /// The capability this pagination requires, if any.
    pub fn mode(&self) -> Option<PaginationMode> {
        match self {
            Pagination::None => None,
            Pagination::Offset { .. } => Some(PaginationMode::Offset),
            Pagination::Cursor { .. } => Some(PaginationMode::Cursor),
            Pagination::Range { .. } => Some(PaginationMode::Range),
        }
    }

    /// The first page of the same shape.
    pub fn first_page(&self) -> Self {
        match self {
            Pagination::None => Pagination::None,
            Pagination::Offset { limit, .. } => Pagination::Offset {
                offset: 0,
                limit: *limit,
            },
            Pagination::Cursor { limit, .. } => Pagination::Cursor {
                cursor: None,
                limit: *limit,
            },
            Pagination::Range {
                start_index,
                end_index,
            } => Pagination::Range {
                start_index: 0,
                end_index: end_index.saturating_sub(*start_index),
            },
        }
    }

    /// Row position of the first row of this page.
    pub fn start(&self) -> usize {
        match self {
            Pagination::Offset { offset, .. } => *offset,
            Pagination::Range { start_index, .. } => *start_index,
            Pagination::None | Pagination::Cursor { .. } => 0,
        }
    }

    /// Maximum rows in this page, `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Pagination::None => None,
            Pagination::Offset { limit, .. } | Pagination::Cursor { limit, .. } => Some(*limit),
            Pagination::Range {
                start_index,
                end_index,
            } => Some(end_index.saturating_sub(*start_index)),
        }
    }
}

/// Free-text search over some or all fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSpec {
    pub query: String,
    /// Fields to search; `None` searches every field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl SearchSpec {
    /// Searches every field.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            fields: None,
        }
    }

    /// Restricts the search to the given fields.
    pub fn in_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Case-insensitive substring match over the selected fields.
    pub fn matches(&self, row: &Row) -> bool {
        let needle = self.query.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let hit = |value: &crate::model::Value| {
            value.to_display_string().to_lowercase().contains(&needle)
        };
        match &self.fields {
            Some(fields) => fields
                .iter()
                .filter_map(|field| row.get(field))
                .any(hit),
            None => row.fields().values().any(hit),
        }
    }
}

/// A versioned query dispatched to a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridQueryRequest {
    pub version: u64,
    pub request_id: String,
    pub pagination: Pagination,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSpec>,
}

/// Successful query payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridQueryResponse {
    pub rows: Vec<Row>,
    /// Total rows matching the query across all pages, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
    /// Cursor for the next page in cursor pagination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl GridQueryResponse {
    /// Creates a response holding `rows`.
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Sets the total row count.
    pub fn with_row_count(mut self, count: usize) -> Self {
        self.row_count = Some(count);
        self
    }

    /// Sets whether more rows are available.
    pub fn with_has_more(mut self, has_more: bool) -> Self {
        self.has_more = Some(has_more);
        self
    }

    /// Sets the next-page cursor.
    pub fn with_next_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.next_cursor = Some(cursor.into());
        self
    }
}

/// Outcome of `DataSource::get_rows`.
pub type QueryResult = Result<GridQueryResponse, QueryError>;
