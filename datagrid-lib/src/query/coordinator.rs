//! Versioned query bookkeeping.
//!
//! [`QueryCoordinator`] owns the dispatched configuration, the request
//! counters and the authoritative row set. It performs no I/O: the grid asks
//! it for a request, sends that request to the data source, and hands the
//! result back through [`QueryCoordinator::complete`]. Only the response to
//! the most recently issued request is applied ("last request wins").

use std::sync::Arc;

use super::capabilities::Capabilities;
use super::filter::FilterMap;
use super::order::SortSpec;
use super::request::GridQueryRequest;
use super::request::Pagination;
use super::request::QueryResult;
use super::request::SearchSpec;
use crate::error::CapabilityError;
use crate::error::QueryError;
use crate::model::Row;

/// The query-shaping part of the grid state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryState {
    pub sort: Vec<SortSpec>,
    pub filters: FilterMap,
    pub search: Option<SearchSpec>,
    pub pagination: Pagination,
}

impl QueryState {
    /// Creates a state with the given pagination and nothing else.
    pub fn with_pagination(pagination: Pagination) -> Self {
        Self {
            pagination,
            ..Self::default()
        }
    }

    /// Returns `true` if `other` differs only in pagination.
    pub fn same_query(&self, other: &QueryState) -> bool {
        self.sort == other.sort && self.filters == other.filters && self.search == other.search
    }

    fn to_request(&self, version: u64, request_id: String) -> GridQueryRequest {
        GridQueryRequest {
            version,
            request_id,
            pagination: self.pagination.clone(),
            sort: self.sort.clone(),
            filters: self.filters.to_filters(),
            search: self
                .search
                .clone()
                .filter(|search| !search.query.is_empty()),
        }
    }
}

/// Per-grid request id generator: `"{prefix}-{n}"`.
#[derive(Debug, Clone)]
pub struct RequestIds {
    prefix: String,
    next: u64,
}

impl RequestIds {
    /// Creates a generator starting at 1.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }

    /// The id the next call to [`RequestIds::advance`] returns.
    pub fn peek(&self) -> String {
        format!("{}-{}", self.prefix, self.next)
    }

    /// Returns a fresh id.
    pub fn advance(&mut self) -> String {
        let id = self.peek();
        self.next += 1;
        id
    }
}

/// What happened to a response handed to [`QueryCoordinator::complete`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// Superseded by a newer request; ignored.
    Stale,
    /// Rows replaced.
    Loaded { row_count: usize },
    /// The source failed; previous rows retained.
    Failed(QueryError),
}

/// Request versioning and response reconciliation.
#[derive(Debug)]
pub struct QueryCoordinator {
    ids: RequestIds,
    version: u64,
    latest_request_id: Option<String>,
    state: QueryState,
    rows: Arc<Vec<Row>>,
    rows_generation: u64,
    rows_start: usize,
    counts_rows: bool,
    total_row_count: Option<usize>,
    has_more: bool,
    next_cursor: Option<String>,
    cursor_history: Vec<Option<String>>,
    query_error: Option<QueryError>,
    is_loading: bool,
}

impl QueryCoordinator {
    /// Creates a coordinator with an initial configuration and no data.
    pub fn new(ids: RequestIds, state: QueryState) -> Self {
        Self {
            ids,
            version: 0,
            latest_request_id: None,
            state,
            rows: Arc::new(Vec::new()),
            rows_generation: 0,
            rows_start: 0,
            counts_rows: true,
            total_row_count: None,
            has_more: false,
            next_cursor: None,
            cursor_history: Vec::new(),
            query_error: None,
            is_loading: false,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The configuration of the latest dispatch.
    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Current configuration generation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Id of the latest dispatched request.
    pub fn latest_request_id(&self) -> Option<&str> {
        self.latest_request_id.as_deref()
    }

    /// The authoritative row set.
    pub fn rows(&self) -> &Arc<Vec<Row>> {
        &self.rows
    }

    /// Bumped every time the row set is replaced or mutated.
    pub fn rows_generation(&self) -> u64 {
        self.rows_generation
    }

    /// Absolute position of the first displayed row in the query's order.
    pub fn rows_start(&self) -> usize {
        self.rows_start
    }

    /// Total matching rows across all pages, when known.
    pub fn total_row_count(&self) -> Option<usize> {
        self.total_row_count
    }

    /// Whether another page is available.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Cursor of the next page in cursor pagination.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    /// Error of the latest completed request, if it failed.
    pub fn query_error(&self) -> Option<&QueryError> {
        self.query_error.as_ref()
    }

    /// Whether the latest request is still in flight.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Validates a candidate configuration without committing it.
    pub fn check(
        &self,
        state: &QueryState,
        source_name: &str,
        capabilities: &Capabilities,
    ) -> Result<(), CapabilityError> {
        let request = state.to_request(self.version + 1, self.ids.peek());
        capabilities.validate(source_name, &request)
    }

    /// Commits `state` as the new configuration and returns the request to
    /// dispatch. Every in-flight request becomes stale.
    ///
    /// On a capability error nothing changes.
    pub fn begin(
        &mut self,
        state: QueryState,
        source_name: &str,
        capabilities: &Capabilities,
    ) -> Result<GridQueryRequest, CapabilityError> {
        let request = state.to_request(self.version + 1, self.ids.peek());
        capabilities.validate(source_name, &request)?;

        self.track_cursor(&state);
        self.ids.advance();
        self.version = request.version;
        self.latest_request_id = Some(request.request_id.clone());
        self.state = state;
        self.counts_rows = capabilities.row_count;
        self.is_loading = true;
        log::debug!(
            "[query] dispatch {} (version {}) to '{}'",
            request.request_id,
            request.version,
            source_name
        );
        Ok(request)
    }

    /// Re-issues the current configuration under a new id and version.
    ///
    /// Cursor history survives: the same page is requested again.
    pub fn refresh(
        &mut self,
        source_name: &str,
        capabilities: &Capabilities,
    ) -> Result<GridQueryRequest, CapabilityError> {
        self.begin(self.state.clone(), source_name, capabilities)
    }

    fn track_cursor(&mut self, next: &QueryState) {
        if !self.state.same_query(next) {
            self.cursor_history.clear();
            return;
        }
        let (
            Pagination::Cursor { cursor: current, .. },
            Pagination::Cursor { cursor: target, .. },
        ) = (&self.state.pagination, &next.pagination)
        else {
            return;
        };
        if target.is_none() {
            self.cursor_history.clear();
        } else if target.is_some() && *target == self.next_cursor {
            self.cursor_history.push(current.clone());
        } else if self.cursor_history.last() == Some(target) {
            self.cursor_history.pop();
        }
    }

    /// Applies a response if it belongs to the latest request.
    pub fn complete(&mut self, request_id: &str, result: QueryResult) -> ResponseOutcome {
        if self.latest_request_id.as_deref() != Some(request_id) {
            log::debug!("[query] discarding stale response {}", request_id);
            return ResponseOutcome::Stale;
        }
        self.is_loading = false;

        match result {
            Ok(response) => {
                let cursor = matches!(self.state.pagination, Pagination::Cursor { .. });
                let limit = self.state.pagination.limit();
                let start = match limit {
                    Some(limit) if cursor => self.cursor_history.len() * limit,
                    _ => self.state.pagination.start(),
                };
                let len = response.rows.len();

                // Counts from a source that does not declare them are ignored.
                let reported = response.row_count.filter(|_| self.counts_rows);
                self.total_row_count = reported.or_else(|| {
                    (!cursor && response.has_more != Some(true)).then_some(start + len)
                });
                self.has_more = response.has_more.unwrap_or_else(|| match self.total_row_count {
                    Some(total) => start + len < total,
                    None => limit.is_some_and(|limit| len >= limit),
                });
                self.next_cursor = response.next_cursor;
                self.rows = Arc::new(response.rows);
                self.rows_start = start;
                self.rows_generation += 1;
                self.query_error = None;
                log::debug!("[query] {} loaded {} rows", request_id, len);
                ResponseOutcome::Loaded { row_count: len }
            }
            Err(error) => {
                log::debug!("[query] {} failed: {}", request_id, error);
                self.query_error = Some(error.clone());
                ResponseOutcome::Failed(error)
            }
        }
    }

    /// Marks every outstanding request stale without issuing a new one.
    pub fn invalidate(&mut self) {
        self.latest_request_id = None;
        self.is_loading = false;
    }

    /// Mutable access to the displayed rows (copy-on-write).
    pub fn rows_mut(&mut self) -> &mut Vec<Row> {
        self.rows_generation += 1;
        Arc::make_mut(&mut self.rows)
    }

    // -------------------------------------------------------------------------
    // Pagination helpers
    // -------------------------------------------------------------------------

    /// Configuration for the next page, if there is one.
    pub fn next_page_state(&self) -> Option<QueryState> {
        let pagination = match &self.state.pagination {
            Pagination::None => return None,
            Pagination::Offset { offset, limit } => {
                if !self.has_more {
                    return None;
                }
                Pagination::Offset {
                    offset: offset + limit,
                    limit: *limit,
                }
            }
            Pagination::Cursor { limit, .. } => Pagination::Cursor {
                cursor: Some(self.next_cursor.clone()?),
                limit: *limit,
            },
            Pagination::Range {
                start_index,
                end_index,
            } => {
                if !self.has_more {
                    return None;
                }
                let len = end_index.saturating_sub(*start_index);
                Pagination::Range {
                    start_index: *end_index,
                    end_index: end_index + len,
                }
            }
        };
        Some(QueryState {
            pagination,
            ..self.state.clone()
        })
    }

    /// Configuration for the previous page, if there is one.
    pub fn previous_page_state(&self) -> Option<QueryState> {
        let pagination = match &self.state.pagination {
            Pagination::None => return None,
            Pagination::Offset { offset, limit } => {
                if *offset == 0 {
                    return None;
                }
                Pagination::Offset {
                    offset: offset.saturating_sub(*limit),
                    limit: *limit,
                }
            }
            Pagination::Cursor { limit, .. } => Pagination::Cursor {
                cursor: self.cursor_history.last()?.clone(),
                limit: *limit,
            },
            Pagination::Range {
                start_index,
                end_index,
            } => {
                if *start_index == 0 {
                    return None;
                }
                let len = end_index.saturating_sub(*start_index);
                let start = start_index.saturating_sub(len);
                Pagination::Range {
                    start_index: start,
                    end_index: start + len,
                }
            }
        };
        Some(QueryState {
            pagination,
            ..self.state.clone()
        })
    }

    /// Zero-based index of the current page.
    pub fn page_index(&self) -> usize {
        match (&self.state.pagination, self.state.pagination.limit()) {
            (Pagination::Cursor { .. }, _) => self.cursor_history.len(),
            (_, Some(limit)) if limit > 0 => self.state.pagination.start() / limit,
            _ => 0,
        }
    }

    /// Number of pages, when the total row count is known.
    pub fn page_count(&self) -> Option<usize> {
        let total = self.total_row_count?;
        match self.state.pagination.limit() {
            Some(limit) if limit > 0 => Some(total.div_ceil(limit).max(1)),
            _ => Some(1),
        }
    }
}
