//! The grid state orchestrator.
//!
//! [`GridState`] composes the query coordinator, selection, column layout
//! and edit sessions behind one cheaply clonable handle. State lives behind
//! a `std::sync::RwLock` that is never held across an `.await`; the only
//! suspension points are the data source calls, which run on spawned tasks
//! holding a weak reference to the grid.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::Weak;

use tokio::sync::broadcast;
use tokio::sync::watch;

use crate::column::Column;
use crate::column::ColumnLayout;
use crate::column::ColumnOffset;
use crate::column::PinSide;
use crate::config::GridConfig;
use crate::config::pagination_for;
use crate::edit::CellRef;
use crate::edit::CommitFinish;
use crate::edit::CommitOutcome;
use crate::edit::CommitStart;
use crate::edit::CommitTrigger;
use crate::edit::EditManager;
use crate::edit::EditSession;
use crate::edit::adjacent_cell;
use crate::error::ColumnError;
use crate::error::EditError;
use crate::error::GridError;
use crate::error::QueryError;
use crate::events::EVENT_CAPACITY;
use crate::events::GridEvent;
use crate::model::Row;
use crate::model::RowId;
use crate::model::RowIdentity;
use crate::model::Value;
use crate::query::Debouncer;
use crate::query::Direction;
use crate::query::FilterCondition;
use crate::query::FilterMap;
use crate::query::GridQueryRequest;
use crate::query::Pagination;
use crate::query::QueryCoordinator;
use crate::query::QueryResult;
use crate::query::QueryState;
use crate::query::RequestIds;
use crate::query::ResponseOutcome;
use crate::query::SearchSpec;
use crate::query::SortSpec;
use crate::query::SortSupport;
use crate::selection::KeyCommand;
use crate::selection::SelectionChange;
use crate::selection::SelectionMode;
use crate::selection::SelectionState;
use crate::source::DataSource;
use crate::window::Align;
use crate::window::WindowRange;
use crate::window::compute_range;
use crate::window::scroll_offset_for_span;

// Row id -> position, rebuilt when the row generation changes. Positional
// ids count from the first row of the query, not of the page.
#[derive(Debug, Default)]
struct RowIndex {
    generation: Option<u64>,
    ids: Vec<RowId>,
    positions: HashMap<RowId, usize>,
}

impl RowIndex {
    fn refresh(&mut self, rows: &[Row], start: usize, generation: u64, identity: &RowIdentity) {
        if self.generation == Some(generation) {
            return;
        }
        self.ids = rows
            .iter()
            .enumerate()
            .map(|(i, row)| identity.id_of(row, start + i))
            .collect();
        self.positions = self
            .ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        self.generation = Some(generation);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Immediate,
    Debounced,
}

struct Inner {
    config: GridConfig,
    identity: RowIdentity,
    query: QueryCoordinator,
    /// User edits waiting for the debounce timer.
    draft: Option<QueryState>,
    debouncer: Debouncer,
    selection: SelectionState,
    columns: ColumnLayout,
    edits: EditManager,
    index: RowIndex,
    disposed: bool,
}

impl Inner {
    fn current_query(&self) -> QueryState {
        self.draft
            .clone()
            .unwrap_or_else(|| self.query.state().clone())
    }

    fn is_busy(&self) -> bool {
        self.query.is_loading() || self.debouncer.is_pending()
    }

    fn refresh_index(&mut self) {
        let generation = self.query.rows_generation();
        let start = self.query.rows_start();
        let rows = self.query.rows().clone();
        self.index.refresh(&rows, start, generation, &self.identity);
    }

    fn column(&self, key: &str) -> Result<&Column, ColumnError> {
        self.columns
            .column(key)
            .ok_or_else(|| ColumnError::Unknown(key.to_string()))
    }
}

struct Shared {
    state: RwLock<Inner>,
    source: Arc<dyn DataSource>,
    events: broadcast::Sender<GridEvent>,
    busy: watch::Sender<bool>,
}

/// Handle to one grid's state.
///
/// Clones share the same state. Dropping every handle releases it; tasks
/// still in flight then find nothing to update.
///
/// Operations that dispatch queries or schedule the debounce timer must run
/// inside a tokio runtime.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use datagrid_lib::column::Column;
/// use datagrid_lib::config::GridConfig;
/// use datagrid_lib::grid::GridState;
/// use datagrid_lib::source::LocalDataSource;
///
/// let source = Arc::new(LocalDataSource::new(rows));
/// let grid = GridState::new(source, vec![Column::new("name")], GridConfig::default())?;
///
/// grid.refresh()?;
/// grid.wait_for_data().await;
/// let window = grid.visible_range(0, 600);
/// ```
#[derive(Clone)]
pub struct GridState {
    shared: Arc<Shared>,
}

impl GridState {
    /// Creates a grid over `source`. Nothing is loaded until
    /// [`GridState::refresh`] or a query change.
    pub fn new(
        source: Arc<dyn DataSource>,
        columns: Vec<Column>,
        config: GridConfig,
    ) -> Result<Self, GridError> {
        let columns = ColumnLayout::new(columns)?;
        let query = QueryCoordinator::new(
            RequestIds::new(config.request_id_prefix.clone()),
            QueryState::with_pagination(config.initial_pagination()),
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (busy, _) = watch::channel(false);

        let inner = Inner {
            debouncer: Debouncer::new(config.debounce()),
            selection: SelectionState::new(config.selection_mode),
            identity: RowIdentity::default(),
            query,
            draft: None,
            columns,
            edits: EditManager::new(),
            index: RowIndex::default(),
            disposed: false,
            config,
        };
        log::debug!("[grid] created over '{}'", source.name());

        Ok(Self {
            shared: Arc::new(Shared {
                state: RwLock::new(inner),
                source,
                events,
                busy,
            }),
        })
    }

    /// Sets how rows are identified. Defaults to positional identity, where
    /// a row's id is its absolute position in the query's order (page start
    /// plus index).
    pub fn with_identity(self, identity: RowIdentity) -> Self {
        self.set_row_identity(identity);
        self
    }

    /// Replaces the row identity function.
    pub fn set_row_identity(&self, identity: RowIdentity) {
        let mut inner = self.write();
        inner.identity = identity;
        inner.index.generation = None;
        inner.refresh_index();
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.shared
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_live(&self) -> Result<RwLockWriteGuard<'_, Inner>, GridError> {
        let inner = self.write();
        if inner.disposed {
            return Err(GridError::Disposed);
        }
        Ok(inner)
    }

    fn emit(&self, events: impl IntoIterator<Item = GridEvent>) {
        for event in events {
            log::trace!("[grid] event {}", event.name());
            // No subscribers is fine.
            let _ = self.shared.events.send(event);
        }
    }

    fn publish_busy(&self, inner: &Inner) {
        self.shared.busy.send_replace(inner.is_busy());
    }

    /// Subscribes to grid events.
    pub fn subscribe(&self) -> broadcast::Receiver<GridEvent> {
        self.shared.events.subscribe()
    }

    /// The data source.
    pub fn source(&self) -> Arc<dyn DataSource> {
        self.shared.source.clone()
    }

    /// A copy of the configuration.
    pub fn config(&self) -> GridConfig {
        self.read().config.clone()
    }

    // -------------------------------------------------------------------------
    // Query dispatch
    // -------------------------------------------------------------------------

    fn spawn_query(&self, request: GridQueryRequest) {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let source = self.shared.source.clone();
        tokio::spawn(async move {
            let request_id = request.request_id.clone();
            let result = source.get_rows(request).await;
            if let Some(shared) = weak.upgrade() {
                GridState { shared }.apply_response(&request_id, result);
            }
        });
    }

    fn apply_response(&self, request_id: &str, result: QueryResult) {
        let event = {
            let mut inner = self.write();
            if inner.disposed {
                return;
            }
            let outcome = inner.query.complete(request_id, result);
            self.publish_busy(&inner);
            match outcome {
                ResponseOutcome::Stale => None,
                ResponseOutcome::Loaded { row_count } => {
                    inner.refresh_index();
                    Some(GridEvent::RowsLoaded {
                        request_id: request_id.to_string(),
                        row_count,
                    })
                }
                ResponseOutcome::Failed(error) => Some(GridEvent::QueryError {
                    request_id: request_id.to_string(),
                    message: error.message,
                }),
            }
        };
        self.emit(event);
    }

    /// Commits `state` and dispatches it.
    fn begin(&self, inner: &mut Inner, state: QueryState) -> Result<(), GridError> {
        let source = &self.shared.source;
        let request = inner
            .query
            .begin(state, source.name(), source.capabilities())?;
        self.spawn_query(request);
        Ok(())
    }

    fn fire_debounce(&self, ticket: u64) {
        let mut inner = self.write();
        if inner.disposed || !inner.debouncer.fire(ticket) {
            return;
        }
        if let Some(draft) = inner.draft.take() {
            log::debug!("[grid] debounce elapsed, dispatching");
            if let Err(e) = self.begin(&mut inner, draft) {
                log::warn!("[grid] debounced query rejected: {}", e);
            }
        }
        self.publish_busy(&inner);
    }

    fn change_query(
        &self,
        dispatch: Dispatch,
        change: impl FnOnce(&mut QueryState),
    ) -> Result<(), GridError> {
        let events = {
            let mut inner = self.write_live()?;
            let before = inner.current_query();
            let mut next = before.clone();
            change(&mut next);
            if next.filters != before.filters || next.search != before.search {
                next.pagination = next.pagination.first_page();
            }

            let source = &self.shared.source;
            inner
                .query
                .check(&next, source.name(), source.capabilities())?;

            let mut events = Vec::new();
            if next.sort != before.sort {
                events.push(GridEvent::SortChanged {
                    sort: next.sort.clone(),
                });
            }
            if next.filters != before.filters {
                events.push(GridEvent::FiltersChanged {
                    filters: next.filters.clone(),
                });
            }

            match dispatch {
                Dispatch::Immediate => {
                    inner.debouncer.cancel();
                    inner.draft = None;
                    self.begin(&mut inner, next)?;
                }
                Dispatch::Debounced => {
                    inner.draft = Some(next);
                    let weak = Arc::downgrade(&self.shared);
                    inner.debouncer.schedule(move |ticket| async move {
                        if let Some(shared) = weak.upgrade() {
                            GridState { shared }.fire_debounce(ticket);
                        }
                    });
                    log::debug!(
                        "[grid] query change debounced for {:?}",
                        inner.debouncer.delay()
                    );
                }
            }
            self.publish_busy(&inner);
            events
        };
        self.emit(events);
        Ok(())
    }

    /// Re-dispatches the current configuration under a new request id and
    /// version. A pending debounced edit is folded in.
    pub fn refresh(&self) -> Result<(), GridError> {
        let mut inner = self.write_live()?;
        if inner.draft.is_some() {
            drop(inner);
            return self.flush_pending().map(|_| ());
        }
        let source = &self.shared.source;
        let request = inner.query.refresh(source.name(), source.capabilities())?;
        self.spawn_query(request);
        self.publish_busy(&inner);
        Ok(())
    }

    /// Dispatches a pending debounced edit now. Returns `false` if nothing
    /// was pending.
    pub fn flush_pending(&self) -> Result<bool, GridError> {
        let mut inner = self.write_live()?;
        inner.debouncer.cancel();
        let Some(draft) = inner.draft.take() else {
            self.publish_busy(&inner);
            return Ok(false);
        };
        let result = self.begin(&mut inner, draft);
        self.publish_busy(&inner);
        result.map(|()| true)
    }

    /// Resolves once no request is in flight and no debounce is pending.
    pub async fn wait_for_data(&self) {
        let mut busy = self.shared.busy.subscribe();
        // The sender lives as long as `self`.
        let _ = busy.wait_for(|busy| !*busy).await;
    }

    // -------------------------------------------------------------------------
    // Sort, filter, search
    // -------------------------------------------------------------------------

    /// Current sort keys.
    pub fn sort(&self) -> Vec<SortSpec> {
        self.read().current_query().sort
    }

    /// Current filters, including edits waiting for the debounce timer.
    pub fn filters(&self) -> FilterMap {
        self.read().current_query().filters
    }

    /// Current search text.
    pub fn search(&self) -> Option<String> {
        self.read()
            .current_query()
            .search
            .map(|search| search.query)
    }

    fn check_sortable(&self, sort: &[SortSpec]) -> Result<(), GridError> {
        let inner = self.read();
        for spec in sort {
            if let Some(column) = inner.columns.column(&spec.field)
                && !column.sortable
            {
                return Err(ColumnError::NotSortable(spec.field.clone()).into());
            }
        }
        Ok(())
    }

    fn check_filterable(&self, key: &str) -> Result<(), GridError> {
        let inner = self.read();
        if let Some(column) = inner.columns.column(key)
            && !column.filterable
        {
            return Err(ColumnError::NotFilterable(key.to_string()).into());
        }
        Ok(())
    }

    /// Replaces the sort and dispatches immediately.
    pub fn set_sort(&self, sort: Vec<SortSpec>) -> Result<(), GridError> {
        self.check_sortable(&sort)?;
        self.change_query(Dispatch::Immediate, |state| state.sort = sort)
    }

    /// Cycles a column through ascending, descending and unsorted.
    ///
    /// With `additive` the column is added to or updated within the existing
    /// keys, provided the source sorts by several fields; otherwise it
    /// replaces them.
    pub fn toggle_sort(&self, column_key: &str, additive: bool) -> Result<(), GridError> {
        {
            let inner = self.read();
            let column = inner.column(column_key)?;
            if !column.sortable {
                return Err(ColumnError::NotSortable(column_key.to_string()).into());
            }
        }
        let multi = self.shared.source.capabilities().sort == SortSupport::Multi;
        let additive = additive && multi;

        self.change_query(Dispatch::Immediate, |state| {
            let position = state.sort.iter().position(|spec| spec.field == column_key);
            let next = match position.map(|i| state.sort[i].clone()) {
                None => Some(SortSpec::asc(column_key)),
                Some(spec) if spec.direction == Direction::Asc => {
                    Some(SortSpec { direction: spec.direction.reversed(), ..spec })
                }
                Some(_) => None,
            };

            if !additive {
                state.sort = next.into_iter().collect();
                return;
            }
            match (position, next) {
                (Some(i), Some(spec)) => state.sort[i] = spec,
                (Some(i), None) => {
                    state.sort.remove(i);
                }
                (None, Some(spec)) => state.sort.push(spec),
                (None, None) => {}
            }
        })
    }

    /// Sets a column filter from user input (debounced).
    pub fn set_filter(&self, column_key: &str, condition: FilterCondition) -> Result<(), GridError> {
        self.check_filterable(column_key)?;
        self.change_query(Dispatch::Debounced, |state| {
            state.filters.set(column_key, condition);
        })
    }

    /// Sets a column filter and dispatches immediately.
    pub fn set_filter_immediate(
        &self,
        column_key: &str,
        condition: FilterCondition,
    ) -> Result<(), GridError> {
        self.check_filterable(column_key)?;
        self.change_query(Dispatch::Immediate, |state| {
            state.filters.set(column_key, condition);
        })
    }

    /// Removes one column filter.
    pub fn clear_filter(&self, column_key: &str) -> Result<(), GridError> {
        self.change_query(Dispatch::Immediate, |state| {
            state.filters.remove(column_key);
        })
    }

    /// Removes every filter.
    pub fn clear_filters(&self) -> Result<(), GridError> {
        self.change_query(Dispatch::Immediate, |state| state.filters.clear())
    }

    /// Sets the search text from user input (debounced). Empty text clears
    /// the search.
    pub fn set_search(&self, query: impl Into<String>) -> Result<(), GridError> {
        let query = query.into();
        self.change_query(Dispatch::Debounced, |state| {
            let fields = state.search.take().and_then(|search| search.fields);
            state.search = (!query.is_empty()).then(|| SearchSpec { query, fields });
        })
    }

    /// Restricts search to some fields; `None` searches every field. Does
    /// nothing while no search is active.
    pub fn set_search_fields(&self, fields: Option<Vec<String>>) -> Result<(), GridError> {
        let current = self.read().current_query().search;
        if current.is_none_or(|search| search.fields == fields) {
            return Ok(());
        }
        self.change_query(Dispatch::Immediate, |state| {
            if let Some(search) = state.search.as_mut() {
                search.fields = fields;
            }
        })
    }

    pub fn clear_search(&self) -> Result<(), GridError> {
        self.change_query(Dispatch::Immediate, |state| state.search = None)
    }

    // -------------------------------------------------------------------------
    // Pagination
    // -------------------------------------------------------------------------

    /// Current pagination.
    pub fn pagination(&self) -> Pagination {
        self.read().current_query().pagination
    }

    /// Changes the page size and returns to the first page.
    pub fn set_page_size(&self, page_size: Option<usize>) -> Result<(), GridError> {
        let mode = self.read().config.pagination;
        self.change_query(Dispatch::Immediate, |state| {
            state.pagination = pagination_for(mode, page_size);
        })?;
        self.write().config.page_size = page_size;
        Ok(())
    }

    fn move_page(&self, target: impl FnOnce(&QueryCoordinator) -> Option<QueryState>) -> Result<bool, GridError> {
        if self.read().draft.is_some() {
            // The pending edit restarts paging anyway.
            return self.flush_pending();
        }
        let Some(next) = target(&self.read().query) else {
            return Ok(false);
        };
        self.change_query(Dispatch::Immediate, |state| *state = next)?;
        Ok(true)
    }

    /// Loads the next page. Returns `false` if there is none.
    pub fn next_page(&self) -> Result<bool, GridError> {
        self.move_page(QueryCoordinator::next_page_state)
    }

    /// Loads the previous page. Returns `false` if there is none.
    pub fn previous_page(&self) -> Result<bool, GridError> {
        self.move_page(QueryCoordinator::previous_page_state)
    }

    /// Jumps to a zero-based page. Cursor pagination can only jump to the
    /// first page; returns `false` otherwise.
    pub fn go_to_page(&self, page: usize) -> Result<bool, GridError> {
        let out_of_range = || GridError::PageOutOfRange(page);
        let pagination = match self.pagination() {
            Pagination::Offset { limit, .. } => Pagination::Offset {
                offset: page.checked_mul(limit).ok_or_else(out_of_range)?,
                limit,
            },
            Pagination::Range {
                start_index,
                end_index,
            } => {
                let len = end_index.saturating_sub(start_index);
                let start = page.checked_mul(len).ok_or_else(out_of_range)?;
                Pagination::Range {
                    start_index: start,
                    end_index: start.checked_add(len).ok_or_else(out_of_range)?,
                }
            }
            Pagination::Cursor { limit, .. } if page == 0 => Pagination::Cursor {
                cursor: None,
                limit,
            },
            Pagination::Cursor { .. } | Pagination::None => return Ok(false),
        };
        self.change_query(Dispatch::Immediate, |state| state.pagination = pagination)?;
        Ok(true)
    }

    pub fn page_index(&self) -> usize {
        self.read().query.page_index()
    }

    /// Number of pages, when the total row count is known.
    pub fn page_count(&self) -> Option<usize> {
        self.read().query.page_count()
    }

    // -------------------------------------------------------------------------
    // Data
    // -------------------------------------------------------------------------

    /// The displayed rows.
    pub fn rows(&self) -> Arc<Vec<Row>> {
        self.read().query.rows().clone()
    }

    /// Number of displayed rows.
    pub fn row_count(&self) -> usize {
        self.read().query.rows().len()
    }

    /// Ids of the displayed rows, in order.
    pub fn row_ids(&self) -> Vec<RowId> {
        self.read().index.ids.clone()
    }

    /// Position of a row among the displayed rows.
    pub fn position_of(&self, id: &RowId) -> Option<usize> {
        self.read().index.positions.get(id).copied()
    }

    /// A displayed row by id.
    pub fn row(&self, id: &RowId) -> Option<Row> {
        let inner = self.read();
        let position = *inner.index.positions.get(id)?;
        inner.query.rows().get(position).cloned()
    }

    pub fn total_row_count(&self) -> Option<usize> {
        self.read().query.total_row_count()
    }

    pub fn has_more(&self) -> bool {
        self.read().query.has_more()
    }

    pub fn is_loading(&self) -> bool {
        self.read().query.is_loading()
    }

    /// Error of the latest request, if it failed.
    pub fn query_error(&self) -> Option<QueryError> {
        self.read().query.query_error().cloned()
    }

    /// Configuration generation of the latest dispatch.
    pub fn version(&self) -> u64 {
        self.read().query.version()
    }

    pub fn latest_request_id(&self) -> Option<String> {
        self.read().query.latest_request_id().map(str::to_string)
    }

    // -------------------------------------------------------------------------
    // Windowing
    // -------------------------------------------------------------------------

    /// Rows to materialize for a vertical scroll position.
    pub fn visible_range(&self, scroll_offset: u64, viewport_height: u64) -> Option<WindowRange> {
        let inner = self.read();
        compute_range(
            scroll_offset,
            viewport_height,
            inner.query.rows().len(),
            inner.config.row_height,
            inner.config.overscan,
        )
    }

    /// The rows of [`GridState::visible_range`].
    pub fn visible_rows(&self, scroll_offset: u64, viewport_height: u64) -> Vec<Row> {
        let Some(range) = self.visible_range(scroll_offset, viewport_height) else {
            return Vec::new();
        };
        let rows = self.rows();
        rows.get(range.as_range()).map(<[Row]>::to_vec).unwrap_or_default()
    }

    /// Scroll offset bringing row `index` into view.
    pub fn scroll_offset_for_row(
        &self,
        index: usize,
        align: Align,
        current_offset: u64,
        viewport_height: u64,
    ) -> u64 {
        let inner = self.read();
        let height = inner.config.row_height.max(1);
        let count = inner.query.rows().len() as u64;
        let index = (index as u64).min(count.saturating_sub(1));
        scroll_offset_for_span(
            index * height,
            (index + 1) * height,
            align,
            current_offset,
            viewport_height,
            count * height,
        )
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    fn change_selection(
        &self,
        change: impl FnOnce(&mut SelectionState, &[RowId]) -> SelectionChange,
    ) -> Result<SelectionChange, GridError> {
        let (result, event) = {
            let mut inner = self.write_live()?;
            let Inner {
                selection, index, ..
            } = &mut *inner;
            let result = change(selection, &index.ids);
            let event = (!result.is_empty()).then(|| GridEvent::SelectionChanged {
                added: result.added.clone(),
                removed: result.removed.clone(),
                selected: selection.selected(),
            });
            (result, event)
        };
        self.emit(event);
        Ok(result)
    }

    /// Replaces the selection with one row.
    pub fn select(&self, id: RowId) -> Result<SelectionChange, GridError> {
        self.change_selection(|selection, _| selection.select(id))
    }

    pub fn toggle(&self, id: RowId) -> Result<SelectionChange, GridError> {
        self.change_selection(|selection, _| selection.toggle(id))
    }

    /// Ctrl/Cmd+click.
    pub fn extend(&self, id: RowId) -> Result<SelectionChange, GridError> {
        self.change_selection(|selection, _| selection.extend(id))
    }

    /// Shift+click (Ctrl+Shift+click when `additive`).
    pub fn range(&self, id: RowId, additive: bool) -> Result<SelectionChange, GridError> {
        self.change_selection(|selection, order| selection.range(id, order, additive))
    }

    pub fn select_all(&self) -> Result<SelectionChange, GridError> {
        self.change_selection(|selection, order| selection.select_all(order))
    }

    pub fn clear_selection(&self) -> Result<SelectionChange, GridError> {
        self.change_selection(|selection, _| selection.clear())
    }

    /// Applies a keyboard command to the selection.
    pub fn handle_key(&self, command: KeyCommand, shift: bool) -> Result<SelectionChange, GridError> {
        self.change_selection(|selection, order| selection.handle_key(command, shift, order))
    }

    pub fn set_selection_mode(&self, mode: SelectionMode) -> Result<SelectionChange, GridError> {
        self.change_selection(|selection, _| selection.set_mode(mode))
    }

    /// Selected ids, sorted.
    pub fn selected(&self) -> Vec<RowId> {
        self.read().selection.selected()
    }

    pub fn is_selected(&self, id: &RowId) -> bool {
        self.read().selection.is_selected(id)
    }

    /// Keyboard focus.
    pub fn focus(&self) -> Option<RowId> {
        self.read().selection.focus().cloned()
    }

    /// A copy of the selection state.
    pub fn selection(&self) -> SelectionState {
        self.read().selection.clone()
    }

    // -------------------------------------------------------------------------
    // Columns
    // -------------------------------------------------------------------------

    fn change_columns<T>(
        &self,
        change: impl FnOnce(&mut ColumnLayout) -> Result<(T, GridEvent), ColumnError>,
    ) -> Result<T, GridError> {
        let (value, event) = {
            let mut inner = self.write_live()?;
            change(&mut inner.columns)?
        };
        self.emit([event]);
        Ok(value)
    }

    /// All columns in display order.
    pub fn columns(&self) -> Vec<Column> {
        self.read().columns.columns().to_vec()
    }

    /// Visible columns in display order.
    pub fn visible_columns(&self) -> Vec<Column> {
        self.read()
            .columns
            .visible_columns()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Sets a width; returns the clamped width applied.
    pub fn set_column_width(&self, key: &str, width: u32) -> Result<u32, GridError> {
        self.change_columns(|layout| {
            let width = layout.set_width(key, width)?;
            Ok((width, resized(key, width)))
        })
    }

    pub fn resize_column(&self, key: &str, delta: i64) -> Result<u32, GridError> {
        self.change_columns(|layout| {
            let width = layout.resize_by(key, delta)?;
            Ok((width, resized(key, width)))
        })
    }

    /// Fits a column to its content, sampling the displayed rows.
    pub fn auto_size_column(&self, key: &str) -> Result<u32, GridError> {
        let rows = self.rows();
        let options = self.read().config.auto_size_options();
        self.change_columns(|layout| {
            let width = layout.auto_size(key, &rows, options)?;
            Ok((width, resized(key, width)))
        })
    }

    /// Moves a column; returns the index it landed on.
    pub fn reorder_column(&self, key: &str, target_index: usize) -> Result<usize, GridError> {
        self.change_columns(|layout| {
            let index = layout.reorder(key, target_index)?;
            let event = GridEvent::ColumnReordered {
                column_key: key.to_string(),
                index,
            };
            Ok((index, event))
        })
    }

    pub fn set_column_pin(&self, key: &str, pin: Option<PinSide>) -> Result<(), GridError> {
        self.change_columns(|layout| {
            layout.set_pin(key, pin)?;
            let event = GridEvent::ColumnPinChanged {
                column_key: key.to_string(),
                pin,
            };
            Ok(((), event))
        })
    }

    pub fn set_column_visible(&self, key: &str, visible: bool) -> Result<(), GridError> {
        self.change_columns(|layout| {
            layout.set_visible(key, visible)?;
            let event = GridEvent::ColumnVisibilityChanged {
                column_key: key.to_string(),
                visible,
            };
            Ok(((), event))
        })
    }

    /// Restores the initial column layout.
    pub fn reset_columns(&self) -> Result<(), GridError> {
        self.write_live()?.columns.reset();
        Ok(())
    }

    pub fn total_width(&self) -> u64 {
        self.read().columns.total_width()
    }

    pub fn column_offsets(&self) -> Vec<ColumnOffset> {
        self.read().columns.column_offsets()
    }

    /// Window over the scrollable columns for a horizontal scroll position.
    pub fn visible_column_range(&self, scroll_x: u64, viewport_width: u64) -> Option<WindowRange> {
        let inner = self.read();
        inner
            .columns
            .visible_column_range(scroll_x, viewport_width, inner.config.overscan)
    }

    // -------------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------------

    /// Opens an edit session on a displayed cell, discarding any other.
    /// Fails while another session is saving.
    pub fn open_edit(&self, row_id: RowId, column_key: &str) -> Result<EditSession, GridError> {
        let mut inner = self.write_live()?;
        if !inner.config.editable {
            return Err(EditError::GridNotEditable.into());
        }
        let column = inner
            .columns
            .column(column_key)
            .ok_or_else(|| EditError::UnknownColumn(column_key.to_string()))?;
        if !column.editable {
            return Err(EditError::ColumnNotEditable(column_key.to_string()).into());
        }
        let position = *inner
            .index
            .positions
            .get(&row_id)
            .ok_or_else(|| EditError::RowNotFound(row_id.clone()))?;
        let original = inner
            .query
            .rows()
            .get(position)
            .map(|row| column.value(row))
            .unwrap_or_default();

        let session = inner.edits.open(row_id, column_key, original)?;
        Ok(session.clone())
    }

    /// Updates the draft; returns the validation error, if any.
    pub fn set_edit_draft(&self, value: Value) -> Result<Option<String>, GridError> {
        let mut inner = self.write_live()?;
        let key = inner
            .edits
            .session()
            .map(|session| session.column_key.clone())
            .ok_or(EditError::NoSession)?;
        let column = inner.column(&key)?.clone();
        Ok(inner.edits.set_draft(value, &column)?)
    }

    /// Closes the session without persisting.
    pub fn cancel_edit(&self) -> Result<(), GridError> {
        self.write_live()?.edits.cancel()?;
        Ok(())
    }

    /// The open edit session.
    pub fn edit_session(&self) -> Option<EditSession> {
        self.read().edits.session().cloned()
    }

    /// Validates and persists the draft.
    ///
    /// On success the displayed row takes the new value and
    /// [`GridEvent::CellEdited`] is emitted. A source without
    /// [`MutableDataSource`](crate::source::MutableDataSource) support only
    /// updates the displayed row.
    pub async fn commit_edit(&self, trigger: CommitTrigger) -> Result<CommitOutcome, GridError> {
        let pending = {
            let mut inner = self.write_live()?;
            let key = inner
                .edits
                .session()
                .map(|session| session.column_key.clone())
                .ok_or(EditError::NoSession)?;
            let column = inner.column(&key)?.clone();
            match inner.edits.begin_commit(&column)? {
                CommitStart::Invalid(message) => return Ok(CommitOutcome::Invalid(message)),
                CommitStart::Ready(pending) => pending,
            }
        };

        let source = self.shared.source.clone();
        let result = match source.as_mutable() {
            Some(mutable) => {
                mutable
                    .update_row(&pending.row_id, &pending.column_key, pending.value.clone())
                    .await
            }
            None => Ok(()),
        };

        let (outcome, event) = {
            let mut inner = self.write();
            match inner.edits.finish_commit(pending, result) {
                CommitFinish::Discarded => (CommitOutcome::Discarded, None),
                CommitFinish::Failed(message) => {
                    log::warn!("[grid] commit failed: {}", message);
                    (CommitOutcome::Failed(message), None)
                }
                CommitFinish::Committed(done) => {
                    if let Some(&position) = inner.index.positions.get(&done.row_id) {
                        let rows = inner.query.rows_mut();
                        if let Some(row) = rows.get_mut(position) {
                            row.insert(done.column_key.clone(), done.value.clone());
                        }
                        inner.refresh_index();
                    }
                    let next = match trigger {
                        CommitTrigger::Tab { backwards } => {
                            let current = CellRef::new(
                                done.row_id.clone(),
                                done.column_key.clone(),
                            );
                            let columns = inner.columns.visible_columns();
                            adjacent_cell(&current, &columns, &inner.index.ids, backwards)
                        }
                        CommitTrigger::Blur | CommitTrigger::Enter => None,
                    };
                    let event = GridEvent::CellEdited {
                        row_id: done.row_id,
                        column_key: done.column_key,
                        old_value: done.original_value,
                        new_value: done.value,
                    };
                    (CommitOutcome::Committed { next }, Some(event))
                }
            }
        };
        self.emit(event);
        Ok(outcome)
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Tears the grid down: pending timers stop, in-flight responses are
    /// ignored and the edit session closes. Later mutations return
    /// [`GridError::Disposed`].
    pub fn dispose(&self) {
        let mut inner = self.write();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.debouncer.cancel();
        inner.draft = None;
        inner.query.invalidate();
        inner.edits.close();
        self.publish_busy(&inner);
        log::debug!("[grid] disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.read().disposed
    }
}

fn resized(key: &str, width: u32) -> GridEvent {
    GridEvent::ColumnResized {
        column_key: key.to_string(),
        width,
    }
}
