//! In-memory data source

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::PoisonError;
use std::sync::RwLock;

use async_trait::async_trait;

use super::DataSource;
use super::MutableDataSource;
use super::SortWorker;
use crate::error::QueryError;
use crate::model::Row;
use crate::model::RowId;
use crate::model::RowIdentity;
use crate::model::Value;
use crate::query::Capabilities;
use crate::query::Filter;
use crate::query::GridQueryRequest;
use crate::query::GridQueryResponse;
use crate::query::Pagination;
use crate::query::QueryResult;
use crate::query::SearchSpec;
use crate::query::SortSpec;
use crate::query::sort_indices;

/// Default row count from which sorts move to the worker thread.
pub const DEFAULT_OFFLOAD_THRESHOLD: usize = 10_000;

/// Options for [`LocalDataSource`].
///
/// # Example
///
/// ```
/// use datagrid_lib::source::LocalSourceOptions;
///
/// let options = LocalSourceOptions::default()
///     .with_name("people")
///     .with_offload_threshold(50_000);
/// ```
#[derive(Debug, Clone)]
pub struct LocalSourceOptions {
    /// Name reported in errors and logs.
    pub name: String,
    /// Sorts over at least this many matching rows run on the worker thread.
    pub offload_threshold: usize,
    /// Set to `false` to always sort in place.
    pub offload: bool,
}

impl Default for LocalSourceOptions {
    fn default() -> Self {
        Self {
            name: "local".to_string(),
            offload_threshold: DEFAULT_OFFLOAD_THRESHOLD,
            offload: true,
        }
    }
}

impl LocalSourceOptions {
    /// Sets the source name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the offload threshold.
    pub fn with_offload_threshold(mut self, threshold: usize) -> Self {
        self.offload_threshold = threshold;
        self
    }

    /// Disables the worker thread.
    pub fn without_offload(mut self) -> Self {
        self.offload = false;
        self
    }
}

struct Data {
    rows: Arc<Vec<Row>>,
    /// Bumped by every change.
    generation: u64,
    /// Bumped when rows are replaced, which invalidates stored positions.
    layout: u64,
}

#[derive(PartialEq)]
struct ProjectionKey {
    generation: u64,
    sort: Vec<SortSpec>,
    filters: Vec<Filter>,
    search: Option<SearchSpec>,
}

struct Projection {
    key: ProjectionKey,
    layout: u64,
    indices: Arc<Vec<usize>>,
}

/// A data source over rows held in memory.
///
/// Supports every capability. Filtering, search and sorting are computed
/// once per distinct query and reused while only the page changes. Sorts
/// over many rows run on a [`SortWorker`]; if the worker is unavailable the
/// same sort runs in place.
///
/// Cursor pagination uses the decimal start position as the cursor.
///
/// [`MutableDataSource::update_row`] resolves ids against the order of the
/// last query served, the order a grid over this source displays. With the
/// default positional identity an id is the absolute position in that order.
pub struct LocalDataSource {
    options: LocalSourceOptions,
    capabilities: Capabilities,
    identity: RowIdentity,
    data: RwLock<Data>,
    projection: Mutex<Option<Projection>>,
    worker: OnceLock<Option<SortWorker>>,
}

impl LocalDataSource {
    /// Creates a source over `rows` with default options.
    pub fn new(rows: Vec<Row>) -> Self {
        Self::with_options(rows, LocalSourceOptions::default())
    }

    /// Creates a source with custom options.
    pub fn with_options(rows: Vec<Row>, options: LocalSourceOptions) -> Self {
        Self {
            options,
            capabilities: Capabilities::all(),
            identity: RowIdentity::default(),
            data: RwLock::new(Data {
                rows: Arc::new(rows),
                generation: 0,
                layout: 0,
            }),
            projection: Mutex::new(None),
            worker: OnceLock::new(),
        }
    }

    /// Sets how rows are identified for [`MutableDataSource::update_row`].
    pub fn with_identity(mut self, identity: RowIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Replaces every row.
    pub fn set_rows(&self, rows: Vec<Row>) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.rows = Arc::new(rows);
        data.generation += 1;
        data.layout += 1;
    }

    /// Snapshot of all rows, unfiltered.
    pub fn rows(&self) -> Arc<Vec<Row>> {
        self.snapshot().0
    }

    /// Number of rows, unfiltered.
    pub fn len(&self) -> usize {
        self.rows().len()
    }

    /// Returns `true` if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> (Arc<Vec<Row>>, u64, u64) {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        (data.rows.clone(), data.generation, data.layout)
    }

    fn cached(&self, key: &ProjectionKey) -> Option<Arc<Vec<usize>>> {
        let guard = self.projection.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|projection| projection.key == *key)
            .map(|projection| projection.indices.clone())
    }

    fn store(&self, key: ProjectionKey, layout: u64, indices: Arc<Vec<usize>>) {
        let mut guard = self.projection.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Projection {
            key,
            layout,
            indices,
        });
    }

    // Row order of the last query served, while its positions are valid.
    fn served_order(&self, layout: u64) -> Option<Arc<Vec<usize>>> {
        let guard = self.projection.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|projection| projection.layout == layout)
            .map(|projection| projection.indices.clone())
    }

    fn locate(&self, data: &Data, row_id: &RowId) -> Option<usize> {
        if let Some(order) = self.served_order(data.layout) {
            let hit = order
                .iter()
                .enumerate()
                .find(|&(position, &raw)| self.identity.id_of(&data.rows[raw], position) == *row_id);
            if let Some((_, &raw)) = hit {
                return Some(raw);
            }
            if self.identity.is_positional() {
                return None;
            }
        }
        data.rows
            .iter()
            .enumerate()
            .position(|(i, row)| self.identity.id_of(row, i) == *row_id)
    }

    fn worker(&self) -> Option<&SortWorker> {
        self.worker
            .get_or_init(|| match SortWorker::spawn() {
                Ok(worker) => Some(worker),
                Err(e) => {
                    log::warn!("[local] sort worker unavailable: {}", e);
                    None
                }
            })
            .as_ref()
    }

    async fn project(&self, rows: &Arc<Vec<Row>>, key: &ProjectionKey) -> Vec<usize> {
        let mut indices: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| key.filters.iter().all(|filter| filter.matches(row)))
            .filter(|(_, row)| key.search.as_ref().is_none_or(|search| search.matches(row)))
            .map(|(i, _)| i)
            .collect();

        if key.sort.is_empty() {
            return indices;
        }

        if self.options.offload
            && indices.len() >= self.options.offload_threshold
            && let Some(worker) = self.worker()
        {
            match worker
                .sort(rows.clone(), indices.clone(), key.sort.clone())
                .await
            {
                Ok(sorted) => return sorted,
                Err(e) => log::warn!("[local] offloaded sort failed, sorting in place: {}", e),
            }
        }

        sort_indices(rows, &mut indices, &key.sort);
        indices
    }
}

#[async_trait]
impl DataSource for LocalDataSource {
    fn name(&self) -> &str {
        &self.options.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn get_rows(&self, request: GridQueryRequest) -> QueryResult {
        let (rows, generation, layout) = self.snapshot();
        let key = ProjectionKey {
            generation,
            sort: request.sort,
            filters: request.filters,
            search: request.search,
        };

        let indices = match self.cached(&key) {
            Some(indices) => indices,
            None => {
                let indices = Arc::new(self.project(&rows, &key).await);
                self.store(key, layout, indices.clone());
                indices
            }
        };
        let total = indices.len();

        let (start, end) = match &request.pagination {
            Pagination::None => (0, total),
            Pagination::Offset { offset, limit } => (*offset, offset.saturating_add(*limit)),
            Pagination::Cursor { cursor, limit } => {
                let start = match cursor {
                    Some(cursor) => cursor
                        .parse::<usize>()
                        .map_err(|_| QueryError::new(format!("Invalid cursor '{cursor}'")))?,
                    None => 0,
                };
                (start, start.saturating_add(*limit))
            }
            Pagination::Range {
                start_index,
                end_index,
            } => (*start_index, *end_index),
        };
        let start = start.min(total);
        let end = end.clamp(start, total);

        let page = indices[start..end].iter().map(|&i| rows[i].clone()).collect();
        let has_more = end < total;
        let mut response = GridQueryResponse::new(page)
            .with_row_count(total)
            .with_has_more(has_more);
        if has_more && matches!(request.pagination, Pagination::Cursor { .. }) {
            response = response.with_next_cursor(end.to_string());
        }
        Ok(response)
    }

    fn as_mutable(&self) -> Option<&dyn MutableDataSource> {
        Some(self)
    }
}

#[async_trait]
impl MutableDataSource for LocalDataSource {
    async fn update_row(&self, row_id: &RowId, field: &str, value: Value) -> Result<(), String> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let position = self
            .locate(&data, row_id)
            .ok_or_else(|| format!("Row '{row_id}' not found"))?;

        Arc::make_mut(&mut data.rows)[position].insert(field, value);
        data.generation += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Vec<Row> {
        vec![
            Row::new().set("id", 1i64).set("name", "Cy").set("age", 41i64),
            Row::new().set("id", 2i64).set("name", "ann").set("age", 29i64),
            Row::new().set("id", 3i64).set("name", "Bo").set("age", 35i64),
            Row::new().set("id", 4i64).set("name", "Di").set("age", Value::Null),
        ]
    }

    fn request(pagination: Pagination) -> GridQueryRequest {
        GridQueryRequest {
            version: 1,
            request_id: "t-1".into(),
            pagination,
            sort: Vec::new(),
            filters: Vec::new(),
            search: None,
        }
    }

    fn names(response: &GridQueryResponse) -> Vec<String> {
        response
            .rows
            .iter()
            .map(|row| row.value("name").to_display_string())
            .collect()
    }

    #[tokio::test]
    async fn test_filter_sort_page() {
        let source = LocalDataSource::new(people());
        let mut req = request(Pagination::Offset {
            offset: 0,
            limit: 1,
        });
        req.filters = vec![Filter::gte("age", 30i64)];
        req.sort = vec![SortSpec::asc("name")];

        let response = source.get_rows(req.clone()).await.unwrap();
        assert_eq!(names(&response), ["Bo"]);
        assert_eq!(response.row_count, Some(2));
        assert_eq!(response.has_more, Some(true));

        req.pagination = Pagination::Offset {
            offset: 1,
            limit: 1,
        };
        let response = source.get_rows(req).await.unwrap();
        assert_eq!(names(&response), ["Cy"]);
        assert_eq!(response.has_more, Some(false));
    }

    #[tokio::test]
    async fn test_search_and_nulls_last() {
        let source = LocalDataSource::new(people());
        let mut req = request(Pagination::None);
        req.sort = vec![SortSpec::desc("age")];
        let response = source.get_rows(req.clone()).await.unwrap();
        assert_eq!(names(&response), ["Cy", "Bo", "ann", "Di"]);

        req.search = Some(SearchSpec::new("AN"));
        let response = source.get_rows(req).await.unwrap();
        assert_eq!(names(&response), ["ann"]);
    }

    #[tokio::test]
    async fn test_cursor_pages() {
        let source = LocalDataSource::new(people());
        let first = source
            .get_rows(request(Pagination::Cursor {
                cursor: None,
                limit: 3,
            }))
            .await
            .unwrap();
        assert_eq!(first.next_cursor.as_deref(), Some("3"));

        let second = source
            .get_rows(request(Pagination::Cursor {
                cursor: first.next_cursor,
                limit: 3,
            }))
            .await
            .unwrap();
        assert_eq!(names(&second), ["Di"]);
        assert!(second.next_cursor.is_none());

        let bad = source
            .get_rows(request(Pagination::Cursor {
                cursor: Some("x".into()),
                limit: 3,
            }))
            .await;
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_range_past_end_is_empty() {
        let source = LocalDataSource::new(people());
        let response = source
            .get_rows(request(Pagination::Range {
                start_index: 10,
                end_index: 20,
            }))
            .await
            .unwrap();
        assert!(response.rows.is_empty());
        assert_eq!(response.row_count, Some(4));
    }

    #[tokio::test]
    async fn test_offload_matches_in_place() {
        let rows: Vec<Row> = (0..500i64)
            .map(|i| Row::new().set("k", (i * 7919) % 101).set("i", i))
            .collect();
        let sorts = vec![SortSpec::desc("k"), SortSpec::asc("i")];

        let offloaded = LocalDataSource::with_options(
            rows.clone(),
            LocalSourceOptions::default().with_offload_threshold(0),
        );
        let in_place =
            LocalDataSource::with_options(rows, LocalSourceOptions::default().without_offload());

        let mut req = request(Pagination::None);
        req.sort = sorts;
        let a = offloaded.get_rows(req.clone()).await.unwrap();
        let b = in_place.get_rows(req).await.unwrap();
        assert_eq!(a.rows, b.rows);
    }

    #[tokio::test]
    async fn test_update_row_invalidates_projection() {
        let source = LocalDataSource::new(people()).with_identity(RowIdentity::field("id"));
        let mut req = request(Pagination::None);
        req.filters = vec![Filter::eq("name", "Zed")];
        assert!(source.get_rows(req.clone()).await.unwrap().rows.is_empty());

        source
            .update_row(&RowId::Num(3), "name", "Zed".into())
            .await
            .unwrap();
        let response = source.get_rows(req).await.unwrap();
        assert_eq!(response.rows[0].value("id"), Value::Int(3));

        let missing = source.update_row(&RowId::Num(99), "name", "x".into()).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_positional_update_follows_served_order() {
        let source = LocalDataSource::new(people());
        let mut req = request(Pagination::Offset {
            offset: 2,
            limit: 2,
        });
        req.sort = vec![SortSpec::asc("name")];
        let page = source.get_rows(req).await.unwrap();
        assert_eq!(names(&page), ["Cy", "Di"]);

        // Position 2 of the sorted order is "Cy", stored first.
        source
            .update_row(&RowId::Num(2), "name", "Cyd".into())
            .await
            .unwrap();
        let rows = source.rows();
        assert_eq!(rows[0].value("name"), Value::from("Cyd"));
        assert_eq!(rows[1].value("name"), Value::from("ann"));

        source.set_rows(people());
        source
            .update_row(&RowId::Num(2), "name", "Bea".into())
            .await
            .unwrap();
        assert_eq!(source.rows()[2].value("name"), Value::from("Bea"));
    }
}
