//! Versioning, stale-response suppression, debouncing and capability checks.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::GatedSource;
use common::RecordingSource;
use datagrid_lib::GridConfig;
use datagrid_lib::GridError;
use datagrid_lib::GridEvent;
use datagrid_lib::GridState;
use datagrid_lib::column::Column;
use datagrid_lib::error::CapabilityError;
use datagrid_lib::error::QueryError;
use datagrid_lib::model::Row;
use datagrid_lib::query::Capabilities;
use datagrid_lib::query::FilterCondition;
use datagrid_lib::query::FilterOperator;
use datagrid_lib::query::GridQueryResponse;
use datagrid_lib::query::Pagination;
use datagrid_lib::query::PaginationMode;
use datagrid_lib::query::SortSpec;
use datagrid_lib::query::SortSupport;
use tokio::sync::broadcast::error::TryRecvError;

fn rows(label: &str) -> Vec<Row> {
    vec![Row::new().set("id", 1i64).set("name", label)]
}

fn columns() -> Vec<Column> {
    vec![Column::new("id"), Column::new("name"), Column::new("age")]
}

fn config() -> GridConfig {
    GridConfig::default().with_request_id_prefix("t")
}

#[tokio::test]
async fn test_responses_out_of_order_keep_latest() {
    common::init_logger();
    let (source, mut calls) = GatedSource::new(Capabilities::all());
    let grid = GridState::new(Arc::new(source), columns(), config()).unwrap();
    let mut events = grid.subscribe();

    grid.refresh().unwrap();
    grid.set_sort(vec![SortSpec::asc("name")]).unwrap();
    grid.set_sort(vec![SortSpec::desc("name")]).unwrap();

    let v1 = calls.recv().await.unwrap();
    let v2 = calls.recv().await.unwrap();
    let v3 = calls.recv().await.unwrap();
    assert_eq!(
        [v1.request.version, v2.request.version, v3.request.version],
        [1, 2, 3]
    );
    let v3_id = v3.request.request_id.clone();

    v2.reply(Ok(GridQueryResponse::new(rows("v2"))));
    common::settle().await;
    assert!(grid.rows().is_empty());
    assert!(grid.is_loading());

    v1.reply(Ok(GridQueryResponse::new(rows("v1"))));
    common::settle().await;
    assert!(grid.rows().is_empty());

    v3.reply(Ok(GridQueryResponse::new(rows("v3"))));
    grid.wait_for_data().await;
    assert_eq!(common::names(&grid.rows()), ["v3"]);
    assert!(!grid.is_loading());
    assert_eq!(grid.version(), 3);

    let loaded: Vec<GridEvent> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|event| matches!(event, GridEvent::RowsLoaded { .. }))
        .collect();
    assert_eq!(
        loaded,
        [GridEvent::RowsLoaded {
            request_id: v3_id,
            row_count: 1
        }]
    );
}

#[tokio::test]
async fn test_failure_keeps_rows_and_reports() {
    let (source, mut calls) = GatedSource::new(Capabilities::all());
    let grid = GridState::new(Arc::new(source), columns(), config()).unwrap();

    grid.refresh().unwrap();
    calls
        .recv()
        .await
        .unwrap()
        .reply(Ok(GridQueryResponse::new(rows("first"))));
    grid.wait_for_data().await;

    let mut events = grid.subscribe();
    grid.refresh().unwrap();
    let call = calls.recv().await.unwrap();
    let request_id = call.request.request_id.clone();
    call.reply(Err(QueryError::new("backend down")));
    grid.wait_for_data().await;

    assert_eq!(common::names(&grid.rows()), ["first"]);
    assert_eq!(grid.query_error(), Some(QueryError::new("backend down")));
    assert_eq!(
        events.try_recv().unwrap(),
        GridEvent::QueryError {
            request_id,
            message: "backend down".into()
        }
    );
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_capability_rejection_leaves_state_unchanged() {
    let caps = Capabilities::none()
        .with_pagination(PaginationMode::Offset)
        .with_sort(SortSupport::Single)
        .with_operators([FilterOperator::Eq]);
    let (source, mut calls) = GatedSource::new(caps);
    let grid = GridState::new(Arc::new(source), columns(), config()).unwrap();

    grid.set_sort(vec![SortSpec::asc("name")]).unwrap();
    let call = calls.recv().await.unwrap();
    assert_eq!(call.request.version, 1);

    let err = grid
        .set_sort(vec![SortSpec::asc("name"), SortSpec::asc("age")])
        .unwrap_err();
    assert!(matches!(
        err,
        GridError::Capability(CapabilityError::MultiSort { requested: 2, .. })
    ));
    assert!(err.is_configuration());

    let err = grid
        .set_filter_immediate("age", FilterCondition::new(FilterOperator::Gte, 30i64))
        .unwrap_err();
    assert!(matches!(
        err,
        GridError::Capability(CapabilityError::FilterOperator { .. })
    ));

    let err = grid.set_search("x").unwrap_err();
    assert!(matches!(
        err,
        GridError::Capability(CapabilityError::Search { .. })
    ));

    assert_eq!(grid.sort(), [SortSpec::asc("name")]);
    assert!(grid.filters().is_empty());
    assert_eq!(grid.version(), 1);
    assert!(calls.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_keystrokes_debounce_into_one_request() {
    let source = RecordingSource::new(common::people());
    let grid = GridState::new(source.clone(), columns(), config()).unwrap();

    for text in ["a", "an", "ann"] {
        grid.set_search(text).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(source.request_count(), 0);
    assert_eq!(grid.search().as_deref(), Some("ann"));

    grid.wait_for_data().await;
    assert_eq!(source.request_count(), 1);
    let request = source.last_request().unwrap();
    assert_eq!(request.search.unwrap().query, "ann");
    assert_eq!(common::names(&grid.rows()), ["Ann"]);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_change_folds_pending_filter() {
    let source = RecordingSource::new(common::people());
    let grid = GridState::new(source.clone(), columns(), config()).unwrap();

    grid.set_filter("age", FilterCondition::new(FilterOperator::Gte, 30i64))
        .unwrap();
    grid.set_sort(vec![SortSpec::asc("name")]).unwrap();
    grid.wait_for_data().await;

    // The sort dispatched at once and carried the pending filter; the
    // debounce timer never fired a second request.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.request_count(), 1);
    let request = source.last_request().unwrap();
    assert_eq!(request.filters.len(), 1);
    assert_eq!(common::names(&grid.rows()), ["Ann", "Cy"]);
}

#[tokio::test(start_paused = true)]
async fn test_flush_pending() {
    let source = RecordingSource::new(common::people());
    let grid = GridState::new(source.clone(), columns(), config()).unwrap();

    assert!(!grid.flush_pending().unwrap());
    grid.set_search("cy").unwrap();
    assert!(grid.flush_pending().unwrap());
    grid.wait_for_data().await;
    assert_eq!(common::names(&grid.rows()), ["Cy"]);
    assert_eq!(source.request_count(), 1);
}

#[tokio::test]
async fn test_filter_change_resets_offset() {
    let source = RecordingSource::new(common::people());
    let grid = GridState::new(
        source.clone(),
        columns(),
        config().with_page_size(Some(1)),
    )
    .unwrap();

    grid.refresh().unwrap();
    grid.wait_for_data().await;
    assert_eq!(grid.total_row_count(), Some(3));
    assert_eq!(grid.page_count(), Some(3));

    assert!(grid.next_page().unwrap());
    grid.wait_for_data().await;
    assert!(grid.next_page().unwrap());
    grid.wait_for_data().await;
    assert_eq!(grid.page_index(), 2);
    assert!(!grid.next_page().unwrap());

    grid.set_filter_immediate("age", FilterCondition::new(FilterOperator::Gte, 30i64))
        .unwrap();
    grid.wait_for_data().await;
    assert_eq!(
        source.last_request().unwrap().pagination,
        Pagination::Offset {
            offset: 0,
            limit: 1
        }
    );
    assert_eq!(grid.total_row_count(), Some(2));

    assert!(grid.go_to_page(1).unwrap());
    grid.wait_for_data().await;
    assert_eq!(grid.page_index(), 1);
    assert!(grid.previous_page().unwrap());
    grid.wait_for_data().await;
    assert_eq!(grid.page_index(), 0);
    assert!(!grid.previous_page().unwrap());
}

#[tokio::test]
async fn test_toggle_sort_cycles() {
    let source = RecordingSource::new(common::people());
    let grid = GridState::new(source.clone(), columns(), config()).unwrap();

    grid.toggle_sort("name", false).unwrap();
    assert_eq!(grid.sort(), [SortSpec::asc("name")]);
    grid.toggle_sort("name", false).unwrap();
    assert_eq!(grid.sort(), [SortSpec::desc("name")]);
    grid.toggle_sort("age", true).unwrap();
    assert_eq!(grid.sort(), [SortSpec::desc("name"), SortSpec::asc("age")]);
    grid.toggle_sort("name", true).unwrap();
    assert_eq!(grid.sort(), [SortSpec::asc("age")]);
    grid.toggle_sort("age", false).unwrap();
    grid.toggle_sort("age", false).unwrap();
    assert!(grid.sort().is_empty());

    grid.wait_for_data().await;
    assert_eq!(source.request_count(), 6);
}

#[tokio::test]
async fn test_unsortable_column_rejected() {
    let source = RecordingSource::new(common::people());
    let grid = GridState::new(
        source.clone(),
        vec![Column::new("name").with_sortable(false).with_filterable(false)],
        config(),
    )
    .unwrap();

    assert!(grid.toggle_sort("name", false).is_err());
    assert!(grid.set_sort(vec![SortSpec::asc("name")]).is_err());
    assert!(
        grid.set_filter("name", FilterCondition::new(FilterOperator::Eq, "Ann"))
            .is_err()
    );
    assert_eq!(source.request_count(), 0);
}

#[tokio::test]
async fn test_dispose_ignores_in_flight() {
    let (source, mut calls) = GatedSource::new(Capabilities::all());
    let grid = GridState::new(Arc::new(source), columns(), config()).unwrap();

    grid.refresh().unwrap();
    let call = calls.recv().await.unwrap();
    grid.dispose();
    call.reply(Ok(GridQueryResponse::new(rows("late"))));
    common::settle().await;

    assert!(grid.rows().is_empty());
    assert!(grid.is_disposed());
    assert!(matches!(grid.refresh(), Err(GridError::Disposed)));
    grid.wait_for_data().await;
}

#[tokio::test]
async fn test_grids_have_independent_counters() {
    let a = GridState::new(
        RecordingSource::new(common::people()),
        columns(),
        GridConfig::default().with_request_id_prefix("a"),
    )
    .unwrap();
    let b = GridState::new(
        RecordingSource::new(common::people()),
        columns(),
        GridConfig::default().with_request_id_prefix("b"),
    )
    .unwrap();

    a.refresh().unwrap();
    a.refresh().unwrap();
    b.refresh().unwrap();
    futures::future::join(a.wait_for_data(), b.wait_for_data()).await;

    assert_eq!(a.latest_request_id().as_deref(), Some("a-2"));
    assert_eq!(b.latest_request_id().as_deref(), Some("b-1"));
    assert_eq!(b.version(), 1);
}
