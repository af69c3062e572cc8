//! Query shaping and coordination.
//!
//! # Request Types
//!
//! - [`Filter`] / [`FilterMap`] - Per-column filter conditions
//! - [`SortSpec`] - Sort keys, with the shared comparator [`compare_rows`]
//! - [`Pagination`] - Offset, cursor and range paging
//! - [`GridQueryRequest`] / [`GridQueryResponse`] - The data source contract
//!
//! # Coordination
//!
//! - [`Capabilities`] - What a source supports, checked before dispatch
//! - [`QueryCoordinator`] - Versioning and stale-response suppression
//! - [`Debouncer`] - Trailing-edge timer for filter and search input

mod capabilities;
mod coordinator;
mod debounce;
mod filter;
mod order;
mod request;

pub use capabilities::Capabilities;
pub use capabilities::SortSupport;
pub use coordinator::QueryCoordinator;
pub use coordinator::QueryState;
pub use coordinator::RequestIds;
pub use coordinator::ResponseOutcome;
pub use debounce::Debouncer;
pub use filter::Filter;
pub use filter::FilterCondition;
pub use filter::FilterMap;
pub use filter::FilterOperator;
pub use filter::values_equal;
pub use order::Direction;
pub use order::NullsOrder;
pub use order::SortSpec;
pub use order::compare_numbers;
pub use order::compare_rows;
pub use order::compare_values;
pub use order::sort_indices;
pub use request::GridQueryRequest;
pub use request::GridQueryResponse;
pub use request::Pagination;
pub use request::PaginationMode;
pub use request::QueryResult;
pub use request::SearchSpec;
