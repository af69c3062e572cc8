//! Data sources
//!
//! A [`DataSource`] answers versioned [`GridQueryRequest`]s. It declares its
//! [`Capabilities`] up front; the grid never sends a request shape outside
//! them. Sources that can persist cell edits also implement
//! [`MutableDataSource`].

mod local;
mod offload;

pub use local::*;
pub use offload::*;

use async_trait::async_trait;

use crate::model::RowId;
use crate::model::Value;
use crate::query::Capabilities;
use crate::query::GridQueryRequest;
use crate::query::QueryResult;

/// A provider of rows.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use datagrid_lib::query::{Capabilities, GridQueryRequest, GridQueryResponse, QueryResult};
/// use datagrid_lib::source::DataSource;
///
/// struct Remote {
///     caps: Capabilities,
/// }
///
/// #[async_trait]
/// impl DataSource for Remote {
///     fn name(&self) -> &str {
///         "remote"
///     }
///
///     fn capabilities(&self) -> &Capabilities {
///         &self.caps
///     }
///
///     async fn get_rows(&self, request: GridQueryRequest) -> QueryResult {
///         Ok(GridQueryResponse::new(fetch(&request).await?))
///     }
/// }
/// ```
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Name used in capability errors and logs.
    fn name(&self) -> &str;

    /// Features this source supports.
    fn capabilities(&self) -> &Capabilities;

    /// Answers a query. Responses may arrive in any order; the grid applies
    /// only the latest.
    async fn get_rows(&self, request: GridQueryRequest) -> QueryResult;

    /// Returns the mutation interface if this source persists edits.
    fn as_mutable(&self) -> Option<&dyn MutableDataSource> {
        None
    }
}

/// A data source that can persist a single cell change.
#[async_trait]
pub trait MutableDataSource: Send + Sync {
    /// Writes `value` to `field` of the row identified by `row_id`.
    ///
    /// The error string is shown on the edit session.
    async fn update_row(&self, row_id: &RowId, field: &str, value: Value) -> Result<(), String>;
}
