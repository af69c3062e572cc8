//! Data source capabilities and request validation.

use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use super::filter::FilterOperator;
use super::request::GridQueryRequest;
use super::request::PaginationMode;
use crate::error::CapabilityError;

/// How many sort keys a source accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortSupport {
    None,
    Single,
    #[default]
    Multi,
}

/// Features a data source declares. The coordinator never sends a request
/// shape outside them.
///
/// # Example
///
/// ```
/// use datagrid_lib::query::{Capabilities, FilterOperator, PaginationMode, SortSupport};
///
/// let caps = Capabilities::none()
///     .with_pagination(PaginationMode::Offset)
///     .with_sort(SortSupport::Single)
///     .with_operators([FilterOperator::Eq, FilterOperator::Contains]);
///
/// assert!(caps.supports_operator(FilterOperator::Eq));
/// assert!(!caps.search);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub pagination: HashSet<PaginationMode>,
    pub sort: SortSupport,
    pub filter_operators: HashSet<FilterOperator>,
    pub search: bool,
    /// Whether responses carry the total matching row count.
    pub row_count: bool,
}

impl Capabilities {
    /// Supports everything.
    pub fn all() -> Self {
        Self {
            pagination: [
                PaginationMode::Offset,
                PaginationMode::Cursor,
                PaginationMode::Range,
            ]
            .into_iter()
            .collect(),
            sort: SortSupport::Multi,
            filter_operators: FilterOperator::ALL.into_iter().collect(),
            search: true,
            row_count: true,
        }
    }

    /// Supports nothing but unpaginated, unsorted, unfiltered reads.
    pub fn none() -> Self {
        Self {
            pagination: HashSet::new(),
            sort: SortSupport::None,
            filter_operators: HashSet::new(),
            search: false,
            row_count: false,
        }
    }

    /// Adds a pagination mode.
    pub fn with_pagination(mut self, mode: PaginationMode) -> Self {
        self.pagination.insert(mode);
        self
    }

    /// Sets the sort support.
    pub fn with_sort(mut self, sort: SortSupport) -> Self {
        self.sort = sort;
        self
    }

    /// Adds filter operators.
    pub fn with_operators(mut self, operators: impl IntoIterator<Item = FilterOperator>) -> Self {
        self.filter_operators.extend(operators);
        self
    }

    /// Enables search.
    pub fn with_search(mut self) -> Self {
        self.search = true;
        self
    }

    /// Declares that responses carry a total row count.
    pub fn with_row_count(mut self) -> Self {
        self.row_count = true;
        self
    }

    /// Returns `true` if the operator is supported.
    pub fn supports_operator(&self, operator: FilterOperator) -> bool {
        self.filter_operators.contains(&operator)
    }

    /// Checks a request against the declared capabilities.
    pub fn validate(&self, source_name: &str, request: &GridQueryRequest) -> Result<(), CapabilityError> {
        if let Some(mode) = request.pagination.mode()
            && !self.pagination.contains(&mode)
        {
            return Err(CapabilityError::Pagination {
                source_name: source_name.to_string(),
                mode,
            });
        }

        match (self.sort, request.sort.len()) {
            (_, 0) => {}
            (SortSupport::None, _) => {
                return Err(CapabilityError::Sort {
                    source_name: source_name.to_string(),
                });
            }
            (SortSupport::Single, n) if n > 1 => {
                return Err(CapabilityError::MultiSort {
                    source_name: source_name.to_string(),
                    requested: n,
                });
            }
            _ => {}
        }

        if let Some(filter) = request
            .filters
            .iter()
            .find(|f| !self.supports_operator(f.operator))
        {
            return Err(CapabilityError::FilterOperator {
                source_name: source_name.to_string(),
                field: filter.field.clone(),
                operator: filter.operator,
            });
        }

        if request.search.is_some() && !self.search {
            return Err(CapabilityError::Search {
                source_name: source_name.to_string(),
            });
        }

        Ok(())
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Filter;
    use crate::query::Pagination;
    use crate::query::SearchSpec;
    use crate::query::SortSpec;

    fn request() -> GridQueryRequest {
        GridQueryRequest {
            version: 1,
            request_id: "t-1".into(),
            pagination: Pagination::None,
            sort: Vec::new(),
            filters: Vec::new(),
            search: None,
        }
    }

    #[test]
    fn test_plain_request_always_valid() {
        assert!(Capabilities::none().validate("s", &request()).is_ok());
    }

    #[test]
    fn test_rejects_pagination_mode() {
        let caps = Capabilities::none().with_pagination(PaginationMode::Offset);
        let mut req = request();
        req.pagination = Pagination::Cursor {
            cursor: None,
            limit: 10,
        };
        assert_eq!(
            caps.validate("s", &req),
            Err(CapabilityError::Pagination {
                source_name: "s".into(),
                mode: PaginationMode::Cursor
            })
        );
    }

    #[test]
    fn test_rejects_multi_sort_on_single() {
        let caps = Capabilities::none().with_sort(SortSupport::Single);
        let mut req = request();
        req.sort = vec![SortSpec::asc("a")];
        assert!(caps.validate("s", &req).is_ok());
        req.sort.push(SortSpec::desc("b"));
        assert!(matches!(
            caps.validate("s", &req),
            Err(CapabilityError::MultiSort { requested: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_operator_and_search() {
        let caps = Capabilities::none().with_operators([FilterOperator::Eq]);
        let mut req = request();
        req.filters = vec![Filter::eq("a", 1i64), Filter::contains("b", "x")];
        assert!(matches!(
            caps.validate("s", &req),
            Err(CapabilityError::FilterOperator { ref field, operator: FilterOperator::Contains, .. }) if field == "b"
        ));

        let mut req = request();
        req.search = Some(SearchSpec::new("x"));
        assert!(matches!(
            caps.validate("s", &req),
            Err(CapabilityError::Search { .. })
        ));
    }
}
