//! Filter operators, conditions and row matching.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::order::compare_numbers;
use super::order::compare_values;
use crate::model::Row;
use crate::model::Value;

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Case-insensitive substring.
    Contains,
    /// Case-insensitive prefix.
    StartsWith,
    /// Case-insensitive suffix.
    EndsWith,
    /// Member of a `Value::List`.
    In,
    /// Inclusive range given as a two-element `Value::List`.
    Between,
    /// Null check; operand `false` means "is not null".
    IsNull,
}

impl FilterOperator {
    /// All operators, in declaration order.
    pub const ALL: [FilterOperator; 12] = [
        FilterOperator::Eq,
        FilterOperator::Neq,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::Contains,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::In,
        FilterOperator::Between,
        FilterOperator::IsNull,
    ];

    /// Wire name of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::In => "in",
            FilterOperator::Between => "between",
            FilterOperator::IsNull => "isNull",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator and operand of a per-column filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

impl FilterCondition {
    /// Creates a condition.
    pub fn new(operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            operator,
            value: value.into(),
        }
    }

    /// Evaluates the condition against a cell value.
    pub fn matches(&self, cell: &Value) -> bool {
        match self.operator {
            FilterOperator::IsNull => {
                let want_null = self.value.as_bool().unwrap_or(true);
                cell.is_null() == want_null
            }
            FilterOperator::Eq => values_equal(cell, &self.value),
            FilterOperator::Neq => !values_equal(cell, &self.value),
            FilterOperator::Gt => ordered(cell, &self.value, |o| o == Ordering::Greater),
            FilterOperator::Gte => ordered(cell, &self.value, |o| o != Ordering::Less),
            FilterOperator::Lt => ordered(cell, &self.value, |o| o == Ordering::Less),
            FilterOperator::Lte => ordered(cell, &self.value, |o| o != Ordering::Greater),
            FilterOperator::Contains => text_match(cell, &self.value, |c, n| c.contains(n)),
            FilterOperator::StartsWith => text_match(cell, &self.value, |c, n| c.starts_with(n)),
            FilterOperator::EndsWith => text_match(cell, &self.value, |c, n| c.ends_with(n)),
            FilterOperator::In => match self.value.as_list() {
                Some(items) => items.iter().any(|item| values_equal(cell, item)),
                None => values_equal(cell, &self.value),
            },
            FilterOperator::Between => match self.value.as_list() {
                Some([low, high]) => {
                    ordered(cell, low, |o| o != Ordering::Less)
                        && ordered(cell, high, |o| o != Ordering::Greater)
                }
                _ => false,
            },
        }
    }
}

/// A filter as sent to a data source: `field operator value`.
///
/// # Example
///
/// ```
/// use datagrid_lib::query::Filter;
///
/// let adults = Filter::gte("age", 18i64);
/// let names = Filter::is_in("name", vec!["Ann", "Cy"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

impl Filter {
    /// Creates a filter from its parts.
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// `field eq value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    /// `field neq value`
    pub fn neq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Neq, value)
    }

    /// `field gt value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Gt, value)
    }

    /// `field gte value`
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Gte, value)
    }

    /// `field lt value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Lt, value)
    }

    /// `field lte value`
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Lte, value)
    }

    /// `field contains value`
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::Contains, value.into())
    }

    /// `field startsWith value`
    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::StartsWith, value.into())
    }

    /// `field endsWith value`
    pub fn ends_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::EndsWith, value.into())
    }

    /// `field in [values]`
    pub fn is_in<V: Into<Value>>(field: impl Into<String>, values: Vec<V>) -> Self {
        Self::new(field, FilterOperator::In, Value::from(values))
    }

    /// `field between low and high`, inclusive.
    pub fn between(
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::new(
            field,
            FilterOperator::Between,
            Value::List(vec![low.into(), high.into()]),
        )
    }

    /// `field isNull`
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, Value::Bool(true))
    }

    /// `field isNull false`
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, Value::Bool(false))
    }

    /// The operator/operand part of this filter.
    pub fn condition(&self) -> FilterCondition {
        FilterCondition {
            operator: self.operator,
            value: self.value.clone(),
        }
    }

    /// Evaluates the filter against a row. A missing field reads as null.
    pub fn matches(&self, row: &Row) -> bool {
        let cell = row.get(&self.field).unwrap_or(&Value::Null);
        self.condition().matches(cell)
    }
}

/// Per-column filters, combined with AND. Keys iterate in sorted order, so
/// the request shape built from a map is deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterMap {
    entries: BTreeMap<String, FilterCondition>,
}

impl FilterMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the condition for a column, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, condition: FilterCondition) -> Option<FilterCondition> {
        self.entries.insert(key.into(), condition)
    }

    /// Removes the condition for a column.
    pub fn remove(&mut self, key: &str) -> Option<FilterCondition> {
        self.entries.remove(key)
    }

    /// Returns the condition for a column.
    pub fn get(&self, key: &str) -> Option<&FilterCondition> {
        self.entries.get(key)
    }

    /// Removes all conditions.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of filtered columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no column is filtered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(column key, condition)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterCondition)> {
        self.entries.iter()
    }

    /// Converts to the request shape.
    pub fn to_filters(&self) -> Vec<Filter> {
        self.entries
            .iter()
            .map(|(field, cond)| Filter::new(field.clone(), cond.operator, cond.value.clone()))
            .collect()
    }

    /// Returns `true` if the row satisfies every condition.
    pub fn matches(&self, row: &Row) -> bool {
        self.entries.iter().all(|(field, cond)| {
            cond.matches(row.get(field).unwrap_or(&Value::Null))
        })
    }
}

impl FromIterator<(String, FilterCondition)> for FilterMap {
    fn from_iter<I: IntoIterator<Item = (String, FilterCondition)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Equality with numeric coercion across `Int`, `Float` and `Decimal`
/// (exact between `Int` and `Decimal`). Strings compare exactly.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match compare_numbers(a, b) {
        Some(ord) => ord == Ordering::Equal,
        None => a == b,
    }
}

// Ordering operators never match a null cell or a null operand.
fn ordered(cell: &Value, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    if cell.is_null() || operand.is_null() {
        return false;
    }
    accept(compare_values(cell, operand))
}

fn text_match(cell: &Value, needle: &Value, accept: impl Fn(&str, &str) -> bool) -> bool {
    if cell.is_null() {
        return false;
    }
    let haystack = cell.to_display_string().to_lowercase();
    let needle = needle.to_display_string().to_lowercase();
    accept(&haystack, &needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new()
            .set("name", "Ann Lee")
            .set("age", 31i64)
            .set("score", 7.5)
            .set("nick", Value::Null)
    }

    #[test]
    fn test_comparison_operators() {
        let row = row();
        assert!(Filter::eq("age", 31i64).matches(&row));
        assert!(Filter::eq("age", 31.0).matches(&row));
        assert!(Filter::neq("age", 30i64).matches(&row));
        assert!(Filter::gt("age", 30i64).matches(&row));
        assert!(Filter::gte("age", 31i64).matches(&row));
        assert!(!Filter::lt("age", 31i64).matches(&row));
        assert!(Filter::lte("score", 7.5).matches(&row));
    }

    #[test]
    fn test_equality_is_exact_for_large_numbers() {
        let row = Row::new()
            .set("id", 9_007_199_254_740_993i64)
            .set("rate", rust_decimal::Decimal::new(1_000_000_000_000_000_001, 18));
        assert!(Filter::eq("id", 9_007_199_254_740_993i64).matches(&row));
        assert!(!Filter::eq("id", 9_007_199_254_740_992i64).matches(&row));
        assert!(!Filter::eq("id", 9_007_199_254_740_992.0).matches(&row));
        assert!(!Filter::eq("rate", 1i64).matches(&row));
        assert!(Filter::gt("rate", 1i64).matches(&row));
    }

    #[test]
    fn test_text_operators_are_case_insensitive() {
        let row = row();
        assert!(Filter::contains("name", "LEE").matches(&row));
        assert!(Filter::starts_with("name", "ann").matches(&row));
        assert!(Filter::ends_with("name", "Lee").matches(&row));
        assert!(!Filter::contains("nick", "").matches(&row));
    }

    #[test]
    fn test_in_and_between() {
        let row = row();
        assert!(Filter::is_in("age", vec![30i64, 31]).matches(&row));
        assert!(!Filter::is_in("age", vec![1i64]).matches(&row));
        assert!(Filter::between("age", 30i64, 31i64).matches(&row));
        assert!(!Filter::between("age", 32i64, 40i64).matches(&row));
        // Malformed operand matches nothing.
        assert!(!Filter::new("age", FilterOperator::Between, 31i64).matches(&row));
    }

    #[test]
    fn test_null_handling() {
        let row = row();
        assert!(Filter::is_null("nick").matches(&row));
        assert!(Filter::is_null("missing").matches(&row));
        assert!(Filter::is_not_null("name").matches(&row));
        assert!(!Filter::gt("nick", 0i64).matches(&row));
        assert!(!Filter::lt("nick", 0i64).matches(&row));
    }

    #[test]
    fn test_filter_map_is_conjunctive() {
        let mut map = FilterMap::new();
        map.set("age", FilterCondition::new(FilterOperator::Gte, 30i64));
        map.set("name", FilterCondition::new(FilterOperator::StartsWith, "ann"));
        assert!(map.matches(&row()));

        map.set("score", FilterCondition::new(FilterOperator::Gt, 8i64));
        assert!(!map.matches(&row()));

        let filters = map.to_filters();
        let fields: Vec<_> = filters.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, ["age", "name", "score"]);
    }

    #[test]
    fn test_operator_wire_names() {
        for op in FilterOperator::ALL {
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.as_str()));
        }
    }
}
