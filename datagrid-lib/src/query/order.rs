//! Sort specifications and the shared value comparator.
//!
//! The same comparator backs in-thread sorting, offloaded sorting and the
//! range filter operators, so every path orders values identically.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde::Serialize;

use crate::model::Row;
use crate::model::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ascending order (A-Z, 0-9).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0).
    Desc,
}

impl Direction {
    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

/// Placement of null values, independent of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsOrder {
    First,
    Last,
}

/// One sort key: `{field, direction, nulls?}`.
///
/// # Example
///
/// ```
/// use datagrid_lib::query::{Direction, SortSpec};
///
/// let by_name = SortSpec::asc("name");
/// let by_age = SortSpec::desc("age").nulls_first();
/// assert_eq!(by_age.direction, Direction::Desc);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nulls: Option<NullsOrder>,
}

impl SortSpec {
    /// Creates a sort key.
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
            nulls: None,
        }
    }

    /// Ascending on a field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Asc)
    }

    /// Descending on a field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, Direction::Desc)
    }

    /// Places nulls first.
    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    /// Places nulls last (the default).
    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }
}

// Kinds of different type order by rank.
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => 2,
        Value::DateTime(_) => 3,
        Value::String(_) => 4,
        Value::List(_) => 5,
    }
}

// `Int` and `Decimal` are exact; `Float` is not.
enum Number {
    Exact(Decimal),
    Float(f64),
}

fn number(value: &Value) -> Option<Number> {
    match value {
        Value::Int(v) => Some(Number::Exact(Decimal::from(*v))),
        Value::Decimal(v) => Some(Number::Exact(*v)),
        Value::Float(v) => Some(Number::Float(*v)),
        _ => None,
    }
}

// NaN sorts after every number.
fn compare_floats(x: f64, y: f64) -> Ordering {
    x.partial_cmp(&y)
        .unwrap_or_else(|| x.is_nan().cmp(&y.is_nan()))
}

fn compare_exact_float(x: Decimal, y: f64) -> Ordering {
    if y.is_nan() {
        return Ordering::Less;
    }
    // Rounding to f64 is monotonic, so a strict difference there is exact.
    match x.to_f64().map(|rounded| compare_floats(rounded, y)) {
        Some(Ordering::Equal) | None => match Decimal::from_f64_retain(y) {
            Some(y) => x.cmp(&y),
            None if y > 0.0 => Ordering::Less,
            None => Ordering::Greater,
        },
        Some(ord) => ord,
    }
}

/// Numeric comparison across `Int`, `Float` and `Decimal`; `None` unless
/// both values are numbers.
///
/// `Int` and `Decimal` compare exactly with each other, so large integers
/// and high-precision decimals never collapse through `f64`.
pub fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    let ord = match (number(a)?, number(b)?) {
        (Number::Exact(x), Number::Exact(y)) => x.cmp(&y),
        (Number::Float(x), Number::Float(y)) => compare_floats(x, y),
        (Number::Exact(x), Number::Float(y)) => compare_exact_float(x, y),
        (Number::Float(x), Number::Exact(y)) => compare_exact_float(y, x).reverse(),
    };
    Some(ord)
}

/// Total order over non-null values.
///
/// Numbers compare numerically across `Int`/`Float`/`Decimal` (see
/// [`compare_numbers`]), strings case-insensitively with a case-sensitive
/// tie-break, lists lexicographically. Null compares below everything;
/// callers that honor [`NullsOrder`] handle nulls before calling this.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x
            .to_lowercase()
            .cmp(&y.to_lowercase())
            .then_with(|| x.cmp(y)),
        (Value::List(x), Value::List(y)) => {
            for (left, right) in x.iter().zip(y) {
                let ord = compare_values(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => compare_numbers(a, b).unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b))),
    }
}

fn compare_key(a: &Value, b: &Value, spec: &SortSpec) -> Ordering {
    let nulls = spec.nulls.unwrap_or(NullsOrder::Last);
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => match nulls {
            NullsOrder::First => Ordering::Less,
            NullsOrder::Last => Ordering::Greater,
        },
        (false, true) => match nulls {
            NullsOrder::First => Ordering::Greater,
            NullsOrder::Last => Ordering::Less,
        },
        (false, false) => {
            let ord = compare_values(a, b);
            match spec.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        }
    }
}

/// Compares two rows by a list of sort keys, first key first.
pub fn compare_rows(a: &Row, b: &Row, sorts: &[SortSpec]) -> Ordering {
    for spec in sorts {
        let left = a.get(&spec.field).unwrap_or(&Value::Null);
        let right = b.get(&spec.field).unwrap_or(&Value::Null);
        let ord = compare_key(left, right, spec);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Stable in-thread sort of row positions.
///
/// `indices` index into `rows`; equal keys keep their incoming order.
pub fn sort_indices(rows: &[Row], indices: &mut [usize], sorts: &[SortSpec]) {
    if sorts.is_empty() {
        return;
    }
    indices.sort_by(|&a, &b| compare_rows(&rows[a], &rows[b], sorts));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(compare_values(&Value::Int(2), &Value::Float(2.5)), Ordering::Less);
        assert_eq!(
            compare_values(&Value::Decimal(Decimal::new(30, 1)), &Value::Int(3)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_exact_numbers_do_not_round() {
        let big = Value::Int(9_007_199_254_740_993);
        assert_eq!(
            compare_values(&big, &Value::Float(9_007_199_254_740_992.0)),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(&big, &Value::Int(9_007_199_254_740_992)),
            Ordering::Greater
        );

        let precise = Value::Decimal(Decimal::new(1_000_000_000_000_000_001, 18));
        assert_eq!(compare_values(&precise, &Value::Int(1)), Ordering::Greater);
        assert_eq!(compare_values(&Value::Int(1), &precise), Ordering::Less);
        assert_eq!(compare_values(&Value::Int(1), &Value::Float(1.0)), Ordering::Equal);
    }

    #[test]
    fn test_nan_sorts_after_numbers() {
        assert_eq!(
            compare_values(&Value::Float(f64::NAN), &Value::Int(i64::MAX)),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(&Value::Float(f64::INFINITY), &Value::Float(f64::NAN)),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&Value::Float(1e300), &Value::Decimal(Decimal::MAX)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_strings_case_insensitive_with_tiebreak() {
        assert_eq!(compare_values(&"apple".into(), &"Banana".into()), Ordering::Less);
        assert_eq!(compare_values(&"A".into(), &"a".into()), Ordering::Less);
    }

    #[test]
    fn test_mixed_kinds_by_rank() {
        assert_eq!(compare_values(&Value::Int(99), &"1".into()), Ordering::Less);
        assert_eq!(compare_values(&Value::Bool(true), &Value::Int(0)), Ordering::Less);
    }

    #[test]
    fn test_nulls_last_regardless_of_direction() {
        let rows = vec![
            Row::new().set("v", Value::Null),
            Row::new().set("v", 2i64),
            Row::new().set("v", 1i64),
        ];
        let mut indices = vec![0, 1, 2];
        sort_indices(&rows, &mut indices, &[SortSpec::asc("v")]);
        assert_eq!(indices, [2, 1, 0]);

        let mut indices = vec![0, 1, 2];
        sort_indices(&rows, &mut indices, &[SortSpec::desc("v")]);
        assert_eq!(indices, [1, 2, 0]);

        let mut indices = vec![0, 1, 2];
        sort_indices(&rows, &mut indices, &[SortSpec::desc("v").nulls_first()]);
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn test_multi_key_and_stability() {
        let rows = vec![
            Row::new().set("team", "b").set("name", "x"),
            Row::new().set("team", "a").set("name", "z"),
            Row::new().set("team", "a").set("name", "y"),
            Row::new().set("team", "b").set("name", "x"),
        ];
        let mut indices = vec![0, 1, 2, 3];
        sort_indices(
            &rows,
            &mut indices,
            &[SortSpec::asc("team"), SortSpec::asc("name")],
        );
        assert_eq!(indices, [2, 1, 0, 3]);
    }

    #[test]
    fn test_sort_spec_wire_shape() {
        let json = serde_json::to_value(SortSpec::desc("age").nulls_first()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"field": "age", "direction": "desc", "nulls": "first"})
        );
    }
}
