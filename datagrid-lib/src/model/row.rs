//! Opaque row records and row identity

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use super::Value;

/// An application record displayed as one grid row.
///
/// Rows hold field values as a `HashMap<String, Value>`. The grid never
/// inspects a row directly: reads go through column accessors and the
/// [`RowIdentity`] function.
///
/// # Example
///
/// ```
/// use datagrid_lib::model::{Row, Value};
///
/// let row = Row::new()
///     .set("id", 1i64)
///     .set("name", "Ann");
///
/// assert_eq!(row.get("name"), Some(&Value::from("Ann")));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: HashMap<String, Value>,
}

impl Row {
    /// Creates a new empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a reference to the field value, if it exists.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns the field value, or `Value::Null` when absent.
    pub fn value(&self, field: &str) -> Value {
        self.fields.get(field).cloned().unwrap_or_default()
    }

    /// Returns `true` if the row contains the given field.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns a reference to all fields.
    pub fn fields(&self) -> &HashMap<String, Value> {
        &self.fields
    }

    /// Sets a field value (builder pattern).
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Inserts a field value, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Removes a field and returns its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Stable identity of a logical row.
///
/// Selection and edit sessions are keyed by `RowId`, so it must survive
/// re-sorting and re-filtering of the same logical row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    /// Numeric identity.
    Num(i64),
    /// String identity.
    Str(String),
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Num(n) => write!(f, "{n}"),
            RowId::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RowId {
    fn from(v: i64) -> Self {
        RowId::Num(v)
    }
}

impl From<i32> for RowId {
    fn from(v: i32) -> Self {
        RowId::Num(v as i64)
    }
}

impl From<usize> for RowId {
    fn from(v: usize) -> Self {
        RowId::Num(v as i64)
    }
}

impl From<&str> for RowId {
    fn from(v: &str) -> Self {
        RowId::Str(v.to_string())
    }
}

impl From<String> for RowId {
    fn from(v: String) -> Self {
        RowId::Str(v)
    }
}

type IdFn = Arc<dyn Fn(&Row, usize) -> RowId + Send + Sync>;

/// The `row -> RowId` function, called with the row and its position in the
/// current row set.
///
/// # Caller obligation
///
/// Without an explicit identity ([`RowIdentity::positional`], the default) a
/// row is identified by its position. Positions change whenever the data is
/// re-sorted, filtered or paged, so selection and edit sessions then follow
/// the position, not the logical row. Supply [`RowIdentity::field`] or
/// [`RowIdentity::custom`] whenever rows can be reordered.
#[derive(Clone)]
pub struct RowIdentity {
    kind: IdentityKind,
}

#[derive(Clone)]
enum IdentityKind {
    Positional,
    Field(String),
    Custom(IdFn),
}

impl RowIdentity {
    /// Identity by position in the current row set.
    pub fn positional() -> Self {
        Self {
            kind: IdentityKind::Positional,
        }
    }

    /// Identity read from a field. Integer fields become `RowId::Num`; any
    /// other value uses its display text. A missing or null field falls back
    /// to the position.
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            kind: IdentityKind::Field(name.into()),
        }
    }

    /// Identity computed by a custom function.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Row, usize) -> RowId + Send + Sync + 'static,
    {
        Self {
            kind: IdentityKind::Custom(Arc::new(f)),
        }
    }

    /// Returns `true` for the positional default.
    pub fn is_positional(&self) -> bool {
        matches!(self.kind, IdentityKind::Positional)
    }

    /// Computes the identity of `row` at `index`.
    pub fn id_of(&self, row: &Row, index: usize) -> RowId {
        match &self.kind {
            IdentityKind::Positional => RowId::from(index),
            IdentityKind::Field(name) => match row.get(name) {
                Some(Value::Int(n)) => RowId::Num(*n),
                Some(Value::Null) | None => RowId::from(index),
                Some(other) => RowId::Str(other.to_display_string()),
            },
            IdentityKind::Custom(f) => f(row, index),
        }
    }
}

impl Default for RowIdentity {
    fn default() -> Self {
        Self::positional()
    }
}

impl fmt::Debug for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IdentityKind::Positional => write!(f, "RowIdentity::Positional"),
            IdentityKind::Field(name) => write!(f, "RowIdentity::Field({name:?})"),
            IdentityKind::Custom(_) => write!(f, "RowIdentity::Custom"),
        }
    }
}
