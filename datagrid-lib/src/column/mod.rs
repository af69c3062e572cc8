//! Column definitions and layout
//!
//! A [`Column`] describes how one field is read, shown, sized and edited.
//! [`ColumnLayout`] owns the live widths, order, pinning and visibility.

mod autosize;
mod layout;

pub use autosize::*;
pub use layout::*;

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::model::Row;
use crate::model::Value;

/// Default column width in pixels.
pub const DEFAULT_WIDTH: u32 = 150;

/// Default minimum column width in pixels.
pub const DEFAULT_MIN_WIDTH: u32 = 50;

/// Side a column is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinSide {
    Left,
    Right,
}

type Accessor = Arc<dyn Fn(&Row) -> Value + Send + Sync>;
type Formatter = Arc<dyn Fn(&Value) -> String + Send + Sync>;
type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A column definition.
///
/// By default a column reads the row field named by its key, is sortable,
/// filterable, resizable, reorderable and pinnable, and is not editable.
///
/// # Example
///
/// ```
/// use datagrid_lib::column::{Column, PinSide};
///
/// let name = Column::new("name")
///     .with_header("Name")
///     .with_width(200)
///     .with_pin(PinSide::Left)
///     .with_editable(true)
///     .with_validator(|value| {
///         if value.to_display_string().len() > 20 {
///             Err("too long".to_string())
///         } else {
///             Ok(())
///         }
///     });
///
/// assert_eq!(name.width, 200);
/// ```
#[derive(Clone)]
pub struct Column {
    pub key: String,
    pub header: String,
    pub width: u32,
    pub min_width: u32,
    /// `None` is unbounded.
    pub max_width: Option<u32>,
    pub sortable: bool,
    pub filterable: bool,
    pub resizable: bool,
    pub reorderable: bool,
    pub pinnable: bool,
    pub editable: bool,
    pub pin: Option<PinSide>,
    pub visible: bool,
    accessor: Option<Accessor>,
    formatter: Option<Formatter>,
    validator: Option<Validator>,
}

impl Column {
    /// Creates a column over the field named `key`.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            header: key.clone(),
            key,
            width: DEFAULT_WIDTH,
            min_width: DEFAULT_MIN_WIDTH,
            max_width: None,
            sortable: true,
            filterable: true,
            resizable: true,
            reorderable: true,
            pinnable: true,
            editable: false,
            pin: None,
            visible: true,
            accessor: None,
            formatter: None,
            validator: None,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    pub fn with_min_width(mut self, min_width: u32) -> Self {
        self.min_width = min_width;
        self
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = Some(max_width);
        self
    }

    pub fn with_sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn with_filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    pub fn with_reorderable(mut self, reorderable: bool) -> Self {
        self.reorderable = reorderable;
        self
    }

    pub fn with_pinnable(mut self, pinnable: bool) -> Self {
        self.pinnable = pinnable;
        self
    }

    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Sets the initial pin side.
    pub fn with_pin(mut self, side: PinSide) -> Self {
        self.pin = Some(side);
        self
    }

    /// Sets the initial visibility.
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Reads the cell value with a custom function instead of the key field.
    pub fn with_accessor<F>(mut self, accessor: F) -> Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    /// Formats cell values for display and auto-sizing.
    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Validates edit drafts.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// The cell value of this column in `row`.
    pub fn value(&self, row: &Row) -> Value {
        match &self.accessor {
            Some(accessor) => accessor(row),
            None => row.value(&self.key),
        }
    }

    /// Display text of a cell value.
    pub fn format(&self, value: &Value) -> String {
        match &self.formatter {
            Some(formatter) => formatter(value),
            None => value.to_display_string(),
        }
    }

    /// Runs the validator, if any.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match &self.validator {
            Some(validator) => validator(value),
            None => Ok(()),
        }
    }

    /// Clamps a width into `[min_width, max_width]`.
    pub fn clamp_width(&self, width: u32) -> u32 {
        let width = width.max(self.min_width);
        match self.max_width {
            Some(max) => width.min(max.max(self.min_width)),
            None => width,
        }
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("key", &self.key)
            .field("width", &self.width)
            .field("min_width", &self.min_width)
            .field("max_width", &self.max_width)
            .field("pin", &self.pin)
            .field("visible", &self.visible)
            .field("editable", &self.editable)
            .finish_non_exhaustive()
    }
}
