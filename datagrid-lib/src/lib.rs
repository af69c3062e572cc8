//! Headless data grid core
//!
//! The reactive state behind a tabular data component: row windowing,
//! versioned querying of a pluggable [`DataSource`](source::DataSource),
//! selection, column layout and cell editing. Rendering is left to the
//! caller.

pub mod column;
pub mod config;
pub mod edit;
pub mod error;
pub mod events;
pub mod grid;
pub mod model;
pub mod query;
pub mod selection;
pub mod source;
pub mod window;

pub use config::GridConfig;
pub use error::GridError;
pub use events::GridEvent;
pub use grid::GridState;
