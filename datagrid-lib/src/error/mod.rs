//! Error types

mod capability;
mod column;
mod edit;
mod grid;
mod query;

pub use capability::*;
pub use column::*;
pub use edit::*;
pub use grid::*;
pub use query::*;
