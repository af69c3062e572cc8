//! Top-level grid error

use super::CapabilityError;
use super::ColumnError;
use super::EditError;

/// Unified error type for grid operations.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// Request shape unsupported by the data source.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Column layout error.
    #[error(transparent)]
    Column(#[from] ColumnError),

    /// Edit session error.
    #[error(transparent)]
    Edit(#[from] EditError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The requested page starts past any addressable row.
    #[error("Page {0} is out of range")]
    PageOutOfRange(usize),

    /// The grid has been disposed.
    #[error("Grid has been disposed")]
    Disposed,
}

impl GridError {
    /// Returns `true` if this error was raised before anything was dispatched
    /// to the data source.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Capability(_) | Self::Config(_))
    }
}
