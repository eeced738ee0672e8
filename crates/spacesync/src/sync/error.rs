use std::time::Duration;

use thiserror::Error;

use crate::space::{Cancelled, ContentNode, SpaceError};

/// Errors that can occur while syncing an item.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A space call failed.
    #[error(transparent)]
    Space(#[from] SpaceError),

    /// The run was cancelled.
    #[error("Sync cancelled")]
    Cancelled,

    /// The item did not finish within its time budget.
    #[error("Item timed out after {0:?}")]
    Timeout(Duration),

    /// An ancestor folder missing in the target has no definition in the source.
    #[error("Source folder not found: {path}")]
    MissingSourceFolder { path: String },

    /// A record came back from the space without an id.
    #[error("Record has no id: {path}")]
    MissingId { path: String },

    /// A payload could not be converted.
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A required configuration field was not set.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },
}

impl From<Cancelled> for SyncError {
    fn from(_: Cancelled) -> Self {
        SyncError::Cancelled
    }
}

impl SyncError {
    /// Whether the underlying space error signals a missing dependency.
    pub fn is_unprocessable(&self) -> bool {
        matches!(self, SyncError::Space(e) if e.is_unprocessable())
    }

    /// Whether the underlying space error signals throttling.
    pub fn is_throttled(&self) -> bool {
        matches!(self, SyncError::Space(e) if e.is_throttled())
    }
}

/// Failure while materializing a folder chain.
///
/// Folders created before the failure stay in the target and are reported here.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct FolderPathError {
    /// Folders created before the failure, in creation order.
    pub created: Vec<ContentNode>,
    /// The first error encountered.
    #[source]
    pub error: SyncError,
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
