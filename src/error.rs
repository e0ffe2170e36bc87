//! Error taxonomy for a sync run.
//!
//! Every failure the core can produce falls into one of five kinds. Only
//! [`SyncError::Validation`] is raised before side effects; everything else
//! is caught by the orchestrator and reduced to a one-line message.

use thiserror::Error;

/// Errors that can end a sync run.
#[derive(Error, Debug)]
pub enum SyncError {
    /// One or more mandatory request fields were missing
    #[error("Missing required fields: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// Clone, fetch or push could not reach or authenticate against the remote
    #[error("Failed to {operation}: {detail}")]
    RemoteAccess {
        operation: &'static str,
        detail: String,
    },

    /// The working directory or its repository could not be cleaned or written
    #[error("Failed to {operation}: {detail}")]
    Filesystem {
        operation: &'static str,
        detail: String,
    },

    /// The export tool exited unsuccessfully
    #[error("Failed to sync from Windmill: {detail}")]
    ImportTool { detail: String },

    /// The remote rejected the pushed ref
    #[error(
        "Push rejected for {reference} ({summary}); {} and the next sync will reset to the remote branch",
        rollback_note(.rolled_back)
    )]
    PushConflict {
        reference: String,
        summary: String,
        rolled_back: bool,
    },
}

fn rollback_note(rolled_back: &bool) -> &'static str {
    if *rolled_back {
        "the local commit was rolled back"
    } else {
        "rolling back the local commit failed"
    }
}

impl SyncError {
    pub fn remote(operation: &'static str, detail: impl ToString) -> Self {
        SyncError::RemoteAccess {
            operation,
            detail: detail.to_string(),
        }
    }

    pub fn filesystem(operation: &'static str, detail: impl ToString) -> Self {
        SyncError::Filesystem {
            operation,
            detail: detail.to_string(),
        }
    }

    pub fn import(detail: impl ToString) -> Self {
        SyncError::ImportTool {
            detail: detail.to_string(),
        }
    }

    /// Stable tag used in structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Validation { .. } => "validation",
            SyncError::RemoteAccess { .. } => "remote_access",
            SyncError::Filesystem { .. } => "filesystem",
            SyncError::ImportTool { .. } => "import_tool",
            SyncError::PushConflict { .. } => "push_conflict",
        }
    }
}
