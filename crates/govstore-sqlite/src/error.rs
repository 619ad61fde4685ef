//! Error types for SQLite storage backend

use govstore_core::storage::{BackendKind, StoreError};
use rusqlite::ErrorCode;
use thiserror::Error;
use tracing::{debug, error};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, SqliteError>;

/// Errors that can occur during SQLite storage operations
#[derive(Debug, Error)]
pub enum SqliteError {
    /// Database connection or query error
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO error (for file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid store configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain error raised inside a transaction
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SqliteError {
    /// Engine error kind of a database error, `None` for anything else.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        match self {
            SqliteError::Database(e) => Some(classify(e)),
            SqliteError::Io(_) => Some(BackendKind::Io),
            SqliteError::Store(e) => e.backend_kind(),
            _ => None,
        }
    }
}

fn classify(err: &rusqlite::Error) -> BackendKind {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::DatabaseBusy => BackendKind::Busy,
            ErrorCode::DatabaseLocked => BackendKind::Locked,
            ErrorCode::SystemIoFailure | ErrorCode::DiskFull | ErrorCode::CannotOpen => {
                BackendKind::Io
            }
            ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => BackendKind::Corrupt,
            ErrorCode::ConstraintViolation => BackendKind::Constraint,
            ErrorCode::ReadOnly => BackendKind::ReadOnly,
            _ => BackendKind::Other,
        },
        _ => BackendKind::Other,
    }
}

/// Convert SqliteError to StoreError for the storage traits
impl From<SqliteError> for StoreError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Store(e) => e,
            SqliteError::Json(e) => StoreError::Serialization(e.to_string()),
            SqliteError::Database(e) => StoreError::backend(classify(&e), format!("SQLite: {}", e)),
            SqliteError::Migration(msg) => {
                StoreError::backend(BackendKind::Other, format!("Migration: {}", msg))
            }
            SqliteError::Io(e) => StoreError::backend(BackendKind::Io, format!("IO: {}", e)),
            SqliteError::Config(msg) => StoreError::InvalidArgument(msg),
        }
    }
}

/// Convert an error at a trait boundary, logging it first.
///
/// Caller mistakes (`NotFound`, `InvalidArgument`) are logged at debug,
/// everything else at error.
pub(crate) fn report(
    component: &'static str,
    op: &'static str,
) -> impl FnOnce(SqliteError) -> StoreError {
    move |err| {
        let err = StoreError::from(err);
        match &err {
            StoreError::NotFound { .. } | StoreError::InvalidArgument(_) => {
                debug!(component, op, error = %err, "request rejected");
            }
            _ => {
                error!(component, op, error = %err, "store operation failed");
            }
        }
        err
    }
}
