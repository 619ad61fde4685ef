//! Storage error types

use std::fmt;

use thiserror::Error;

/// What kind of entity was looked for and not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    /// The master version of a rule does not exist
    MasterConfig,
    /// The tagged version of a rule does not exist
    TagConfig,
    /// The rule itself does not exist
    CircuitBreaker,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundKind::MasterConfig => write!(f, "master config"),
            NotFoundKind::TagConfig => write!(f, "tag config"),
            NotFoundKind::CircuitBreaker => write!(f, "circuit breaker"),
        }
    }
}

/// Classification of an error raised by the underlying engine.
///
/// Kept alongside the message so callers can tell a busy database from a
/// corrupt one without parsing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Busy,
    Locked,
    Io,
    Corrupt,
    Constraint,
    /// A write was attempted through a read-only transaction
    ReadOnly,
    /// The engine has been closed
    Closed,
    Other,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Busy => "busy",
            BackendKind::Locked => "locked",
            BackendKind::Io => "io",
            BackendKind::Corrupt => "corrupt",
            BackendKind::Constraint => "constraint",
            BackendKind::ReadOnly => "read-only",
            BackendKind::Closed => "closed",
            BackendKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during storage operations
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A record the operation depends on does not exist
    #[error("{kind} not found: {message}")]
    NotFound { kind: NotFoundKind, message: String },

    /// The caller supplied something the store cannot act on
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A storage invariant does not hold (e.g. a unique key resolved to
    /// a record with a different identity). Signals corruption or a missed
    /// write-path check.
    #[error("storage invariant violated: {0}")]
    Invariant(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage backend error (database, filesystem, etc.)
    #[error("storage backend error ({kind}): {message}")]
    Backend { kind: BackendKind, message: String },
}

impl StoreError {
    pub fn not_found(kind: NotFoundKind, message: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            message: message.into(),
        }
    }

    pub fn backend(kind: BackendKind, message: impl Into<String>) -> Self {
        StoreError::Backend {
            kind,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Engine error kind, if this error came from the engine.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        match self {
            StoreError::Backend { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
