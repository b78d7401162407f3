use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::document::Scope;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{scope} document `{id}` not found")]
    NotFound { scope: Scope, id: String },
    #[error("io failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{scope} document `{id}` revision conflict: expected {expected}, found {actual}")]
    Conflict {
        scope: Scope,
        id: String,
        expected: u64,
        actual: u64,
    },
    #[error("legacy config {file} rejected: {reason}")]
    InvalidLegacy { file: String, reason: String },
    #[error("payload could not be serialized: {0}")]
    Serialize(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Io { .. } => ErrorCode::Io,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::InvalidLegacy { .. } => ErrorCode::Legacy,
            Self::Serialize(_) => ErrorCode::Serialize,
        }
    }

    /// True for a missing document and for a missing file on disk.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io { source, .. } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    Io,
    Conflict,
    Legacy,
    Serialize,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "E_NOT_FOUND",
            Self::Io => "E_IO",
            Self::Conflict => "E_CONFLICT",
            Self::Legacy => "E_LEGACY",
            Self::Serialize => "E_SERIALIZE",
        }
    }
}
