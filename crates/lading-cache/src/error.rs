use std::path::PathBuf;
use std::sync::Arc;

use lading_core::{ErrorKind, TransferError};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache entry not found: {0}")]
    NotFound(PathBuf),

    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lock cache entry {path}: {source}")]
    Lock {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist {algorithm} checksum to {path}: {source}")]
    ChecksumPersist {
        algorithm: &'static str,
        path:      PathBuf,
        #[source]
        source:    Box<CacheError>,
    },

    #[error("usage tracking failed: {0}")]
    Usage(String),
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::NotFound(_) => ErrorKind::NotFound,
            CacheError::ChecksumPersist { .. } => ErrorKind::ChecksumPersist,
            CacheError::Io { .. } | CacheError::Lock { .. } | CacheError::Usage(_) => {
                ErrorKind::UpstreamFailure
            }
        }
    }

    pub fn is_not_found(&self) -> bool { matches!(self, CacheError::NotFound(_)) }

    fn target(&self) -> String {
        match self {
            CacheError::NotFound(path)
            | CacheError::Io { path, .. }
            | CacheError::Lock { path, .. }
            | CacheError::ChecksumPersist { path, .. } => path.display().to_string(),
            CacheError::Usage(_) => "usage cache".to_string(),
        }
    }
}

impl From<lading_fs::Error> for CacheError {
    fn from(e: lading_fs::Error) -> Self {
        match e {
            lading_fs::Error::NotFound(path) => CacheError::NotFound(path),
            lading_fs::Error::Lock { path, source } => CacheError::Lock { path, source },
            lading_fs::Error::Read { path, source } | lading_fs::Error::Write { path, source } => {
                CacheError::Io { path, source }
            }
        }
    }
}

impl From<CacheError> for TransferError {
    fn from(e: CacheError) -> Self {
        TransferError::Cache {
            target: e.target(),
            kind:   e.kind(),
            source: Arc::new(e),
        }
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
