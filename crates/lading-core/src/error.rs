//! Error taxonomy shared by the cache, transport and coordination layers.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Coarse classification of a failure; callers branch on this, not on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Policy forbids the operation on this resource.
    Disallowed,
    /// No such cache entry, or the upstream confirmed the resource is absent.
    NotFound,
    /// A bounded wait exceeded its budget.
    Timeout,
    /// The awaited job was cancelled before producing an outcome.
    Interrupted,
    /// Transport-level failure: non-2xx response, protocol or I/O error.
    UpstreamFailure,
    /// Malformed per-location TLS material or missing credentials.
    Configuration,
    /// A digest was computed but its sibling entry could not be written.
    ChecksumPersist,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Disallowed => "disallowed",
            ErrorKind::NotFound => "not found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::UpstreamFailure => "upstream failure",
            ErrorKind::Configuration => "configuration error",
            ErrorKind::ChecksumPersist => "checksum persist error",
        };
        f.write_str(name)
    }
}

/// Shared so a single failure can be handed to every caller joined on it.
type SharedError = Arc<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum TransferError {
    #[error("publishing not allowed in: {resource}")]
    Disallowed { resource: String },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("timed out after {timeout:?} while {operation}: {resource}")]
    Timeout {
        resource:  String,
        operation: &'static str,
        timeout:   Duration,
    },

    #[error("interrupted while {operation}: {resource}. Reason: {reason}")]
    Interrupted {
        resource:  String,
        operation: &'static str,
        reason:    String,
    },

    #[error("remote request failed for: {target}. Reason: {reason}")]
    Upstream {
        target: String,
        reason: String,
        status: Option<u16>,
        #[source]
        source: Option<SharedError>,
    },

    #[error("invalid configuration for {target}: {reason}")]
    Configuration { target: String, reason: String },

    #[error("failed to persist {algorithm} checksum for {target}: {reason}")]
    ChecksumPersist {
        target:    String,
        algorithm: String,
        reason:    String,
    },

    #[error("cache operation failed for {target}: {source}")]
    Cache {
        target: String,
        kind:   ErrorKind,
        #[source]
        source: SharedError,
    },
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::Disallowed { .. } => ErrorKind::Disallowed,
            TransferError::NotFound { .. } => ErrorKind::NotFound,
            TransferError::Timeout { .. } => ErrorKind::Timeout,
            TransferError::Interrupted { .. } => ErrorKind::Interrupted,
            TransferError::Upstream { .. } => ErrorKind::UpstreamFailure,
            TransferError::Configuration { .. } => ErrorKind::Configuration,
            TransferError::ChecksumPersist { .. } => ErrorKind::ChecksumPersist,
            TransferError::Cache { kind, .. } => *kind,
        }
    }

    pub fn upstream(target: impl Into<String>, reason: impl Into<String>) -> Self {
        TransferError::Upstream {
            target: target.into(),
            reason: reason.into(),
            status: None,
            source: None,
        }
    }

    pub fn upstream_with_source(
        target: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        TransferError::Upstream {
            target: target.into(),
            reason: source.to_string(),
            status: None,
            source: Some(Arc::new(source)),
        }
    }

    pub fn configuration(target: impl Into<String>, reason: impl Into<String>) -> Self {
        TransferError::Configuration {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// HTTP status attached to an upstream failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransferError::Upstream { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let err = TransferError::Disallowed {
            resource: "http://foo.com/a".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Disallowed);

        let err = TransferError::upstream("http://foo.com/a", "HTTP/1.1 500 Internal Server Error");
        assert_eq!(err.kind(), ErrorKind::UpstreamFailure);
        assert!(err.to_string().contains("500"));

        let err = TransferError::Cache {
            target: "x".to_string(),
            kind:   ErrorKind::NotFound,
            source: Arc::from(Box::<dyn std::error::Error + Send + Sync>::from("missing")),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_timeout_message_names_resource() {
        let err = TransferError::Timeout {
            resource:  "http://foo.com/path/to/file.txt".to_string(),
            operation: "publishing",
            timeout:   Duration::from_secs(3),
        };
        let msg = err.to_string();
        assert!(msg.contains("publishing"));
        assert!(msg.contains("file.txt"));
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
