//! Typed errors of the snapshot core.
//!
//! A publish that loses the race is a normal outcome
//! (`registry::PublishOutcome::Superseded`), not an error.
//! Retention partial failures are reported in `retention::RetentionReport`.

use std::fmt;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of a [`SnapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    StorageUnavailable,
    BuildFailed,
    NoPublishedSnapshot,
    GenerationNotAvailable,
    NotCommitted,
    InvalidArgument,
    Corrupted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::StorageUnavailable => "storage_unavailable",
            ErrorKind::BuildFailed => "build_failed",
            ErrorKind::NoPublishedSnapshot => "no_published_snapshot",
            ErrorKind::GenerationNotAvailable => "generation_not_available",
            ErrorKind::NotCommitted => "not_committed",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Corrupted => "corrupted",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SnapError {
    /// Transient: the whole operation is safe to retry.
    #[error("storage unavailable: {message}")]
    StorageUnavailable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The build hook failed. The generation stays allocated but is never published.
    #[error("build failed for family '{family}' generation {generation}: {cause}")]
    BuildFailed {
        family: String,
        generation: u64,
        cause: String,
        #[source]
        source: BoxError,
    },

    #[error("no published snapshot for family '{family}'")]
    NoPublishedSnapshot { family: String },

    #[error("generation {generation} of family '{family}' is not available")]
    GenerationNotAvailable { family: String, generation: u64 },

    #[error("generation {generation} of family '{family}' is not committed")]
    NotCommitted { family: String, generation: u64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("corrupted {what}: {message}")]
    Corrupted { what: String, message: String },
}

impl SnapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SnapError::StorageUnavailable { .. } => ErrorKind::StorageUnavailable,
            SnapError::BuildFailed { .. } => ErrorKind::BuildFailed,
            SnapError::NoPublishedSnapshot { .. } => ErrorKind::NoPublishedSnapshot,
            SnapError::GenerationNotAvailable { .. } => ErrorKind::GenerationNotAvailable,
            SnapError::NotCommitted { .. } => ErrorKind::NotCommitted,
            SnapError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SnapError::Corrupted { .. } => ErrorKind::Corrupted,
        }
    }

    /// Safe to retry the whole operation as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, SnapError::StorageUnavailable { .. })
    }

    pub fn storage(message: impl Into<String>) -> Self {
        SnapError::StorageUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an internal `anyhow` failure (fs I/O, lock, ...) as transient.
    pub fn storage_from(err: anyhow::Error) -> Self {
        SnapError::StorageUnavailable {
            message: format!("{:#}", err),
            source: Some(err.into()),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        SnapError::InvalidArgument(message.into())
    }

    pub fn corrupted(what: impl Into<String>, message: impl Into<String>) -> Self {
        SnapError::Corrupted {
            what: what.into(),
            message: message.into(),
        }
    }

    pub(crate) fn build_failed(family: &str, generation: u64, err: anyhow::Error) -> Self {
        SnapError::BuildFailed {
            family: family.to_string(),
            generation,
            cause: format!("{:#}", err),
            source: err.into(),
        }
    }
}

impl From<std::io::Error> for SnapError {
    fn from(err: std::io::Error) -> Self {
        SnapError::StorageUnavailable {
            message: format!("I/O error: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for SnapError {
    fn from(err: serde_json::Error) -> Self {
        SnapError::corrupted("json", err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SnapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn kinds_and_display() {
        let e = SnapError::NoPublishedSnapshot {
            family: "daily".into(),
        };
        assert_eq!(e.kind(), ErrorKind::NoPublishedSnapshot);
        assert_eq!(e.to_string(), "no published snapshot for family 'daily'");
        assert!(!e.is_transient());

        let e = SnapError::storage("lock busy");
        assert_eq!(e.kind(), ErrorKind::StorageUnavailable);
        assert!(e.is_transient());
        assert_eq!(e.kind().to_string(), "storage_unavailable");
    }

    #[test]
    fn build_failed_keeps_cause_chain() {
        let inner = anyhow::anyhow!("reduce step exploded").context("map/reduce");
        let e = SnapError::build_failed("totals", 7, inner);
        assert_eq!(e.kind(), ErrorKind::BuildFailed);
        let msg = e.to_string();
        assert!(msg.contains("totals"));
        assert!(msg.contains("generation 7"));
        assert!(msg.contains("reduce step exploded"));
        assert!(e.source().is_some());
    }

    #[test]
    fn io_error_is_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e: SnapError = io.into();
        assert!(e.is_transient());
        assert!(e.source().is_some());
    }
}
