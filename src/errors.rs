//! Typed error hierarchy for forge-archive.
//!
//! Four enums cover the subsystems:
//! - `ApiError`: forge REST API failures (transport, status, decoding)
//! - `PlanError`: repository names that cannot be mapped onto disk
//! - `CloneError`: per-repository clone failures, including the benign empty case
//! - `ArchiveError`: the run as a whole

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the forge API client and the enumerator built on it.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to reach forge API at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Forge API returned status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode forge API response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Request to {url} was cancelled")]
    Cancelled { url: String },

    #[error("Cannot build API URL from base {base}: {reason}")]
    InvalidUrl { base: String, reason: String },
}

/// Errors from turning a repository record into a local destination.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Repository name '{full_name}' cannot be mapped to a local path")]
    InvalidName { full_name: String },

    #[error("Repository '{inner}' would be cloned inside '{outer}'")]
    NestedDestination { outer: String, inner: String },
}

/// Errors from a single clone job.
#[derive(Debug, Error)]
pub enum CloneError {
    #[error("Remote repository {url} is empty")]
    EmptyRepository { url: String },

    #[error("Failed to clone {url}: {source}")]
    Git {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to prepare destination {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Clone task for {url} was aborted")]
    Aborted { url: String },
}

impl CloneError {
    /// The one clone failure that is downgraded to a skip.
    pub fn is_empty_repository(&self) -> bool {
        matches!(self, Self::EmptyRepository { .. })
    }
}

/// Errors that end an archive run.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Clone(#[from] CloneError),

    #[error("Failed to clear session directory {path}: {source}")]
    Session {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive run was cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_status_carries_code() {
        let err = ApiError::Status {
            url: "https://forge/api/user".to_string(),
            status: 401,
        };
        match &err {
            ApiError::Status { status, .. } => assert_eq!(*status, 401),
            _ => panic!("Expected Status variant"),
        }
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("https://forge/api/user"));
    }

    #[test]
    fn api_error_transport_exposes_source() {
        use std::error::Error as _;
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ApiError::Transport {
            url: "https://forge/api/user".to_string(),
            source: Box::new(io_err),
        };
        assert!(err.source().is_some());
    }

    #[test]
    fn only_empty_repository_is_benign() {
        let empty = CloneError::EmptyRepository {
            url: "https://forge/a/b.git".to_string(),
        };
        assert!(empty.is_empty_repository());

        let git = CloneError::Git {
            url: "https://forge/a/b.git".to_string(),
            source: git2::Error::from_str("authentication required"),
        };
        assert!(!git.is_empty_repository());

        let aborted = CloneError::Aborted {
            url: "https://forge/a/b.git".to_string(),
        };
        assert!(!aborted.is_empty_repository());
    }

    #[test]
    fn archive_error_converts_from_api_error() {
        let inner = ApiError::Status {
            url: "u".to_string(),
            status: 500,
        };
        let err: ArchiveError = inner.into();
        assert!(matches!(
            err,
            ArchiveError::Api(ApiError::Status { status: 500, .. })
        ));
    }

    #[test]
    fn archive_error_is_transparent_over_clone_error() {
        let inner = CloneError::Aborted {
            url: "https://forge/a/b.git".to_string(),
        };
        let expected = inner.to_string();
        let err: ArchiveError = inner.into();
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error + Send + Sync + 'static>(_: &E) {}
        assert_std_error(&ApiError::Cancelled { url: "u".into() });
        assert_std_error(&PlanError::InvalidName {
            full_name: "..".into(),
        });
        assert_std_error(&CloneError::Aborted { url: "u".into() });
        assert_std_error(&ArchiveError::Cancelled);
    }
}
