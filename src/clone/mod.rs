//! The clone collaborator: the only code that talks the git transfer protocol.
//!
//! The scheduler only sees the `Cloner` trait. `GitCloner` is the libgit2
//! implementation; tests use counting fakes.

mod git;

pub use git::{CloneAuth, GitCloner};

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

use crate::errors::CloneError;

/// One repository to mirror, derived from a forge record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloneJob {
    /// `owner/name` as reported by the forge.
    pub full_name: String,
    /// Clone URL (or local path) of the remote.
    pub source: String,
    /// Directory the working copy is cloned into.
    pub destination: PathBuf,
    /// Branch fetched in shallow mode, when the forge reports one.
    pub default_branch: Option<String>,
}

/// Clones a job's source into its (already prepared, empty) destination.
#[async_trait]
pub trait Cloner: Send + Sync {
    /// Returns `CloneError::EmptyRepository` when the remote has no history.
    async fn clone_repo(&self, job: &CloneJob) -> Result<(), CloneError>;
}
