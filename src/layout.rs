//! Local directory layout for an archive session.
//!
//! Every clone lands at `<base>/<forge host>/<timestamp>/<owner>/<name>`. The
//! host keeps mirrors of different forges apart under one base directory and
//! the timestamp keeps sessions apart.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::clone::CloneJob;
use crate::errors::{ArchiveError, CloneError, PlanError};
use crate::forge::ForgeRepo;

/// Where one session's clones live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    pub base: PathBuf,
    pub host: String,
    pub timestamp: String,
}

impl SessionLayout {
    pub fn new(base: impl Into<PathBuf>, host: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            host: host.into(),
            timestamp: timestamp.into(),
        }
    }

    /// `<base>/<host>/<timestamp>`
    pub fn root(&self) -> PathBuf {
        self.base.join(&self.host).join(&self.timestamp)
    }

    /// `<base>/<host>/<timestamp>/<owner>/<name>`; an empty owner is skipped.
    pub fn destination(&self, owner: &str, name: &str) -> PathBuf {
        let mut path = self.root();
        if !owner.is_empty() {
            path.push(owner);
        }
        path.push(name);
        path
    }
}

/// Split `owner/name` at the rightmost `/`.
///
/// A name without a slash has an empty owner.
pub fn split_full_name(full_name: &str) -> (&str, &str) {
    match full_name.rsplit_once('/') {
        Some((owner, name)) => (owner, name),
        None => ("", full_name),
    }
}

fn is_safe_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['\\', '\0'])
}

/// Turn a repository record into a clone job inside `layout`.
pub fn plan_job(layout: &SessionLayout, repo: &ForgeRepo) -> Result<CloneJob, PlanError> {
    let (owner, name) = split_full_name(&repo.full_name);

    // A single owner segment keeps every destination at the same depth.
    let owner_ok = owner.is_empty() || (is_safe_component(owner) && !owner.contains('/'));
    if !owner_ok || !is_safe_component(name) {
        return Err(PlanError::InvalidName {
            full_name: repo.full_name.clone(),
        });
    }

    Ok(CloneJob {
        full_name: repo.full_name.clone(),
        source: repo.clone_url.clone(),
        destination: layout.destination(owner, name),
        default_branch: repo.default_branch.clone(),
    })
}

/// Fail when one job's destination lies inside another's.
///
/// `prepare_destination` on the outer job would otherwise delete a directory
/// that a sibling job is cloning into. Identical destinations are left alone.
pub fn check_disjoint(jobs: &[CloneJob]) -> Result<(), PlanError> {
    let mut sorted: Vec<&CloneJob> = jobs.iter().collect();
    sorted.sort_by(|a, b| a.destination.cmp(&b.destination));

    // Component-wise ordering puts an ancestor right before its descendants.
    for pair in sorted.windows(2) {
        let (outer, inner) = (pair[0], pair[1]);
        if inner.destination != outer.destination && inner.destination.starts_with(&outer.destination) {
            return Err(PlanError::NestedDestination {
                outer: outer.full_name.clone(),
                inner: inner.full_name.clone(),
            });
        }
    }
    Ok(())
}

/// Remove the whole session root. A missing root is fine.
pub async fn clear_session(root: &Path) -> Result<(), ArchiveError> {
    match tokio::fs::remove_dir_all(root).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ArchiveError::Session {
            path: root.to_path_buf(),
            source,
        }),
    }
}

/// Clear whatever a previous run left at `path` and recreate it empty.
pub async fn prepare_destination(path: &Path) -> Result<(), CloneError> {
    let prepare_err = |source| CloneError::Prepare {
        path: path.to_path_buf(),
        source,
    };

    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(prepare_err(e)),
    }
    tokio::fs::create_dir_all(path).await.map_err(prepare_err)
}
