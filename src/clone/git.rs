use async_trait::async_trait;
use git2::build::RepoBuilder;
use git2::{Cred, CredentialType, ErrorCode, FetchOptions, RemoteCallbacks, Repository};

use super::{CloneJob, Cloner};
use crate::errors::CloneError;

/// Basic-auth credentials for HTTPS transfers: the principal's login and the API token.
#[derive(Clone)]
pub struct CloneAuth {
    pub username: String,
    pub token: String,
}

impl std::fmt::Debug for CloneAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloneAuth")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// `Cloner` backed by libgit2. Each clone runs on the blocking thread pool.
#[derive(Debug, Clone, Default)]
pub struct GitCloner {
    auth: Option<CloneAuth>,
    shallow: bool,
}

impl GitCloner {
    pub fn new(auth: Option<CloneAuth>) -> Self {
        Self {
            auth,
            shallow: false,
        }
    }

    /// Fetch only the tip of the default branch.
    pub fn with_shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }
}

#[async_trait]
impl Cloner for GitCloner {
    async fn clone_repo(&self, job: &CloneJob) -> Result<(), CloneError> {
        let owned_job = job.clone();
        let auth = self.auth.clone();
        let shallow = self.shallow;

        tokio::task::spawn_blocking(move || clone_blocking(&owned_job, auth.as_ref(), shallow))
            .await
            .map_err(|_| CloneError::Aborted {
                url: job.source.clone(),
            })?
    }
}

fn clone_blocking(job: &CloneJob, auth: Option<&CloneAuth>, shallow: bool) -> Result<(), CloneError> {
    let mut callbacks = RemoteCallbacks::new();

    if let Some(auth) = auth {
        callbacks.credentials(credential_responder(auth.clone()));
    }

    let source = job.source.clone();
    callbacks.sideband_progress(move |data| {
        let text = String::from_utf8_lossy(data);
        let text = text.trim_end();
        if !text.is_empty() {
            tracing::debug!(clone_url = %source, progress = %text, "Remote progress");
        }
        true
    });

    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);

    let plan = fetch_plan(job, shallow);
    let mut builder = RepoBuilder::new();
    if let Some(depth) = plan.depth {
        fetch.depth(depth);
    }
    if let Some(refspec) = plan.refspec {
        builder.remote_create(move |repo, name, url| repo.remote_with_fetch(name, url, &refspec));
    }
    builder.fetch_options(fetch);

    let repo = builder
        .clone(&job.source, &job.destination)
        .map_err(|e| classify(&job.source, e))?;

    if !has_history(&repo).map_err(|e| classify(&job.source, e))? {
        return Err(CloneError::EmptyRepository {
            url: job.source.clone(),
        });
    }

    Ok(())
}

/// How much to fetch for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FetchPlan {
    depth: Option<i32>,
    /// Single-branch fetch refspec replacing the default `+refs/heads/*` one
    refspec: Option<String>,
}

/// Shallow mode fetches one commit, and only the default branch when the forge named one.
fn fetch_plan(job: &CloneJob, shallow: bool) -> FetchPlan {
    if !shallow {
        return FetchPlan {
            depth: None,
            refspec: None,
        };
    }
    FetchPlan {
        depth: Some(1),
        refspec: job
            .default_branch
            .as_deref()
            .map(|branch| format!("+refs/heads/{branch}:refs/remotes/origin/{branch}")),
    }
}

/// Credentials callback answering with the login and token.
///
/// libgit2 re-invokes the callback after a rejection, so only the first call
/// gets credentials.
fn credential_responder(
    auth: CloneAuth,
) -> impl FnMut(&str, Option<&str>, CredentialType) -> Result<Cred, git2::Error> {
    let mut attempts = 0u32;
    move |_url, _username_from_url, _allowed| {
        attempts += 1;
        if attempts > 1 {
            return Err(git2::Error::from_str("credentials rejected by remote"));
        }
        Cred::userpass_plaintext(&auth.username, &auth.token)
    }
}

/// A clone of an empty remote succeeds with an unborn HEAD and no refs.
fn has_history(repo: &Repository) -> Result<bool, git2::Error> {
    match repo.head() {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            Ok(repo.references()?.next().is_some())
        }
        Err(e) => Err(e),
    }
}

fn classify(url: &str, source: git2::Error) -> CloneError {
    if source.message().to_ascii_lowercase().contains("repository is empty") {
        CloneError::EmptyRepository {
            url: url.to_string(),
        }
    } else {
        CloneError::Git {
            url: url.to_string(),
            source,
        }
    }
}
