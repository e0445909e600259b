//! Run orchestration: enumerate everything first, then clone.
//!
//! The two phases never interleave. `Archiver::plan` either returns the full
//! job list or an error, so a failed enumeration never leads to partial clones.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Url;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::clone::{CloneJob, Cloner};
use crate::errors::ArchiveError;
use crate::forge::{ApiClient, Enumerator, User};
use crate::layout::{SessionLayout, check_disjoint, clear_session, plan_job};
use crate::scheduler::{CloneEvent, CloneScheduler, RunSummary};

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub api: Url,
    pub include_orgs: bool,
    pub layout: SessionLayout,
    pub fresh: bool,
    pub concurrency: usize,
}

/// Output of the enumeration phase.
#[derive(Debug, Clone)]
pub struct Plan {
    pub principal: User,
    pub scopes: Vec<String>,
    pub jobs: Vec<CloneJob>,
    pub session_root: PathBuf,
}

pub struct Archiver<'a> {
    options: RunOptions,
    api: &'a dyn ApiClient,
    cancel: CancellationToken,
}

impl<'a> Archiver<'a> {
    pub fn new(options: RunOptions, api: &'a dyn ApiClient, cancel: CancellationToken) -> Self {
        Self {
            options,
            api,
            cancel,
        }
    }

    /// Enumeration phase: principal, scopes, then every scope's repositories.
    pub async fn plan(&self) -> Result<Plan, ArchiveError> {
        let enumerator = Enumerator::new(self.api, self.options.api.clone());

        let principal = enumerator.principal().await?;
        let scopes = enumerator
            .scopes(&principal, self.options.include_orgs)
            .await?;

        let mut jobs = Vec::new();
        for scope in &scopes {
            for repo in enumerator.repositories(scope).await? {
                jobs.push(plan_job(&self.options.layout, &repo)?);
            }
        }
        check_disjoint(&jobs)?;

        tracing::info!(
            user = %principal.login,
            scopes = scopes.len(),
            repositories = jobs.len(),
            "Enumeration finished"
        );

        Ok(Plan {
            principal,
            scopes,
            jobs,
            session_root: self.options.layout.root(),
        })
    }

    /// Clone phase. In fresh mode the session root is removed before any clone starts.
    pub async fn execute(
        &self,
        plan: Plan,
        cloner: Arc<dyn Cloner>,
        events: Option<mpsc::UnboundedSender<CloneEvent>>,
    ) -> Result<RunSummary, ArchiveError> {
        if self.options.fresh {
            tracing::info!(path = %plan.session_root.display(), "Clearing session directory");
            clear_session(&plan.session_root).await?;
        }

        let mut scheduler = CloneScheduler::new(cloner, self.options.concurrency, self.cancel.clone());
        if let Some(tx) = events {
            scheduler = scheduler.with_event_channel(tx);
        }
        scheduler.run(plan.jobs).await
    }

    /// `plan` followed by `execute`.
    pub async fn run(
        &self,
        cloner: Arc<dyn Cloner>,
        events: Option<mpsc::UnboundedSender<CloneEvent>>,
    ) -> Result<RunSummary, ArchiveError> {
        let plan = self.plan().await?;
        self.execute(plan, cloner, events).await
    }
}
