//! Bounded-concurrency clone scheduler.
//!
//! One task per clone job, at most `concurrency` of them in flight. A
//! semaphore permit is taken before a task is spawned and released when the
//! task ends, whatever the outcome.
//!
//! The first fatal clone error is kept and cancels the scheduler's own child
//! token, which stops admission. Jobs already admitted are never interrupted:
//! the run ends once every admitted job has settled.

mod state;

pub use state::{CloneEvent, JobStatus, RunSummary};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::clone::{CloneJob, Cloner};
use crate::errors::{ArchiveError, CloneError};
use crate::layout::prepare_destination;

type FirstError = Arc<Mutex<Option<CloneError>>>;

pub struct CloneScheduler {
    cloner: Arc<dyn Cloner>,
    concurrency: usize,
    cancel: CancellationToken,
    event_tx: Option<mpsc::UnboundedSender<CloneEvent>>,
}

impl CloneScheduler {
    /// `cancel` is the process-wide token; the scheduler only ever cancels a child of it.
    pub fn new(cloner: Arc<dyn Cloner>, concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            cloner,
            concurrency: concurrency.max(1),
            cancel,
            event_tx: None,
        }
    }

    /// Set the event channel for progress updates.
    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<CloneEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Clone every job, returning the first fatal error if any job failed.
    pub async fn run(&self, jobs: Vec<CloneJob>) -> Result<RunSummary, ArchiveError> {
        let timer = Instant::now();
        let mut summary = RunSummary::new(jobs.len());

        let stop = self.cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let first_error: FirstError = Arc::new(Mutex::new(None));

        let mut tasks = JoinSet::new();
        let mut admitted: HashMap<tokio::task::Id, CloneJob> = HashMap::new();

        for job in jobs {
            let permit = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            if stop.is_cancelled() {
                break;
            }

            let handle = tasks.spawn(run_job(
                self.cloner.clone(),
                job.clone(),
                stop.clone(),
                self.event_tx.clone(),
                first_error.clone(),
                permit,
            ));
            admitted.insert(handle.id(), job);
        }

        summary.not_started = summary.total - admitted.len();

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, status)) => summary.record(&status),
                Err(join_err) => {
                    // The task died before it could report; settle it here.
                    let Some(job) = admitted.get(&join_err.id()) else {
                        continue;
                    };
                    let err = CloneError::Aborted {
                        url: job.source.clone(),
                    };
                    tracing::error!(clone_url = %job.source, error = %err, "Clone failed");
                    let status = JobStatus::Failed {
                        error: err.to_string(),
                    };
                    emit(
                        &self.event_tx,
                        CloneEvent::Finished {
                            full_name: job.full_name.clone(),
                            status: status.clone(),
                        },
                    );
                    summary.record(&status);
                    record_first_error(&first_error, err);
                    stop.cancel();
                }
            }
        }

        summary.duration = timer.elapsed();
        tracing::info!(
            total = summary.total,
            completed = summary.completed,
            skipped_empty = summary.skipped_empty,
            failed = summary.failed,
            not_started = summary.not_started,
            "Clone phase finished"
        );

        let first = first_error.lock().ok().and_then(|mut slot| slot.take());
        if let Some(err) = first {
            return Err(err.into());
        }
        if !summary.all_success() {
            return Err(ArchiveError::Cancelled);
        }
        Ok(summary)
    }
}

async fn run_job(
    cloner: Arc<dyn Cloner>,
    job: CloneJob,
    stop: CancellationToken,
    event_tx: Option<mpsc::UnboundedSender<CloneEvent>>,
    first_error: FirstError,
    _permit: OwnedSemaphorePermit,
) -> JobStatus {
    emit(
        &event_tx,
        CloneEvent::Started {
            full_name: job.full_name.clone(),
        },
    );
    tracing::info!(
        clone_url = %job.source,
        path = %job.destination.display(),
        "Cloning repository"
    );

    let changed = |status: JobStatus| {
        emit(
            &event_tx,
            CloneEvent::StatusChanged {
                full_name: job.full_name.clone(),
                status,
            },
        )
    };

    changed(JobStatus::Preparing);
    let result = match prepare_destination(&job.destination).await {
        Ok(()) => {
            changed(JobStatus::Cloning);
            clone_isolated(cloner, &job).await
        }
        Err(e) => Err(e),
    };

    let status = match result {
        Ok(()) => {
            tracing::info!(clone_url = %job.source, path = %job.destination.display(), "Cloned repository");
            JobStatus::Completed
        }
        Err(e) if e.is_empty_repository() => {
            tracing::info!(
                clone_url = %job.source,
                path = %job.destination.display(),
                "Skipped empty repository"
            );
            JobStatus::SkippedEmpty
        }
        Err(e) => {
            tracing::error!(clone_url = %job.source, error = %e, "Clone failed");
            let status = JobStatus::Failed {
                error: e.to_string(),
            };
            record_first_error(&first_error, e);
            stop.cancel();
            status
        }
    };

    emit(
        &event_tx,
        CloneEvent::Finished {
            full_name: job.full_name.clone(),
            status: status.clone(),
        },
    );
    status
}

/// Run the clone on its own task so a panicking collaborator becomes an
/// ordinary failure, reported before this job's permit is released.
async fn clone_isolated(cloner: Arc<dyn Cloner>, job: &CloneJob) -> Result<(), CloneError> {
    let owned_job = job.clone();
    tokio::spawn(async move { cloner.clone_repo(&owned_job).await })
        .await
        .unwrap_or_else(|_| {
            Err(CloneError::Aborted {
                url: job.source.clone(),
            })
        })
}

fn record_first_error(slot: &FirstError, err: CloneError) {
    if let Ok(mut slot) = slot.lock()
        && slot.is_none()
    {
        *slot = Some(err);
    }
}

/// Progress is best-effort: a dropped receiver never affects scheduling.
fn emit(tx: &Option<mpsc::UnboundedSender<CloneEvent>>, event: CloneEvent) {
    if let Some(tx) = tx {
        tx.send(event).ok();
    }
}
