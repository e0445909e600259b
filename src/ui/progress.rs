//! Terminal progress for the clone phase.
//!
//! `ArchiveProgress` is a pure observer: it drains `CloneEvent`s on its own task
//! and never holds up the scheduler. When stderr is not a terminal the bar is
//! hidden and only the structured logs remain.

use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::scheduler::{CloneEvent, JobStatus};
use crate::ui::icons::{CHECK, CROSS, FOLDER, SKIP, STOP};

/// Terminal outcomes counted from `Finished` events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressTally {
    pub completed: usize,
    pub skipped_empty: usize,
    /// `(full_name, error)` in the order failures arrived
    pub failed: Vec<(String, String)>,
}

impl ProgressTally {
    pub fn record(&mut self, full_name: &str, status: &JobStatus) {
        match status {
            JobStatus::Completed => self.completed += 1,
            JobStatus::SkippedEmpty => self.skipped_empty += 1,
            JobStatus::Failed { error } => self.failed.push((full_name.to_string(), error.clone())),
            _ => {}
        }
    }

    pub fn finished(&self) -> usize {
        self.completed + self.skipped_empty + self.failed.len()
    }
}

pub struct ArchiveProgress {
    bar: ProgressBar,
}

impl ArchiveProgress {
    /// Bar sized to `total` jobs, drawn on stderr when it is a terminal.
    pub fn new(total: usize) -> Self {
        if Term::stderr().is_term() {
            let bar = ProgressBar::new(total as u64);
            bar.enable_steady_tick(Duration::from_millis(120));
            Self::styled(bar)
        } else {
            Self::hidden(total)
        }
    }

    pub fn hidden(total: usize) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total as u64);
        Self::styled(bar)
    }

    fn styled(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {wide_msg}",
                )
                .expect("progress bar template is a valid static string")
                .progress_chars("=> "),
        );
        bar.set_prefix("Cloning");
        Self { bar }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Fold one event into the bar and the tally.
    pub fn apply(&self, event: &CloneEvent, tally: &mut ProgressTally) {
        match event {
            CloneEvent::Started { full_name } => {
                self.bar.set_message(full_name.clone());
            }
            CloneEvent::StatusChanged { .. } => {}
            CloneEvent::Finished { full_name, status } => {
                tally.record(full_name, status);
                if let JobStatus::Failed { error } = status {
                    self.bar.println(format!(
                        "{}{} {}",
                        CROSS,
                        style(full_name).red(),
                        style(error).dim()
                    ));
                }
                self.bar.inc(1);
                self.bar.set_message(full_name.clone());
            }
        }
    }

    /// Consume events until every sender is dropped, then clear the bar.
    pub fn observe(self, mut rx: UnboundedReceiver<CloneEvent>) -> JoinHandle<ProgressTally> {
        tokio::spawn(async move {
            let mut tally = ProgressTally::default();
            while let Some(event) = rx.recv().await {
                self.apply(&event, &mut tally);
            }
            self.bar.finish_and_clear();
            tally
        })
    }
}

/// Human summary printed once the clone phase is over.
pub fn print_summary(tally: &ProgressTally, total: usize, session_root: &Path) {
    println!();
    println!(
        "{}{} cloned, {}{} empty skipped, {}{} failed",
        CHECK,
        style(tally.completed).green().bold(),
        SKIP,
        style(tally.skipped_empty).yellow(),
        CROSS,
        style(tally.failed.len()).red()
    );
    for (full_name, error) in &tally.failed {
        println!("   {} {}", style(full_name).red(), style(error).dim());
    }
    let not_started = total.saturating_sub(tally.finished());
    if not_started > 0 {
        println!("{}{} repositories not started", STOP, style(not_started).yellow());
    }
    println!("{}{}", FOLDER, style(session_root.display()).cyan());
}
