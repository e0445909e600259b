//! The archive run: enumerate, clone, report.

use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use forge_archive::archive::Archiver;
use forge_archive::clone::{CloneAuth, GitCloner};
use forge_archive::config::Config;
use forge_archive::forge::HttpApiClient;
use forge_archive::ui::{ArchiveProgress, print_summary};

pub async fn cmd_archive(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping");
            interrupt.cancel();
        }
    });

    let client = HttpApiClient::new(&config.token, cancel.clone())?;
    let archiver = Archiver::new(config.run_options(), &client, cancel.clone());

    let plan = archiver
        .plan()
        .await
        .context("Failed to enumerate repositories")?;
    let total = plan.jobs.len();
    let session_root = plan.session_root.clone();

    println!(
        "Archiving {} repositories of {} into {}",
        style(total).bold(),
        style(&plan.principal.login).cyan(),
        style(session_root.display()).dim()
    );

    let auth = CloneAuth {
        username: plan.principal.login.clone(),
        token: config.token.clone(),
    };
    let cloner = Arc::new(GitCloner::new(Some(auth)).with_shallow(config.shallow));

    let (tx, rx) = mpsc::unbounded_channel();
    let progress = ArchiveProgress::new(total).observe(rx);

    let result = archiver.execute(plan, cloner, Some(tx)).await;
    let tally = progress.await.context("Progress display task failed")?;
    print_summary(&tally, total, &session_root);

    let summary = result.context("Archive run failed")?;
    tracing::info!(
        repositories = summary.settled(),
        completed = summary.completed,
        skipped_empty = summary.skipped_empty,
        duration_ms = summary.duration.as_millis() as u64,
        "Archive finished"
    );
    Ok(())
}
