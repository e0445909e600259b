use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use forge_archive::config::{ArchiveToml, CliOverrides, Config, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "forge-archive")]
#[command(
    version,
    about = "Mirror every repository of a GitHub or Forgejo user onto local disk"
)]
pub struct Cli {
    /// Forge API base URL [env: FORGE_API, takes precedence]
    #[arg(long)]
    pub api: Option<String>,

    /// API token, also used for HTTPS clone auth [env: FORGE_TOKEN, takes precedence]
    #[arg(long)]
    pub token: Option<String>,

    /// Also archive repositories of the user's organizations
    #[arg(long)]
    pub orgs: bool,

    /// Destination base directory
    #[arg(long)]
    pub dst: Option<PathBuf>,

    /// Session directory name (defaults to the current Unix time)
    #[arg(long)]
    pub timestamp: Option<String>,

    /// Remove the session directory before cloning
    #[arg(long)]
    pub fresh: bool,

    /// Maximum number of simultaneous clones (defaults to the CPU count)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Fetch only the tip of each default branch
    #[arg(long)]
    pub shallow: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    pub verbosity: Option<String>,

    /// Shorthand for --verbosity debug
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Config file (defaults to <config dir>/forge-archive/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            api: self.api.clone(),
            token: self.token.clone(),
            orgs: self.orgs,
            dst: self.dst.clone(),
            timestamp: self.timestamp.clone(),
            fresh: self.fresh,
            concurrency: self.concurrency,
            shallow: self.shallow,
            verbosity: self.verbosity.clone(),
            verbose: self.verbose,
            log_format: self.log_format,
        }
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "forge_archive={}",
            config.log_level.as_str().to_ascii_lowercase()
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.with_target(false).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let file = ArchiveToml::load_or_default(cli.config.as_deref())?;
    let config = Config::resolve(cli.overrides(), file, |key| std::env::var(key).ok())?;
    init_tracing(&config)?;
    tracing::debug!(config = ?config, "Resolved configuration");

    cmd::cmd_archive(config).await
}
