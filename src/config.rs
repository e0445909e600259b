//! Configuration for an archive run.
//!
//! Values are layered, lowest priority first:
//! 1. built-in defaults
//! 2. the TOML config file (`<config dir>/forge-archive/config.toml` or `--config`)
//! 3. command-line flags
//! 4. `FORGE_API` / `FORGE_TOKEN` from the environment, when non-empty
//!
//! # Configuration File Format
//!
//! ```toml
//! api = "https://codeberg.org/api/v1/"
//! dst = "/srv/mirror"
//! orgs = true
//! concurrency = 8
//! shallow = false
//! verbosity = "info"
//! log_format = "json"
//! ```

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::archive::RunOptions;
use crate::layout::SessionLayout;

pub const DEFAULT_API: &str = "https://api.github.com/";
pub const API_ENV: &str = "FORGE_API";
pub const TOKEN_ENV: &str = "FORGE_TOKEN";

/// Log line format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable lines
    Pretty,
}

/// Contents of the optional config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveToml {
    pub api: Option<String>,
    pub token: Option<String>,
    pub orgs: Option<bool>,
    pub dst: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub shallow: Option<bool>,
    pub fresh: Option<bool>,
    pub verbosity: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl ArchiveToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// Load `explicit` if given (it must exist), else the default location if it exists.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Values taken from the command line. `None`/`false` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api: Option<String>,
    pub token: Option<String>,
    pub orgs: bool,
    pub dst: Option<PathBuf>,
    pub timestamp: Option<String>,
    pub fresh: bool,
    pub concurrency: Option<usize>,
    pub shallow: bool,
    pub verbosity: Option<String>,
    pub verbose: bool,
    pub log_format: Option<LogFormat>,
}

/// Fully resolved and validated configuration.
#[derive(Clone)]
pub struct Config {
    pub api: Url,
    pub host: String,
    pub token: String,
    pub include_orgs: bool,
    pub dst: PathBuf,
    pub timestamp: String,
    pub fresh: bool,
    pub concurrency: usize,
    pub shallow: bool,
    pub log_level: tracing::Level,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api", &self.api.as_str())
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .field("include_orgs", &self.include_orgs)
            .field("dst", &self.dst)
            .field("timestamp", &self.timestamp)
            .field("fresh", &self.fresh)
            .field("concurrency", &self.concurrency)
            .field("shallow", &self.shallow)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    /// Merge the layers and validate the result. `env` looks up environment variables.
    pub fn resolve(
        cli: CliOverrides,
        file: ArchiveToml,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let from_env = |key: &str| env(key).filter(|v| !v.is_empty());

        let api = from_env(API_ENV)
            .or(cli.api)
            .or(file.api)
            .unwrap_or_else(|| DEFAULT_API.to_string());
        let api = Url::parse(&api).with_context(|| format!("Invalid API URL '{}'", api))?;
        let host = api
            .host_str()
            .map(str::to_string)
            .with_context(|| format!("API URL '{}' has no host", api))?;

        let token = from_env(TOKEN_ENV).or(cli.token).or(file.token).unwrap_or_default();
        if token.trim().is_empty() {
            bail!(
                "missing token: pass --token or set {} (or `token` in the config file)",
                TOKEN_ENV
            );
        }

        let concurrency = cli
            .concurrency
            .or(file.concurrency)
            .unwrap_or_else(default_concurrency);
        if concurrency == 0 {
            bail!("concurrency must be at least 1");
        }

        let timestamp = cli
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp().to_string());
        validate_timestamp(&timestamp)?;

        let log_level = if cli.verbose {
            tracing::Level::DEBUG
        } else {
            let name = cli.verbosity.or(file.verbosity).unwrap_or_else(|| "info".to_string());
            name.parse::<tracing::Level>().map_err(|_| {
                anyhow::anyhow!(
                    "Invalid verbosity '{}'. Valid values: trace, debug, info, warn, error",
                    name
                )
            })?
        };

        Ok(Self {
            api,
            host,
            token,
            include_orgs: cli.orgs || file.orgs.unwrap_or(false),
            dst: cli.dst.or(file.dst).unwrap_or_else(default_dst),
            timestamp,
            fresh: cli.fresh || file.fresh.unwrap_or(false),
            concurrency,
            shallow: cli.shallow || file.shallow.unwrap_or(false),
            log_level,
            log_format: cli.log_format.or(file.log_format).unwrap_or_default(),
        })
    }

    pub fn layout(&self) -> SessionLayout {
        SessionLayout::new(&self.dst, &self.host, &self.timestamp)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            api: self.api.clone(),
            include_orgs: self.include_orgs,
            layout: self.layout(),
            fresh: self.fresh,
            concurrency: self.concurrency,
        }
    }
}

/// The timestamp becomes a single directory name.
fn validate_timestamp(timestamp: &str) -> Result<()> {
    if timestamp.is_empty()
        || timestamp == "."
        || timestamp == ".."
        || timestamp.contains(['/', '\\', '\0'])
    {
        bail!(
            "Invalid timestamp '{}': it must be usable as a single directory name",
            timestamp
        );
    }
    Ok(())
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("forge-archive").join("config.toml"))
}

pub fn default_dst() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("forge-archive").join("data"))
        .unwrap_or_else(|| PathBuf::from("forge-archive-data"))
}

pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn with_token() -> CliOverrides {
        CliOverrides {
            token: Some("tok".to_string()),
            timestamp: Some("1700000000".to_string()),
            ..Default::default()
        }
    }

    fn env_map(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(with_token(), ArchiveToml::default(), no_env).unwrap();
        assert_eq!(config.api.as_str(), DEFAULT_API);
        assert_eq!(config.host, "api.github.com");
        assert!(!config.include_orgs);
        assert!(!config.fresh);
        assert!(!config.shallow);
        assert_eq!(config.concurrency, default_concurrency());
        assert_eq!(config.log_level, tracing::Level::INFO);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.dst, default_dst());
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let cli = CliOverrides {
            token: Some("   ".to_string()),
            ..Default::default()
        };
        let err = Config::resolve(cli, ArchiveToml::default(), no_env).unwrap_err();
        assert!(err.to_string().contains("missing token"));
    }

    #[test]
    fn test_env_overrides_flags() {
        let cli = CliOverrides {
            api: Some("https://flag.example/api/".to_string()),
            ..with_token()
        };
        let env = env_map(&[(API_ENV, "https://env.example/api/v1/"), (TOKEN_ENV, "envtok")]);
        let config = Config::resolve(cli, ArchiveToml::default(), env).unwrap();
        assert_eq!(config.host, "env.example");
        assert_eq!(config.token, "envtok");
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let env = env_map(&[(TOKEN_ENV, "")]);
        let config = Config::resolve(with_token(), ArchiveToml::default(), env).unwrap();
        assert_eq!(config.token, "tok");
    }

    #[test]
    fn test_token_from_env_only() {
        let cli = CliOverrides {
            timestamp: Some("1".to_string()),
            ..Default::default()
        };
        let config = Config::resolve(cli, ArchiveToml::default(), env_map(&[(TOKEN_ENV, "abc")])).unwrap();
        assert_eq!(config.token, "abc");
    }

    #[test]
    fn test_flags_override_file() {
        let file = ArchiveToml {
            api: Some("https://file.example/api/v1/".to_string()),
            concurrency: Some(2),
            dst: Some(PathBuf::from("/from/file")),
            ..Default::default()
        };
        let cli = CliOverrides {
            concurrency: Some(7),
            ..with_token()
        };
        let config = Config::resolve(cli, file, no_env).unwrap();
        assert_eq!(config.host, "file.example");
        assert_eq!(config.concurrency, 7);
        assert_eq!(config.dst, PathBuf::from("/from/file"));
    }

    #[test]
    fn test_file_booleans_apply() {
        let file = ArchiveToml {
            orgs: Some(true),
            shallow: Some(true),
            ..Default::default()
        };
        let config = Config::resolve(with_token(), file, no_env).unwrap();
        assert!(config.include_orgs);
        assert!(config.shallow);
        assert!(!config.fresh);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let cli = CliOverrides {
            concurrency: Some(0),
            ..with_token()
        };
        assert!(Config::resolve(cli, ArchiveToml::default(), no_env).is_err());
    }

    #[test]
    fn test_api_without_host_rejected() {
        let cli = CliOverrides {
            api: Some("file:///tmp/api".to_string()),
            ..with_token()
        };
        let err = Config::resolve(cli, ArchiveToml::default(), no_env).unwrap_err();
        assert!(err.to_string().contains("no host"));
    }

    #[test]
    fn test_timestamp_must_be_single_component() {
        for bad in ["", "..", "a/b", "a\\b"] {
            let cli = CliOverrides {
                timestamp: Some(bad.to_string()),
                ..with_token()
            };
            assert!(
                Config::resolve(cli, ArchiveToml::default(), no_env).is_err(),
                "timestamp {:?} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_default_timestamp_is_unix_seconds() {
        let cli = CliOverrides {
            token: Some("tok".to_string()),
            ..Default::default()
        };
        let config = Config::resolve(cli, ArchiveToml::default(), no_env).unwrap();
        let secs: i64 = config.timestamp.parse().unwrap();
        assert!(secs > 1_600_000_000);
    }

    #[test]
    fn test_verbose_wins_over_verbosity() {
        let cli = CliOverrides {
            verbosity: Some("error".to_string()),
            verbose: true,
            ..with_token()
        };
        let config = Config::resolve(cli, ArchiveToml::default(), no_env).unwrap();
        assert_eq!(config.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn test_invalid_verbosity() {
        let cli = CliOverrides {
            verbosity: Some("loud".to_string()),
            ..with_token()
        };
        let err = Config::resolve(cli, ArchiveToml::default(), no_env).unwrap_err();
        assert!(err.to_string().contains("Invalid verbosity"));
    }

    #[test]
    fn test_run_options_layout() {
        let cli = CliOverrides {
            api: Some("https://codeberg.org/api/v1".to_string()),
            dst: Some(PathBuf::from("/mirror")),
            orgs: true,
            fresh: true,
            concurrency: Some(3),
            ..with_token()
        };
        let options = Config::resolve(cli, ArchiveToml::default(), no_env)
            .unwrap()
            .run_options();
        assert_eq!(options.layout.root(), PathBuf::from("/mirror/codeberg.org/1700000000"));
        assert!(options.include_orgs);
        assert!(options.fresh);
        assert_eq!(options.concurrency, 3);
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = Config::resolve(with_token(), ArchiveToml::default(), no_env).unwrap();
        let shown = format!("{:?}", config);
        assert!(shown.contains("<redacted>"));
        assert!(!shown.contains("\"tok\""));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            api = "https://codeberg.org/api/v1/"
            orgs = true
            concurrency = 8
            log_format = "pretty"
        "#;
        let file = ArchiveToml::parse(toml).unwrap();
        assert_eq!(file.api.as_deref(), Some("https://codeberg.org/api/v1/"));
        assert_eq!(file.orgs, Some(true));
        assert_eq!(file.concurrency, Some(8));
        assert_eq!(file.log_format, Some(LogFormat::Pretty));
        assert!(file.token.is_none());
    }

    #[test]
    fn test_parse_toml_rejects_unknown_keys() {
        assert!(ArchiveToml::parse("paralelism = 3").is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(ArchiveToml::load_or_default(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "shallow = true\n").unwrap();
        let file = ArchiveToml::load_or_default(Some(&path)).unwrap();
        assert_eq!(file.shallow, Some(true));
    }
}
