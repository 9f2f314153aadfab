//! `avail` — interactive client for the availability registry.
//!
//! # Usage
//!
//! ```text
//! avail --url http://localhost:8740
//! avail --config ~/.config/avail/config.toml
//! ```
//!
//! Every run starts signed out. A server session left behind by an earlier run
//! is revoked on start-up rather than resumed.

mod client;
mod error;
mod shell;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use avail_core::{
  DEFAULT_TIMEOUT,
  dashboard::Dashboard,
  declaration_store::DeclarationStore,
  marker::MemoryMarker,
  profile::{ProfileLoader, PublicLookup},
  session::SessionGuard,
};
use clap::Parser;
use client::{ApiClient, ApiConfig};
use serde::Deserialize;
use shell::{Command, Flow, Shell};
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "avail", about = "Interactive client for the availability registry")]
struct Args {
  /// Path to a TOML config file (url, token_file, timeout_secs).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the registry server (default: http://localhost:8740).
  #[arg(long, env = "AVAIL_URL")]
  url: Option<String>,

  /// Where the session token is kept (default: ~/.config/avail/session.json).
  #[arg(long, env = "AVAIL_TOKEN_FILE", value_name = "FILE")]
  token_file: Option<PathBuf>,

  /// Upper bound on every remote call, in seconds.
  #[arg(long, env = "AVAIL_TIMEOUT")]
  timeout_secs: Option<u64>,
}

// ─── Config file ─────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:          String,
  token_file:   Option<PathBuf>,
  timeout_secs: Option<u64>,
}

fn default_token_file() -> Option<PathBuf> {
  std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/avail/session.json"))
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url:   args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8740".to_string()),
    token_file: args
      .token_file
      .or(file_cfg.token_file)
      .or_else(default_token_file),
  };
  let timeout = args
    .timeout_secs
    .or(file_cfg.timeout_secs)
    .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

  let client = ApiClient::new(api_config).context("building HTTP client")?;
  let dashboard = Dashboard::new(
    SessionGuard::new(client.clone(), MemoryMarker::new()).with_timeout(timeout),
    ProfileLoader::new(client.clone()).with_timeout(timeout),
    DeclarationStore::new(client.clone()).with_timeout(timeout),
  );
  let shell = Shell::new(dashboard, PublicLookup::new(client).with_timeout(timeout));

  run(&shell).await
}

// ─── Read loop ───────────────────────────────────────────────────────────────

async fn run<I, M, P, D, L>(shell: &Shell<I, M, P, D, L>) -> Result<()>
where
  I: avail_core::store::IdentityService,
  M: avail_core::store::MarkerStore,
  P: avail_core::store::ProfileRecords,
  D: avail_core::store::DeclarationRecords,
  L: avail_core::store::RegistryLookup,
{
  let mut stdout = tokio::io::stdout();
  let mut lines = BufReader::new(tokio::io::stdin()).lines();

  stdout.write_all(shell.start().await.as_bytes()).await?;

  loop {
    stdout.write_all(b"avail> ").await?;
    stdout.flush().await?;
    let Some(line) = lines.next_line().await.context("reading stdin")? else {
      break;
    };
    if line.trim().is_empty() {
      continue;
    }

    let output = match line.parse::<Command>() {
      Err(usage) => format!("{usage}\n"),
      Ok(Command::Login(identifier)) => {
        stdout.write_all(b"secret: ").await?;
        stdout.flush().await?;
        let secret = lines.next_line().await.context("reading stdin")?.unwrap_or_default();
        shell.login(&identifier, secret).await
      }
      Ok(command) => {
        let (output, flow) = shell.execute(command).await;
        if flow == Flow::Quit {
          break;
        }
        output
      }
    };
    stdout.write_all(output.as_bytes()).await?;
  }

  Ok(())
}
