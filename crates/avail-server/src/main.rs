//! avail registry server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `AVAIL_*`
//! environment overrides, opens the SQLite store and serves the registry API
//! over HTTP.
//!
//! # Registering a subject
//!
//! Registration happens out of band. The password is read from stdin:
//!
//! ```text
//! avail-server register --identifier dana@example.com --handle dana \
//!   --legal-name "Dana Ortiz" --date-of-birth 1998-03-15
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use avail_api::AppState;
use avail_core::{
  identity::RegistrationStatus,
  store::{NewAccount, RegistryStore as _},
};
use avail_store_sqlite::SqliteStore;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rand_core::OsRng;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
struct ServerConfig {
  host:             String,
  port:             u16,
  store_path:       PathBuf,
  session_ttl_secs: u64,
}

fn load_config(path: PathBuf) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8740)?
    .set_default("store_path", "avail.db")?
    .set_default("session_ttl_secs", avail_api::DEFAULT_SESSION_TTL.as_secs())?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("AVAIL"))
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

// ─── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "avail registry server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the registry API (the default).
  Serve,

  /// Register a subject. The password is read from stdin.
  Register {
    /// Login identifier, e.g. an email address.
    #[arg(long)]
    identifier: String,

    /// Public handle, with or without the leading `@`.
    #[arg(long)]
    handle: String,

    #[arg(long)]
    legal_name: String,

    /// YYYY-MM-DD
    #[arg(long)]
    date_of_birth: NaiveDate,

    /// verified | pending | suspended
    #[arg(long, default_value = "pending", value_parser = parse_status)]
    status: RegistrationStatus,

    /// Opaque avatar reference.
    #[arg(long)]
    avatar: Option<String>,
  },
}

fn parse_status(s: &str) -> Result<RegistrationStatus, String> {
  match s.trim().to_ascii_lowercase().as_str() {
    "verified" => Ok(RegistrationStatus::Verified),
    "pending" => Ok(RegistrationStatus::Pending),
    "suspended" => Ok(RegistrationStatus::Suspended),
    other => Err(format!("unknown registration status {other:?}")),
  }
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let server_cfg = load_config(cli.config)?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(store, &server_cfg).await,
    Command::Register { identifier, handle, legal_name, date_of_birth, status, avatar } => {
      let password = read_password()?;
      anyhow::ensure!(!password.is_empty(), "password must not be empty");
      let handle = avail_core::identity::normalize_handle(&handle)
        .context("handle must not be blank")?;

      let salt = SaltString::generate(&mut OsRng);
      let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
        .to_string();

      let record = store
        .register(NewAccount {
          identifier: identifier.trim().to_owned(),
          password_hash,
          legal_name,
          date_of_birth,
          registration_status: status,
          handle,
          avatar_ref: avatar,
        })
        .await
        .context("registration failed")?;

      println!("{} {}", record.subject_id, record.display_handle());
      Ok(())
    }
  }
}

async fn serve(store: SqliteStore, server_cfg: &ServerConfig) -> anyhow::Result<()> {
  let state = AppState::new(Arc::new(store))
    .with_session_ttl(Duration::from_secs(server_cfg.session_ttl_secs));

  let app = avail_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin (no echo).
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_names_parse_case_insensitively() {
    assert_eq!(parse_status("Verified"), Ok(RegistrationStatus::Verified));
    assert_eq!(parse_status(" suspended "), Ok(RegistrationStatus::Suspended));
    assert!(parse_status("banned").is_err());
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/avail.db")), PathBuf::from(home).join("avail.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/avail.db")), PathBuf::from("/tmp/avail.db"));
  }

  #[test]
  fn missing_config_file_uses_defaults() {
    let cfg = load_config(PathBuf::from("/nonexistent/avail-config.toml")).unwrap();
    assert_eq!(cfg.port, 8740);
    assert_eq!(cfg.session_ttl_secs, avail_api::DEFAULT_SESSION_TTL.as_secs());
  }

  #[test]
  fn cli_parses_register() {
    let cli = Cli::try_parse_from([
      "avail-server",
      "register",
      "--identifier",
      "dana@example.com",
      "--handle",
      "@dana",
      "--legal-name",
      "Dana Ortiz",
      "--date-of-birth",
      "1998-03-15",
      "--status",
      "verified",
    ])
    .unwrap();
    let Some(Command::Register { status, date_of_birth, .. }) = cli.command else {
      panic!("expected register");
    };
    assert_eq!(status, RegistrationStatus::Verified);
    assert_eq!(date_of_birth, NaiveDate::from_ymd_opt(1998, 3, 15).unwrap());
  }
}
