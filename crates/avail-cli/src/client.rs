//! Async HTTP client for the registry JSON API.
//!
//! [`ApiClient`] implements every remote contract the core consumes, so one
//! client (cloned) backs the identity service, the profile and declaration
//! records, and public lookup.
//!
//! The bearer token is the server half of the session. It is kept in a token
//! file so it survives the process; the local marker does not, which is what
//! makes a fresh process tear a surviving server session down.

use std::{
  fs::OpenOptions,
  io::Write as _,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use avail_core::{
  SubjectId,
  declaration::{Declaration, NewDeclaration},
  identity::{IdentityRecord, PublicEntry},
  store::{
    Credentials, DeclarationRecords, IdentityService, IssuedSession, ProfileRecords,
    RegistryLookup, Session, SignIn,
  },
};
use parking_lot::Mutex;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Connection settings for the registry API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url:   String,
  /// Where the bearer token is persisted. `None` keeps it in memory only.
  pub token_file: Option<PathBuf>,
}

/// On-disk shape of the token file.
#[derive(Serialize, Deserialize)]
struct TokenFile {
  token: String,
}

/// Async HTTP client for the registry API.
///
/// Cheap to clone; clones share the HTTP connection pool and the token.
#[derive(Clone)]
pub struct ApiClient {
  client:     Client,
  base_url:   String,
  token:      Arc<Mutex<Option<String>>>,
  token_file: Option<PathBuf>,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    let token = match &config.token_file {
      Some(path) => read_token(path)?,
      None => None,
    };
    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_owned(),
      token: Arc::new(Mutex::new(token)),
      token_file: config.token_file,
    })
  }

  fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match self.token.lock().clone() {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  pub fn has_token(&self) -> bool { self.token.lock().is_some() }

  fn store_token(&self, token: Option<String>) -> Result<()> {
    if let Some(path) = &self.token_file {
      match &token {
        Some(token) => write_token(path, token)?,
        None => remove_token(path)?,
      }
    }
    *self.token.lock() = token;
    Ok(())
  }
}

// ─── Token file ──────────────────────────────────────────────────────────────

fn read_token(path: &Path) -> Result<Option<String>> {
  match std::fs::read_to_string(path) {
    Ok(raw) => Ok(Some(serde_json::from_str::<TokenFile>(&raw)?.token)),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(e.into()),
  }
}

fn write_token(path: &Path, token: &str) -> Result<()> {
  if let Some(dir) = path.parent() {
    std::fs::create_dir_all(dir)?;
  }
  let raw = serde_json::to_string(&TokenFile { token: token.to_owned() })?;

  // Owner-only: the token is a bearer credential.
  let mut options = OpenOptions::new();
  options.write(true).create(true).truncate(true);
  #[cfg(unix)]
  std::os::unix::fs::OpenOptionsExt::mode(&mut options, 0o600);
  let mut file = options.open(path)?;
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt as _;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
  }
  file.write_all(raw.as_bytes())?;
  Ok(())
}

fn remove_token(path: &Path) -> Result<()> {
  match std::fs::remove_file(path) {
    Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
    _ => Ok(()),
  }
}

// ─── Responses ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

/// The `{"error": …}` message of a failed response, or its status text.
async fn error_message(resp: Response) -> String {
  let status = resp.status();
  match resp.json::<ErrorBody>().await {
    Ok(body) => body.error,
    Err(_) => status.to_string(),
  }
}

async fn unexpected(resp: Response) -> ClientError {
  let status = resp.status().as_u16();
  ClientError::Status { status, message: error_message(resp).await }
}

// ─── IdentityService ─────────────────────────────────────────────────────────

impl IdentityService for ApiClient {
  type Error = ClientError;

  /// `POST /session`
  ///
  /// A token still held from an earlier session is revoked first, on a
  /// best-effort basis.
  async fn sign_in(&self, credentials: Credentials) -> Result<SignIn> {
    if self.has_token()
      && let Err(e) = self.sign_out().await
    {
      warn!(error = %e, "could not revoke the previous session");
    }

    let resp = self
      .client
      .post(self.url("/session"))
      .json(&credentials)
      .send()
      .await?;

    match resp.status() {
      StatusCode::CREATED => {
        let issued: IssuedSession = resp.json().await?;
        self.store_token(Some(issued.token))?;
        Ok(SignIn::Granted(issued.session))
      }
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
        Ok(SignIn::Denied(error_message(resp).await))
      }
      _ => Err(unexpected(resp).await),
    }
  }

  /// `DELETE /session`
  ///
  /// The token is forgotten only once the server confirmed the revoke.
  async fn sign_out(&self) -> Result<()> {
    if !self.has_token() {
      return Ok(());
    }
    let resp = self
      .auth(self.client.delete(self.url("/session")))
      .send()
      .await?;
    if !resp.status().is_success() {
      return Err(unexpected(resp).await);
    }
    self.store_token(None)?;
    debug!("server session revoked");
    Ok(())
  }

  /// `GET /session`
  async fn get_session(&self) -> Result<Option<Session>> {
    if !self.has_token() {
      return Ok(None);
    }
    let resp = self
      .auth(self.client.get(self.url("/session")))
      .send()
      .await?;
    match resp.status() {
      StatusCode::OK => Ok(Some(resp.json().await?)),
      StatusCode::UNAUTHORIZED => {
        debug!("stored token no longer names a session");
        Ok(None)
      }
      _ => Err(unexpected(resp).await),
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

impl ProfileRecords for ApiClient {
  type Error = ClientError;

  /// `GET /profiles/{subject_id}`
  async fn get_profile(&self, subject_id: SubjectId) -> Result<Option<IdentityRecord>> {
    let resp = self
      .auth(self.client.get(self.url(&format!("/profiles/{subject_id}"))))
      .send()
      .await?;
    match resp.status() {
      StatusCode::OK => Ok(Some(resp.json().await?)),
      StatusCode::NOT_FOUND => Ok(None),
      _ => Err(unexpected(resp).await),
    }
  }
}

impl DeclarationRecords for ApiClient {
  type Error = ClientError;

  /// `POST /declarations`
  async fn insert_declaration(&self, input: NewDeclaration) -> Result<Declaration> {
    let resp = self
      .auth(self.client.post(self.url("/declarations")))
      .json(&input)
      .send()
      .await?;
    if resp.status() != StatusCode::CREATED {
      let err = unexpected(resp).await;
      warn!(error = %err, "declaration rejected");
      return Err(err);
    }
    Ok(resp.json().await?)
  }

  /// `GET /declarations?subject_id=<id>`
  async fn list_declarations(&self, subject_id: SubjectId) -> Result<Vec<Declaration>> {
    let resp = self
      .auth(self.client.get(self.url("/declarations")))
      .query(&[("subject_id", subject_id.to_string())])
      .send()
      .await?;
    if !resp.status().is_success() {
      return Err(unexpected(resp).await);
    }
    Ok(resp.json().await?)
  }
}

impl RegistryLookup for ApiClient {
  type Error = ClientError;

  /// `GET /lookup?handle=<handle>`
  async fn lookup(&self, handle: String) -> Result<Option<PublicEntry>> {
    let resp = self
      .auth(self.client.get(self.url("/lookup")))
      .query(&[("handle", handle)])
      .send()
      .await?;
    match resp.status() {
      StatusCode::OK => Ok(Some(resp.json().await?)),
      StatusCode::NOT_FOUND => Ok(None),
      _ => Err(unexpected(resp).await),
    }
  }
}
