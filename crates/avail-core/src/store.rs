//! Remote contracts consumed by the core, and the server-side registry trait.
//!
//! The client-facing traits ([`IdentityService`], [`ProfileRecords`],
//! [`DeclarationRecords`], [`RegistryLookup`], [`MarkerStore`]) are what the
//! sync components are generic over. They are implemented by the HTTP client
//! in `avail-cli` and by fakes in tests.
//!
//! [`RegistryStore`] is the persistence abstraction behind the HTTP API. It is
//! implemented by storage backends (e.g. `avail-store-sqlite`).

use std::{future::Future, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  SubjectId,
  declaration::{Declaration, NewDeclaration},
  identity::{IdentityRecord, PublicEntry, RegistrationStatus},
};

// ─── Session types ───────────────────────────────────────────────────────────

/// Identifier and secret typed in at login.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
  pub identifier: String,
  pub secret:     String,
}

impl Credentials {
  pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
    Self { identifier: identifier.into(), secret: secret.into() }
  }
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("identifier", &self.identifier)
      .field("secret", &"<redacted>")
      .finish()
  }
}

/// A server-confirmed session, as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub subject_id: SubjectId,
  pub expires_at: DateTime<Utc>,
}

/// Outcome of a sign-in attempt that reached the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignIn {
  Granted(Session),
  /// Credentials rejected; carries a human-readable reason.
  Denied(String),
}

// ─── Client-side contracts ───────────────────────────────────────────────────

/// The identity service: owns the server half of a session.
pub trait IdentityService: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn sign_in(
    &self,
    credentials: Credentials,
  ) -> impl Future<Output = Result<SignIn, Self::Error>> + Send + '_;

  /// Revoke the current server session. Signing out without a session is a
  /// no-op.
  fn sign_out(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The current server session, or `None` if there is none or it expired.
  fn get_session(
    &self,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// The subject of the current server session, if any.
  fn get_current_user(
    &self,
  ) -> impl Future<Output = Result<Option<SubjectId>, Self::Error>> + Send + '_ {
    async move { Ok(self.get_session().await?.map(|s| s.subject_id)) }
  }
}

/// Tab-scoped storage for the local session marker.
///
/// Implementations must not persist the marker beyond the lifetime of the
/// client instance that wrote it.
pub trait MarkerStore: Send + Sync {
  fn read(&self) -> Option<String>;
  fn write(&self, subject: &str);
  fn clear(&self);
}

/// Read-only access to identity records.
pub trait ProfileRecords: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Point lookup. Returns `None` if the subject has no record.
  fn get_profile(
    &self,
    subject_id: SubjectId,
  ) -> impl Future<Output = Result<Option<IdentityRecord>, Self::Error>> + Send + '_;
}

/// Insert-only access to declarations.
pub trait DeclarationRecords: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Append a declaration. The store assigns id, `seq` and `created_at`.
  fn insert_declaration(
    &self,
    input: NewDeclaration,
  ) -> impl Future<Output = Result<Declaration, Self::Error>> + Send + '_;

  /// All declarations of `subject_id`, newest first.
  fn list_declarations(
    &self,
    subject_id: SubjectId,
  ) -> impl Future<Output = Result<Vec<Declaration>, Self::Error>> + Send + '_;
}

/// Public lookup of other subjects by handle.
pub trait RegistryLookup: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `handle` is already normalised (no leading `@`).
  fn lookup(
    &self,
    handle: String,
  ) -> impl Future<Output = Result<Option<PublicEntry>, Self::Error>> + Send + '_;
}

// ─── Server-side registry ────────────────────────────────────────────────────

/// Input to [`RegistryStore::register`]. Registration happens out of band.
#[derive(Debug, Clone)]
pub struct NewAccount {
  pub identifier:          String,
  /// argon2 PHC string, e.g. `$argon2id$v=19$…`
  pub password_hash:       String,
  pub legal_name:          String,
  pub date_of_birth:       NaiveDate,
  pub registration_status: RegistrationStatus,
  pub handle:              String,
  pub avatar_ref:          Option<String>,
}

/// A stored login account.
#[derive(Debug, Clone)]
pub struct Account {
  pub subject_id:    SubjectId,
  pub identifier:    String,
  pub password_hash: String,
}

/// A freshly opened session together with the bearer token that names it.
/// The token is returned exactly once; the store keeps only a digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedSession {
  pub token:   String,
  pub session: Session,
}

/// Persistence behind the registry API.
///
/// Declarations are append-only; no method updates or removes one.
pub trait RegistryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Accounts ──────────────────────────────────────────────────────────

  /// Create an account and its identity record.
  fn register(
    &self,
    input: NewAccount,
  ) -> impl Future<Output = Result<IdentityRecord, Self::Error>> + Send + '_;

  /// Find an account by login identifier (case-insensitive).
  fn find_account<'a>(
    &'a self,
    identifier: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  // ── Sessions ──────────────────────────────────────────────────────────

  fn open_session(
    &self,
    subject_id: SubjectId,
    ttl: Duration,
  ) -> impl Future<Output = Result<IssuedSession, Self::Error>> + Send + '_;

  /// Returns `None` for unknown, revoked and expired tokens.
  fn resolve_session<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + 'a;

  /// Revoke a session. Unknown or already revoked tokens are not an error.
  fn revoke_session<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Profiles ──────────────────────────────────────────────────────────

  fn get_profile(
    &self,
    subject_id: SubjectId,
  ) -> impl Future<Output = Result<Option<IdentityRecord>, Self::Error>> + Send + '_;

  /// Case-insensitive handle lookup.
  fn find_by_handle<'a>(
    &'a self,
    handle: &'a str,
  ) -> impl Future<Output = Result<Option<IdentityRecord>, Self::Error>> + Send + 'a;

  // ── Declarations ──────────────────────────────────────────────────────

  fn insert_declaration(
    &self,
    input: NewDeclaration,
  ) -> impl Future<Output = Result<Declaration, Self::Error>> + Send + '_;

  /// All declarations of `subject_id`, ordered by `created_at` then `seq`,
  /// newest first.
  fn list_declarations(
    &self,
    subject_id: SubjectId,
  ) -> impl Future<Output = Result<Vec<Declaration>, Self::Error>> + Send + '_;
}
