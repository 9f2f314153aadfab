//! [`SqliteStore`] — the SQLite implementation of [`RegistryStore`].

use std::{path::Path, time::Duration};

use avail_core::{
  SubjectId,
  declaration::{Declaration, NewDeclaration},
  identity::IdentityRecord,
  store::{Account, IssuedSession, NewAccount, RegistryStore, Session},
};
use chrono::{SubsecRound as _, TimeDelta, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    PROFILE_COLUMNS, RawAccount, RawDeclaration, RawProfile, RawSession, encode_date,
    encode_dt, encode_subject, encode_uuid, new_token, token_digest,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A registry store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn profile_where(
    &self,
    clause: &'static str,
    param: String,
  ) -> Result<Option<IdentityRecord>> {
    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE {clause}"),
            rusqlite::params![param],
            RawProfile::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawProfile::into_record).transpose()
  }
}

// ─── RegistryStore impl ──────────────────────────────────────────────────────

impl RegistryStore for SqliteStore {
  type Error = Error;

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn register(&self, input: NewAccount) -> Result<IdentityRecord> {
    let now = Utc::now();
    let record = IdentityRecord {
      subject_id:          SubjectId::new(),
      legal_name:          input.legal_name,
      date_of_birth:       input.date_of_birth,
      registration_date:   now.date_naive(),
      registration_status: input.registration_status,
      handle:              input.handle,
      avatar_ref:          input.avatar_ref,
    };

    let id_str      = encode_subject(record.subject_id);
    let identifier  = input.identifier;
    let hash        = input.password_hash;
    let created_str = encode_dt(now);
    let name        = record.legal_name.clone();
    let dob_str     = encode_date(record.date_of_birth);
    let reg_str     = encode_date(record.registration_date);
    let status_str  = record.registration_status.as_str();
    let handle      = record.handle.clone();
    let avatar      = record.avatar_ref.clone();

    let conflict: Option<(&'static str, String)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let taken: Option<i64> = tx
          .query_row(
            "SELECT 1 FROM accounts WHERE identifier = ?1",
            rusqlite::params![identifier],
            |r| r.get(0),
          )
          .optional()?;
        if taken.is_some() {
          return Ok(Some(("identifier", identifier)));
        }
        let taken: Option<i64> = tx
          .query_row(
            "SELECT 1 FROM profiles WHERE handle = ?1",
            rusqlite::params![handle],
            |r| r.get(0),
          )
          .optional()?;
        if taken.is_some() {
          return Ok(Some(("handle", handle)));
        }

        tx.execute(
          "INSERT INTO accounts (subject_id, identifier, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, identifier, hash, created_str],
        )?;
        tx.execute(
          "INSERT INTO profiles (
             subject_id, legal_name, date_of_birth, registration_date,
             registration_status, handle, avatar_ref
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, name, dob_str, reg_str, status_str, handle, avatar],
        )?;
        tx.commit()?;
        Ok(None)
      })
      .await?;

    if let Some((field, value)) = conflict {
      return Err(Error::AlreadyRegistered { field, value });
    }
    debug!(subject_id = %record.subject_id, handle = %record.handle, "registered account");
    Ok(record)
  }

  async fn find_account<'a>(&'a self, identifier: &'a str) -> Result<Option<Account>> {
    let identifier = identifier.trim().to_owned();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT subject_id, identifier, password_hash FROM accounts WHERE identifier = ?1",
            rusqlite::params![identifier],
            |row| {
              Ok(RawAccount {
                subject_id:    row.get(0)?,
                identifier:    row.get(1)?,
                password_hash: row.get(2)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn open_session(&self, subject_id: SubjectId, ttl: Duration) -> Result<IssuedSession> {
    let now = Utc::now().trunc_subsecs(6);
    let expires_at = TimeDelta::from_std(ttl)
      .ok()
      .and_then(|ttl| now.checked_add_signed(ttl))
      .ok_or(Error::InvalidTtl(ttl))?;
    let token = new_token();

    let digest      = token_digest(&token);
    let subject_str = encode_subject(subject_id);
    let created_str = encode_dt(now);
    let expires_str = encode_dt(expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (token_digest, subject_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![digest, subject_str, created_str, expires_str],
        )?;
        Ok(())
      })
      .await?;

    debug!(%subject_id, %expires_at, "session opened");
    Ok(IssuedSession { token, session: Session { subject_id, expires_at } })
  }

  async fn resolve_session<'a>(&'a self, token: &'a str) -> Result<Option<Session>> {
    let digest = token_digest(token);

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT subject_id, expires_at FROM sessions
             WHERE token_digest = ?1 AND revoked_at IS NULL",
            rusqlite::params![digest],
            |row| Ok(RawSession { subject_id: row.get(0)?, expires_at: row.get(1)? }),
          )
          .optional()?)
      })
      .await?;

    let session = raw.map(RawSession::into_session).transpose()?;
    Ok(session.filter(|s| s.expires_at > Utc::now()))
  }

  async fn revoke_session<'a>(&'a self, token: &'a str) -> Result<()> {
    let digest = token_digest(token);
    let at_str = encode_dt(Utc::now());

    let revoked = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE sessions SET revoked_at = ?2
           WHERE token_digest = ?1 AND revoked_at IS NULL",
          rusqlite::params![digest, at_str],
        )?)
      })
      .await?;

    debug!(revoked, "session revoke");
    Ok(())
  }

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn get_profile(&self, subject_id: SubjectId) -> Result<Option<IdentityRecord>> {
    self
      .profile_where("subject_id = ?1", encode_subject(subject_id))
      .await
  }

  async fn find_by_handle<'a>(&'a self, handle: &'a str) -> Result<Option<IdentityRecord>> {
    self.profile_where("handle = ?1", handle.to_owned()).await
  }

  // ── Declarations, append-only ─────────────────────────────────────────────

  async fn insert_declaration(&self, input: NewDeclaration) -> Result<Declaration> {
    let declaration_id = Uuid::new_v4();
    // Stored at microsecond precision; truncate so the returned record
    // matches what a later read yields.
    let created_at = Utc::now().trunc_subsecs(6);

    let id_str      = encode_uuid(declaration_id);
    let subject_str = encode_subject(input.subject_id);
    let created_str = encode_dt(created_at);
    let annotation  = input.annotation.clone();
    let status      = input.status;

    let seq = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO declarations (declaration_id, subject_id, status, annotation, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, subject_str, status, annotation, created_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Declaration {
      declaration_id,
      seq,
      subject_id: input.subject_id,
      status: input.status,
      annotation: input.annotation,
      created_at,
    })
  }

  async fn list_declarations(&self, subject_id: SubjectId) -> Result<Vec<Declaration>> {
    let subject_str = encode_subject(subject_id);

    let raws: Vec<RawDeclaration> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT seq, declaration_id, subject_id, status, annotation, created_at
           FROM declarations
           WHERE subject_id = ?1
           ORDER BY created_at DESC, seq DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject_str], RawDeclaration::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDeclaration::into_declaration).collect()
  }
}
