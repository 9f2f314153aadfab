//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order in SQL matches time order.
//! Calendar dates are stored as `YYYY-MM-DD`. UUIDs are stored hyphenated.

use avail_core::{
  SubjectId,
  declaration::Declaration,
  identity::{IdentityRecord, RegistrationStatus},
  store::{Account, Session},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rand_core::{OsRng, RngCore as _};
use sha2::{Digest as _, Sha256};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_subject(id: SubjectId) -> String { encode_uuid(id.as_uuid()) }

pub fn decode_subject(s: &str) -> Result<SubjectId> {
  decode_uuid(s).map(SubjectId::from_uuid)
}

// ─── Dates and times ─────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── RegistrationStatus ──────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<RegistrationStatus> {
  match s {
    "verified" => Ok(RegistrationStatus::Verified),
    "pending" => Ok(RegistrationStatus::Pending),
    "suspended" => Ok(RegistrationStatus::Suspended),
    other => Err(Error::UnknownStatus(other.to_owned())),
  }
}

// ─── Session tokens ──────────────────────────────────────────────────────────

/// A fresh bearer token: 32 random bytes, base64url without padding.
pub fn new_token() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  URL_SAFE_NO_PAD.encode(bytes)
}

/// The form a token is stored and looked up in.
pub fn token_digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `accounts` row.
pub struct RawAccount {
  pub subject_id:    String,
  pub identifier:    String,
  pub password_hash: String,
}

impl RawAccount {
  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      subject_id:    decode_subject(&self.subject_id)?,
      identifier:    self.identifier,
      password_hash: self.password_hash,
    })
  }
}

/// Raw strings read directly from a `profiles` row.
pub struct RawProfile {
  pub subject_id:          String,
  pub legal_name:          String,
  pub date_of_birth:       String,
  pub registration_date:   String,
  pub registration_status: String,
  pub handle:              String,
  pub avatar_ref:          Option<String>,
}

/// Column list matching [`RawProfile::from_row`].
pub const PROFILE_COLUMNS: &str = "subject_id, legal_name, date_of_birth, registration_date, \
                                   registration_status, handle, avatar_ref";

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:          row.get(0)?,
      legal_name:          row.get(1)?,
      date_of_birth:       row.get(2)?,
      registration_date:   row.get(3)?,
      registration_status: row.get(4)?,
      handle:              row.get(5)?,
      avatar_ref:          row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<IdentityRecord> {
    Ok(IdentityRecord {
      subject_id:          decode_subject(&self.subject_id)?,
      legal_name:          self.legal_name,
      date_of_birth:       decode_date(&self.date_of_birth)?,
      registration_date:   decode_date(&self.registration_date)?,
      registration_status: decode_status(&self.registration_status)?,
      handle:              self.handle,
      avatar_ref:          self.avatar_ref,
    })
  }
}

/// Raw strings read directly from a `declarations` row.
pub struct RawDeclaration {
  pub seq:            i64,
  pub declaration_id: String,
  pub subject_id:     String,
  pub status:         bool,
  pub annotation:     String,
  pub created_at:     String,
}

impl RawDeclaration {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      seq:            row.get(0)?,
      declaration_id: row.get(1)?,
      subject_id:     row.get(2)?,
      status:         row.get(3)?,
      annotation:     row.get(4)?,
      created_at:     row.get(5)?,
    })
  }

  pub fn into_declaration(self) -> Result<Declaration> {
    Ok(Declaration {
      declaration_id: decode_uuid(&self.declaration_id)?,
      seq:            self.seq,
      subject_id:     decode_subject(&self.subject_id)?,
      status:         self.status,
      annotation:     self.annotation,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `sessions` row.
pub struct RawSession {
  pub subject_id: String,
  pub expires_at: String,
}

impl RawSession {
  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      subject_id: decode_subject(&self.subject_id)?,
      expires_at: decode_dt(&self.expires_at)?,
    })
  }
}
