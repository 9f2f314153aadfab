//! Error type for `avail-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown registration status {0:?}")]
  UnknownStatus(String),

  /// Registration collided with an existing account.
  #[error("{field} {value:?} is already registered")]
  AlreadyRegistered { field: &'static str, value: String },

  #[error("session lifetime {0:?} is out of range")]
  InvalidTtl(std::time::Duration),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
