//! Error types for `avail-core`.

use thiserror::Error;

use crate::SubjectId;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// Credentials were rejected, or the identity service could not be reached
  /// while logging in. No session exists afterwards.
  #[error("{0}")]
  Auth(String),

  /// No identity record exists for the subject yet.
  #[error("identity not yet established for subject {0}")]
  NotFound(SubjectId),

  /// A declaration could not be written to the store. The local view has
  /// already been rolled back when this is returned from the dashboard.
  #[error("declaration not saved: {0}")]
  Sync(String),

  /// A read against a remote store failed.
  #[error("remote store error: {0}")]
  Remote(#[source] BoxError),

  #[error("{operation} timed out")]
  Timeout { operation: &'static str },

  #[error("no authenticated session")]
  NotAuthenticated,

  /// The dashboard has not finished loading the current session.
  #[error("session data is not loaded")]
  NotReady,

  #[error("a declaration is already being saved")]
  SyncInFlight,

  #[error("invalid subject id {0:?}")]
  InvalidSubjectId(String),
}

impl Error {
  pub(crate) fn remote<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Remote(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
