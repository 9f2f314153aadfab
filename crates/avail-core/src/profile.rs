//! Identity record loading and public lookup.

use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::{
  DEFAULT_TIMEOUT, Error, Result, SubjectId,
  identity::{IdentityRecord, PublicEntry, normalize_handle},
  store::{ProfileRecords, RegistryLookup},
};

/// Loads the identity record of a subject.
pub struct ProfileLoader<P> {
  records: P,
  timeout: Duration,
}

impl<P: ProfileRecords> ProfileLoader<P> {
  pub fn new(records: P) -> Self { Self { records, timeout: DEFAULT_TIMEOUT } }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Point lookup by subject.
  ///
  /// A missing record is [`Error::NotFound`], never a record with blank
  /// fields; callers distinguish "no identity yet" from a failed read.
  pub async fn load_profile(&self, subject_id: SubjectId) -> Result<IdentityRecord> {
    let record = timeout(self.timeout, self.records.get_profile(subject_id))
      .await
      .map_err(|_| Error::Timeout { operation: "profile load" })?
      .map_err(Error::remote)?;

    match record {
      Some(record) => Ok(record),
      None => {
        debug!(%subject_id, "no identity record");
        Err(Error::NotFound(subject_id))
      }
    }
  }
}

/// Looks other subjects up by public handle.
pub struct PublicLookup<L> {
  source:  L,
  timeout: Duration,
}

impl<L: RegistryLookup> PublicLookup<L> {
  pub fn new(source: L) -> Self { Self { source, timeout: DEFAULT_TIMEOUT } }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Accepts `@handle` or `handle`. Blank input finds nobody.
  pub async fn lookup(&self, raw_handle: &str) -> Result<Option<PublicEntry>> {
    let Some(handle) = normalize_handle(raw_handle) else {
      return Ok(None);
    };
    timeout(self.timeout, self.source.lookup(handle))
      .await
      .map_err(|_| Error::Timeout { operation: "public lookup" })?
      .map_err(Error::remote)
  }
}
