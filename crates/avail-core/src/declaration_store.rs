//! [`DeclarationStore`] — reads and appends declarations.
//!
//! The store never updates a record. Writers on other clients may append at
//! any time; the current declaration is always recomputed from the full
//! history with [`select_current`], so the latest timestamp wins.

use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::{
  DEFAULT_TIMEOUT, Error, Result, SubjectId,
  declaration::{CurrentDeclaration, Declaration, NewDeclaration, select_current},
  store::DeclarationRecords,
};

pub struct DeclarationStore<R> {
  records: R,
  timeout: Duration,
}

impl<R: DeclarationRecords> DeclarationStore<R> {
  pub fn new(records: R) -> Self { Self { records, timeout: DEFAULT_TIMEOUT } }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// The declaration with the latest `created_at` for `subject_id`, or
  /// [`CurrentDeclaration::Undeclared`] if there are none.
  pub async fn load_current(&self, subject_id: SubjectId) -> Result<CurrentDeclaration> {
    let records = timeout(self.timeout, self.records.list_declarations(subject_id))
      .await
      .map_err(|_| Error::Timeout { operation: "declaration load" })?
      .map_err(Error::remote)?;

    let current = select_current(subject_id, &records);
    debug!(%subject_id, history = records.len(), state = current.label(), "loaded declaration");
    Ok(current)
  }

  /// Append a new declaration and return the stored record.
  ///
  /// Any failure, including a timeout, is [`Error::Sync`]. Nothing is retried.
  pub async fn append(
    &self,
    subject_id: SubjectId,
    status: bool,
    annotation: impl Into<String>,
  ) -> Result<Declaration> {
    let input = NewDeclaration::new(subject_id, status, annotation);
    let stored = timeout(self.timeout, self.records.insert_declaration(input))
      .await
      .map_err(|_| Error::Sync("the declaration store did not respond in time".to_owned()))?
      .map_err(|e| Error::Sync(e.to_string()))?;

    debug!(%subject_id, seq = stored.seq, status, "declaration appended");
    Ok(stored)
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone as _, Utc};

  use super::*;
  use crate::testing::FakeRecords;

  #[tokio::test]
  async fn no_history_is_undeclared() {
    let store = DeclarationStore::new(FakeRecords::default());
    let current = store.load_current(SubjectId::new()).await.unwrap();
    assert_eq!(current, CurrentDeclaration::Undeclared);
  }

  #[tokio::test]
  async fn later_declaration_wins() {
    let records = FakeRecords::default();
    let store = DeclarationStore::new(records.clone());
    let s = SubjectId::new();
    let t1 = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();

    records.set_clock(t1);
    store.append(s, true, "a").await.unwrap();
    records.set_clock(t2);
    store.append(s, false, "b").await.unwrap();

    let current = store.load_current(s).await.unwrap();
    let d = current.declaration().unwrap();
    assert!(!d.status);
    assert_eq!(d.annotation, "b");
    assert_eq!(d.created_at, t2);
  }

  #[tokio::test]
  async fn selection_follows_timestamps_not_append_order() {
    let records = FakeRecords::default();
    let store = DeclarationStore::new(records.clone());
    let s = SubjectId::new();
    let early = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();

    // The write stamped later by the store is issued first.
    records.set_clock(late);
    store.append(s, false, "late").await.unwrap();
    records.set_clock(early);
    store.append(s, true, "early").await.unwrap();

    let current = store.load_current(s).await.unwrap();
    assert_eq!(current.declaration().unwrap().annotation, "late");
  }

  #[tokio::test]
  async fn append_grows_history_by_one_and_keeps_old_records() {
    let records = FakeRecords::default();
    let store = DeclarationStore::new(records.clone());
    let s = SubjectId::new();

    store.append(s, true, "first").await.unwrap();
    let before = records.snapshot();
    store.append(s, false, "second").await.unwrap();
    let after = records.snapshot();

    assert_eq!(records.count_for(s), 2);
    assert_eq!(&after[..before.len()], &before[..]);
  }

  #[tokio::test]
  async fn failed_append_is_sync_error_and_writes_nothing() {
    let records = FakeRecords::default();
    records.set_fail_writes(true);
    let store = DeclarationStore::new(records.clone());
    let s = SubjectId::new();

    let err = store.append(s, true, "").await.unwrap_err();
    assert!(matches!(err, Error::Sync(_)));
    assert_eq!(records.count_for(s), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn slow_append_is_sync_error() {
    let records = FakeRecords::default();
    let _gate = records.gate_writes();
    let store = DeclarationStore::new(records.clone()).with_timeout(Duration::from_secs(5));
    let s = SubjectId::new();

    let err = store.append(s, true, "").await.unwrap_err();
    assert!(matches!(err, Error::Sync(ref m) if m.contains("in time")), "{err}");
    assert_eq!(records.count_for(s), 0);
  }

  #[tokio::test]
  async fn load_failure_is_remote_error() {
    let records = FakeRecords::default();
    records.set_fail_reads(true);
    let err = DeclarationStore::new(records)
      .load_current(SubjectId::new())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Remote(_)));
  }
}
