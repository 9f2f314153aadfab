//! Declaration types — the append-only availability record.
//!
//! A declaration is never updated or deleted. A subject's current availability
//! is whichever of its declarations carries the latest store-assigned
//! timestamp; a subject with no declarations at all is [`Undeclared`], which is
//! not the same thing as having declared `false`.
//!
//! [`Undeclared`]: CurrentDeclaration::Undeclared

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SubjectId;

const AVAILABLE_ANNOTATION: &str = "Authorized for interaction.";
const UNAVAILABLE_ANNOTATION: &str = "Access denied.";

// ─── Declaration ─────────────────────────────────────────────────────────────

/// One immutable availability declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
  pub declaration_id: Uuid,
  /// Store-assigned, strictly increasing per store. Breaks timestamp ties.
  pub seq:            i64,
  pub subject_id:     SubjectId,
  pub status:         bool,
  pub annotation:     String,
  /// Store-assigned; authoritative over any client clock.
  pub created_at:     DateTime<Utc>,
}

impl Declaration {
  /// A client-side stand-in shown while the real record is being written.
  ///
  /// It has a nil id and `seq == 0`, so it can never be mistaken for a stored
  /// record.
  pub fn provisional(subject_id: SubjectId, status: bool, annotation: String) -> Self {
    Self {
      declaration_id: Uuid::nil(),
      seq: 0,
      subject_id,
      status,
      annotation,
      created_at: Utc::now(),
    }
  }

  pub fn is_provisional(&self) -> bool { self.declaration_id.is_nil() }

  /// Ordering key used to pick the current declaration.
  fn recency(&self) -> (DateTime<Utc>, i64) { (self.created_at, self.seq) }
}

// ─── NewDeclaration ──────────────────────────────────────────────────────────

/// Input to [`crate::store::DeclarationRecords::insert_declaration`].
/// `declaration_id`, `seq` and `created_at` are always set by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeclaration {
  pub subject_id: SubjectId,
  pub status:     bool,
  pub annotation: String,
}

impl NewDeclaration {
  /// Build a declaration, substituting the standard annotation for `status`
  /// when `annotation` is blank.
  pub fn new(subject_id: SubjectId, status: bool, annotation: impl Into<String>) -> Self {
    let annotation = annotation.into();
    let annotation = if annotation.trim().is_empty() {
      default_annotation(status).to_owned()
    } else {
      annotation.trim().to_owned()
    };
    Self { subject_id, status, annotation }
  }
}

pub fn default_annotation(status: bool) -> &'static str {
  if status { AVAILABLE_ANNOTATION } else { UNAVAILABLE_ANNOTATION }
}

// ─── Current declaration ─────────────────────────────────────────────────────

/// The latest declaration of a subject, or the explicit absence of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "declaration", rename_all = "snake_case")]
pub enum CurrentDeclaration {
  Declared(Declaration),
  Undeclared,
}

impl CurrentDeclaration {
  /// `Some(status)` when declared, `None` when undeclared.
  pub fn status(&self) -> Option<bool> {
    match self {
      Self::Declared(d) => Some(d.status),
      Self::Undeclared => None,
    }
  }

  pub fn declaration(&self) -> Option<&Declaration> {
    match self {
      Self::Declared(d) => Some(d),
      Self::Undeclared => None,
    }
  }

  pub fn is_undeclared(&self) -> bool { matches!(self, Self::Undeclared) }

  /// Whether `other` was selected from a later view of the same history.
  /// [`Self::Undeclared`] precedes every declaration.
  pub fn is_older_than(&self, other: &Self) -> bool {
    match (self, other) {
      (_, Self::Undeclared) => false,
      (Self::Undeclared, Self::Declared(_)) => true,
      (Self::Declared(a), Self::Declared(b)) => a.recency() < b.recency(),
    }
  }

  /// Human label for the status, as shown on the dashboard.
  pub fn label(&self) -> &'static str {
    match self.status() {
      Some(true) => "AVAILABLE",
      Some(false) => "UNAVAILABLE",
      None => "UNDECLARED",
    }
  }
}

/// Select the current declaration of `subject_id` from `records`.
///
/// The winner is the record with the greatest `created_at`; equal timestamps
/// fall back to the greatest `seq`, so repeated calls over the same data agree.
/// Records belonging to other subjects are ignored.
pub fn select_current<'a, I>(subject_id: SubjectId, records: I) -> CurrentDeclaration
where
  I: IntoIterator<Item = &'a Declaration>,
{
  records
    .into_iter()
    .filter(|d| d.subject_id == subject_id)
    .max_by_key(|d| d.recency())
    .cloned()
    .map_or(CurrentDeclaration::Undeclared, CurrentDeclaration::Declared)
}
