//! Identity records — who a subject is, as far as the registry knows.
//!
//! Legal fields are fixed at registration. The handle is the only mutable
//! field, and nothing in the client subsystem writes it.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{SubjectId, declaration::CurrentDeclaration};

/// Age at which the maturity date is reached.
const MATURITY_MONTHS: u32 = 18 * 12;

// ─── Registration status ─────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
  Verified,
  #[default]
  Pending,
  Suspended,
}

impl RegistrationStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Verified => "verified",
      Self::Pending => "pending",
      Self::Suspended => "suspended",
    }
  }
}

// ─── Identity record ─────────────────────────────────────────────────────────

/// The identity record of one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
  pub subject_id:          SubjectId,
  pub legal_name:          String,
  pub date_of_birth:       NaiveDate,
  pub registration_date:   NaiveDate,
  pub registration_status: RegistrationStatus,
  /// Public handle, stored without the leading `@`.
  pub handle:              String,
  /// Opaque reference to an avatar image; never interpreted here.
  pub avatar_ref:          Option<String>,
}

impl IdentityRecord {
  /// The date the subject reaches majority, derived from the date of birth.
  pub fn maturity_date(&self) -> Option<NaiveDate> {
    self
      .date_of_birth
      .checked_add_months(Months::new(MATURITY_MONTHS))
  }

  /// The handle as displayed publicly, e.g. `@junior`.
  pub fn display_handle(&self) -> String { format!("@{}", self.handle) }
}

/// Normalise user input into a stored handle: trims whitespace and a single
/// leading `@`. Returns `None` if nothing is left.
pub fn normalize_handle(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  let bare = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
  (!bare.is_empty()).then(|| bare.to_owned())
}

// ─── Public lookup ───────────────────────────────────────────────────────────

/// What other registered subjects see when they look a handle up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicEntry {
  pub handle:              String,
  pub legal_name:          String,
  pub registration_status: RegistrationStatus,
  pub current:             CurrentDeclaration,
}
