//! Subject identifiers.
//!
//! A subject is a registered party. Everything else in the registry (identity
//! record, sessions, declarations) hangs off its UUID.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Opaque identifier of a registered subject.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubjectId(Uuid);

impl SubjectId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }

  pub fn from_uuid(id: Uuid) -> Self { Self(id) }

  pub fn as_uuid(&self) -> Uuid { self.0 }
}

impl Default for SubjectId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for SubjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.hyphenated())
  }
}

impl FromStr for SubjectId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Uuid::parse_str(s.trim())
      .map(Self)
      .map_err(|_| Error::InvalidSubjectId(s.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_and_parse_agree() {
    let id = SubjectId::new();
    let parsed: SubjectId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
  }

  #[test]
  fn garbage_is_rejected() {
    let err = "not-a-subject".parse::<SubjectId>().unwrap_err();
    assert!(matches!(err, Error::InvalidSubjectId(s) if s == "not-a-subject"));
  }

  #[test]
  fn serialises_as_bare_string() {
    let id = SubjectId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
  }
}
