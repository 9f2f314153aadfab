//! In-memory fakes of the remote contracts, for unit tests.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, NaiveDate, TimeZone as _, Utc};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{
  SubjectId,
  declaration::{Declaration, NewDeclaration, select_current},
  identity::{IdentityRecord, PublicEntry, RegistrationStatus},
  store::{
    Credentials, DeclarationRecords, IdentityService, ProfileRecords, RegistryLookup,
    Session, SignIn,
  },
};

#[derive(Debug, Error)]
#[error("simulated outage")]
pub struct Outage;

// ─── Identity ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct IdentityState {
  accounts:       HashMap<String, (String, SubjectId)>,
  session:        Option<Session>,
  unreachable:    bool,
  sign_in_calls:  usize,
  sign_out_calls: usize,
  sign_in_gate:   Option<Arc<Gate>>,
}

#[derive(Clone, Default)]
pub struct FakeIdentity {
  state: Arc<Mutex<IdentityState>>,
}

impl FakeIdentity {
  pub fn add_account(&self, identifier: &str, secret: &str) -> SubjectId {
    let subject = SubjectId::new();
    self
      .state
      .lock()
      .accounts
      .insert(identifier.to_owned(), (secret.to_owned(), subject));
    subject
  }

  /// Install a server session without going through sign-in, as if one
  /// survived from an earlier visit.
  pub fn force_session(&self, subject_id: SubjectId) {
    self.state.lock().session = Some(session_for(subject_id));
  }

  pub fn expire_session(&self) { self.state.lock().session = None; }

  pub fn set_unreachable(&self, unreachable: bool) {
    self.state.lock().unreachable = unreachable;
  }

  pub fn has_session(&self) -> bool { self.state.lock().session.is_some() }

  /// Hold the next sign-ins open until the test releases them. The session
  /// is only granted once released.
  pub fn gate_sign_in(&self) -> Arc<Gate> {
    let gate = Arc::new(Gate::default());
    self.state.lock().sign_in_gate = Some(gate.clone());
    gate
  }

  pub fn sign_in_calls(&self) -> usize { self.state.lock().sign_in_calls }

  pub fn sign_out_calls(&self) -> usize { self.state.lock().sign_out_calls }
}

fn session_for(subject_id: SubjectId) -> Session {
  Session { subject_id, expires_at: Utc::now() + Duration::hours(1) }
}

impl IdentityService for FakeIdentity {
  type Error = Outage;

  async fn sign_in(&self, credentials: Credentials) -> Result<SignIn, Outage> {
    let gate = self.state.lock().sign_in_gate.clone();
    if let Some(gate) = gate {
      gate.started.notify_one();
      gate.release.notified().await;
    }
    let mut state = self.state.lock();
    state.sign_in_calls += 1;
    if state.unreachable {
      return Err(Outage);
    }
    match state.accounts.get(&credentials.identifier) {
      Some((secret, subject)) if *secret == credentials.secret => {
        let session = session_for(*subject);
        state.session = Some(session.clone());
        Ok(SignIn::Granted(session))
      }
      _ => Ok(SignIn::Denied("Invalid identifier or secret.".into())),
    }
  }

  async fn sign_out(&self) -> Result<(), Outage> {
    let mut state = self.state.lock();
    state.sign_out_calls += 1;
    if state.unreachable {
      return Err(Outage);
    }
    state.session = None;
    Ok(())
  }

  async fn get_session(&self) -> Result<Option<Session>, Outage> {
    let state = self.state.lock();
    if state.unreachable {
      return Err(Outage);
    }
    Ok(state.session.clone())
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Holds a read or write open until the test releases it.
#[derive(Default)]
pub struct Gate {
  pub started: Notify,
  pub release: Notify,
}

struct RecordsState {
  profiles:      HashMap<SubjectId, IdentityRecord>,
  declarations:  Vec<Declaration>,
  next_seq:      i64,
  clock:         DateTime<Utc>,
  fail_writes:   bool,
  fail_reads:    bool,
  profile_gate:  Option<Arc<Gate>>,
  write_gate:    Option<Arc<Gate>>,
}

impl Default for RecordsState {
  fn default() -> Self {
    Self {
      profiles:     HashMap::new(),
      declarations: Vec::new(),
      next_seq:     1,
      clock:        Utc.with_ymd_and_hms(2026, 1, 15, 9, 42, 0).unwrap(),
      fail_writes:  false,
      fail_reads:   false,
      profile_gate: None,
      write_gate:   None,
    }
  }
}

#[derive(Clone, Default)]
pub struct FakeRecords {
  state: Arc<Mutex<RecordsState>>,
}

pub fn identity_record(subject_id: SubjectId, handle: &str) -> IdentityRecord {
  IdentityRecord {
    subject_id,
    legal_name:          format!("Legal {handle}"),
    date_of_birth:       NaiveDate::from_ymd_opt(1998, 3, 15).unwrap(),
    registration_date:   NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
    registration_status: RegistrationStatus::Verified,
    handle:              handle.to_owned(),
    avatar_ref:          None,
  }
}

impl FakeRecords {
  pub fn add_profile(&self, record: IdentityRecord) {
    self.state.lock().profiles.insert(record.subject_id, record);
  }

  /// Timestamp the next insert will receive; later inserts advance by 1s.
  pub fn set_clock(&self, at: DateTime<Utc>) { self.state.lock().clock = at; }

  pub fn set_fail_writes(&self, fail: bool) { self.state.lock().fail_writes = fail; }

  pub fn set_fail_reads(&self, fail: bool) { self.state.lock().fail_reads = fail; }

  pub fn gate_profiles(&self) -> Arc<Gate> {
    let gate = Arc::new(Gate::default());
    self.state.lock().profile_gate = Some(gate.clone());
    gate
  }

  pub fn gate_writes(&self) -> Arc<Gate> {
    let gate = Arc::new(Gate::default());
    self.state.lock().write_gate = Some(gate.clone());
    gate
  }

  pub fn count_for(&self, subject_id: SubjectId) -> usize {
    self
      .state
      .lock()
      .declarations
      .iter()
      .filter(|d| d.subject_id == subject_id)
      .count()
  }

  pub fn snapshot(&self) -> Vec<Declaration> { self.state.lock().declarations.clone() }
}

impl ProfileRecords for FakeRecords {
  type Error = Outage;

  async fn get_profile(&self, subject_id: SubjectId) -> Result<Option<IdentityRecord>, Outage> {
    let gate = self.state.lock().profile_gate.clone();
    if let Some(gate) = gate {
      gate.started.notify_one();
      gate.release.notified().await;
    }
    let state = self.state.lock();
    if state.fail_reads {
      return Err(Outage);
    }
    Ok(state.profiles.get(&subject_id).cloned())
  }
}

impl DeclarationRecords for FakeRecords {
  type Error = Outage;

  async fn insert_declaration(&self, input: NewDeclaration) -> Result<Declaration, Outage> {
    let gate = self.state.lock().write_gate.clone();
    if let Some(gate) = gate {
      gate.started.notify_one();
      gate.release.notified().await;
    }
    let mut state = self.state.lock();
    if state.fail_writes {
      return Err(Outage);
    }
    let declaration = Declaration {
      declaration_id: Uuid::new_v4(),
      seq:            state.next_seq,
      subject_id:     input.subject_id,
      status:         input.status,
      annotation:     input.annotation,
      created_at:     state.clock,
    };
    state.next_seq += 1;
    state.clock += Duration::seconds(1);
    state.declarations.push(declaration.clone());
    Ok(declaration)
  }

  async fn list_declarations(&self, subject_id: SubjectId) -> Result<Vec<Declaration>, Outage> {
    let state = self.state.lock();
    if state.fail_reads {
      return Err(Outage);
    }
    let mut records: Vec<_> = state
      .declarations
      .iter()
      .filter(|d| d.subject_id == subject_id)
      .cloned()
      .collect();
    records.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));
    Ok(records)
  }
}

impl RegistryLookup for FakeRecords {
  type Error = Outage;

  async fn lookup(&self, handle: String) -> Result<Option<PublicEntry>, Outage> {
    let state = self.state.lock();
    if state.fail_reads {
      return Err(Outage);
    }
    let Some(record) = state
      .profiles
      .values()
      .find(|r| r.handle.eq_ignore_ascii_case(&handle))
    else {
      return Ok(None);
    };
    Ok(Some(PublicEntry {
      handle:              record.handle.clone(),
      legal_name:          record.legal_name.clone(),
      registration_status: record.registration_status,
      current:             select_current(record.subject_id, &state.declarations),
    }))
  }
}
