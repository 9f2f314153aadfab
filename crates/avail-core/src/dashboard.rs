//! [`Dashboard`] — the client-side state machine tying the components together.
//!
//! ```text
//!                 login / resume                 both loads done
//! Unauthenticated ──────────────► Authenticating ───────────────► Ready
//!        ▲                              │                           │
//!        │ logout (from any phase)      │ denied / load failed      │
//!        └──────────────────────────────┴──────► Error(kind) ◄──────┘
//! ```
//!
//! Every login, resume and logout starts a new session epoch. Loads and writes
//! remember the epoch they were issued under, and their results are dropped if
//! the epoch has moved on by the time they complete.

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
  Error, Result, SubjectId,
  declaration::{CurrentDeclaration, Declaration, NewDeclaration},
  declaration_store::DeclarationStore,
  identity::IdentityRecord,
  optimistic::Optimistic,
  profile::ProfileLoader,
  session::{SessionGuard, Verdict},
  store::{Credentials, DeclarationRecords, IdentityService, MarkerStore, ProfileRecords},
};

// ─── Public state ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
  Unauthenticated,
  Authenticating,
  Ready,
  Error(ErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
  /// Login refused; carries the denial message.
  Denied(String),
  ProfileUnavailable(String),
  DeclarationUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileView {
  Loading,
  Loaded(IdentityRecord),
  /// The subject is authenticated but has no identity record yet.
  NotEstablished,
}

/// Everything the presentation layer needs to render one frame.
#[derive(Debug, Clone)]
pub struct Snapshot {
  pub phase:        Phase,
  pub subject:      Option<SubjectId>,
  pub profile:      ProfileView,
  /// `None` until the first declaration load of the session completes.
  pub declaration:  Option<CurrentDeclaration>,
  /// A declaration write is in flight and `declaration` shows its value.
  pub saving:       bool,
  /// Set when the last declaration write failed and was rolled back.
  pub sync_failure: Option<String>,
}

// ─── Internal state ──────────────────────────────────────────────────────────

struct State {
  phase:        Phase,
  epoch:        u64,
  subject:      Option<SubjectId>,
  profile:      ProfileView,
  declaration:  Option<Optimistic<CurrentDeclaration>>,
  sync_failure: Option<String>,
}

impl State {
  /// Drop all session data and start a new epoch.
  fn reset(&mut self, phase: Phase) -> u64 {
    self.epoch += 1;
    self.phase = phase;
    self.subject = None;
    self.profile = ProfileView::Loading;
    self.declaration = None;
    self.sync_failure = None;
    self.epoch
  }

  fn snapshot(&self) -> Snapshot {
    Snapshot {
      phase:        self.phase.clone(),
      subject:      self.subject,
      profile:      self.profile.clone(),
      declaration:  self.declaration.as_ref().map(|slot| slot.current().clone()),
      saving:       self.declaration.as_ref().is_some_and(Optimistic::in_flight),
      sync_failure: self.sync_failure.clone(),
    }
  }
}

// ─── Dashboard ───────────────────────────────────────────────────────────────

pub struct Dashboard<I, M, P, D> {
  guard:        SessionGuard<I, M>,
  profiles:     ProfileLoader<P>,
  declarations: DeclarationStore<D>,
  state:        Mutex<State>,
}

impl<I, M, P, D> Dashboard<I, M, P, D>
where
  I: IdentityService,
  M: MarkerStore,
  P: ProfileRecords,
  D: DeclarationRecords,
{
  pub fn new(
    guard: SessionGuard<I, M>,
    profiles: ProfileLoader<P>,
    declarations: DeclarationStore<D>,
  ) -> Self {
    Self {
      guard,
      profiles,
      declarations,
      state: Mutex::new(State {
        phase:        Phase::Unauthenticated,
        epoch:        0,
        subject:      None,
        profile:      ProfileView::Loading,
        declaration:  None,
        sync_failure: None,
      }),
    }
  }

  pub fn guard(&self) -> &SessionGuard<I, M> { &self.guard }

  pub fn snapshot(&self) -> Snapshot { self.state.lock().snapshot() }

  /// Verify whatever session this client may already hold and, if it is
  /// live, load the dashboard.
  pub async fn resume(&self) -> Snapshot {
    let epoch = self.state.lock().reset(Phase::Authenticating);
    match self.guard.verify_session().await {
      Verdict::Authenticated(subject) => {
        if self.claim(epoch, subject) {
          self.load(epoch, subject).await;
        }
      }
      Verdict::Unauthenticated => {
        let mut state = self.state.lock();
        if state.epoch == epoch {
          state.phase = Phase::Unauthenticated;
        }
      }
    }
    self.snapshot()
  }

  /// Log in and load the dashboard.
  ///
  /// A refused login leaves the dashboard in `Error(Denied)` and returns
  /// [`Error::Auth`].
  pub async fn login(&self, credentials: Credentials) -> Result<Snapshot> {
    let epoch = self.state.lock().reset(Phase::Authenticating);
    match self.guard.login(credentials).await {
      Ok(subject) => {
        if self.claim(epoch, subject) {
          self.load(epoch, subject).await;
        }
        Ok(self.snapshot())
      }
      Err(e) => {
        let mut state = self.state.lock();
        if state.epoch == epoch {
          state.phase = Phase::Error(ErrorKind::Denied(e.to_string()));
        }
        Err(e)
      }
    }
  }

  /// Log out. Session-scoped state is dropped before the remote revoke is
  /// even issued, so nothing still in flight can land afterwards.
  pub async fn logout(&self) -> Snapshot {
    self.state.lock().reset(Phase::Unauthenticated);
    self.guard.logout().await;
    self.snapshot()
  }

  /// Reload profile and declaration for the current session.
  pub async fn refresh(&self) -> Snapshot {
    let target = {
      let state = self.state.lock();
      match state.phase {
        Phase::Ready
        | Phase::Error(ErrorKind::ProfileUnavailable(_))
        | Phase::Error(ErrorKind::DeclarationUnavailable(_)) => {
          state.subject.map(|s| (state.epoch, s))
        }
        _ => None,
      }
    };
    if let Some((epoch, subject)) = target {
      self.load(epoch, subject).await;
    }
    self.snapshot()
  }

  /// Publish a new declaration using the optimistic protocol.
  ///
  /// The new status is visible in [`Self::snapshot`] immediately. If the
  /// write fails the view reverts to the last confirmed declaration and the
  /// failure is recorded in [`Snapshot::sync_failure`].
  pub async fn submit_declaration(
    &self,
    status: bool,
    annotation: impl Into<String>,
  ) -> Result<CurrentDeclaration> {
    let annotation = annotation.into();

    let (epoch, subject) = {
      let mut guard = self.state.lock();
      let state = &mut *guard;
      let subject = state.subject.ok_or(Error::NotAuthenticated)?;
      if state.phase != Phase::Ready {
        return Err(Error::NotReady);
      }
      let slot = state.declaration.as_mut().ok_or(Error::NotReady)?;
      let shown = NewDeclaration::new(subject, status, annotation.clone()).annotation;
      slot
        .propose(CurrentDeclaration::Declared(Declaration::provisional(subject, status, shown)))
        .map_err(|_| Error::SyncInFlight)?;
      state.sync_failure = None;
      (state.epoch, subject)
    };

    let result = self.declarations.append(subject, status, annotation).await;

    let mut guard = self.state.lock();
    let state = &mut *guard;
    if state.epoch != epoch {
      debug!(%subject, "session changed during write; result not applied");
      return result.map(CurrentDeclaration::Declared);
    }
    let Some(slot) = state.declaration.as_mut() else {
      return result.map(CurrentDeclaration::Declared);
    };
    match result {
      Ok(stored) => {
        let confirmed = CurrentDeclaration::Declared(stored);
        slot.confirm(confirmed.clone());
        Ok(confirmed)
      }
      Err(e) => {
        slot.rollback();
        warn!(%subject, error = %e, "declaration not saved; rolled back");
        state.sync_failure = Some(e.to_string());
        Err(e)
      }
    }
  }

  /// Bind `subject` to the session started at `epoch`, unless it was
  /// superseded meanwhile.
  fn claim(&self, epoch: u64, subject: SubjectId) -> bool {
    let mut state = self.state.lock();
    if state.epoch != epoch {
      debug!(%subject, "session changed during authentication");
      return false;
    }
    state.subject = Some(subject);
    true
  }

  async fn load(&self, epoch: u64, subject: SubjectId) {
    let (profile, current) = tokio::join!(
      self.profiles.load_profile(subject),
      self.declarations.load_current(subject),
    );

    let mut guard = self.state.lock();
    let state = &mut *guard;
    if state.epoch != epoch {
      debug!(%subject, "discarding load for a stale session");
      return;
    }

    let mut failure = None;
    match profile {
      Ok(record) => state.profile = ProfileView::Loaded(record),
      Err(Error::NotFound(_)) => state.profile = ProfileView::NotEstablished,
      Err(e) => {
        warn!(%subject, error = %e, "profile load failed");
        failure = Some(ErrorKind::ProfileUnavailable(e.to_string()));
      }
    }
    match current {
      // A read issued before a write confirmed must not undo that write.
      Ok(current) => match state.declaration.as_mut() {
        Some(slot) if current.is_older_than(slot.confirmed()) => {
          debug!(%subject, "loaded declaration predates the confirmed one; kept");
        }
        Some(slot) => slot.refresh(current),
        None => state.declaration = Some(Optimistic::new(current)),
      },
      Err(e) => {
        warn!(%subject, error = %e, "declaration load failed");
        if failure.is_none() {
          failure = Some(ErrorKind::DeclarationUnavailable(e.to_string()));
        }
      }
    }

    state.phase = failure.map_or(Phase::Ready, Phase::Error);
    debug!(%subject, phase = ?state.phase, "dashboard loaded");
  }
}
