//! [`SessionGuard`] — decides whether this client holds a live session.
//!
//! A session is live only when two independent signals agree: the identity
//! service still recognises a server session, and the tab-scoped marker names
//! the same subject. Either signal alone is treated as stale and torn down, so
//! a fresh client never inherits a long-lived server session it did not open
//! itself, and a copied marker never grants access without a server session.

use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
  DEFAULT_TIMEOUT, Error, Result, SubjectId,
  store::{Credentials, IdentityService, MarkerStore, Session, SignIn},
};

const BLANK_CREDENTIALS: &str = "Both fields required.";
const SIGNED_OUT_DURING_LOGIN: &str = "Signed out before sign-in completed.";

/// The single authentication verdict consumed by the rest of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  Authenticated(SubjectId),
  Unauthenticated,
}

impl Verdict {
  pub fn subject(&self) -> Option<SubjectId> {
    match self {
      Self::Authenticated(s) => Some(*s),
      Self::Unauthenticated => None,
    }
  }
}

/// The ways the two liveness signals can disagree. Never surfaced to callers;
/// every variant resolves to [`Verdict::Unauthenticated`].
#[derive(Debug, Error)]
enum SessionMismatch {
  #[error("marker present but no server session")]
  MarkerWithoutSession,
  #[error("server session present but no marker")]
  SessionWithoutMarker,
  #[error("marker names {marker} but server session belongs to {server}")]
  DifferentSubjects { marker: SubjectId, server: SubjectId },
  #[error("marker {0:?} is not a subject id")]
  UnreadableMarker(String),
}

pub struct SessionGuard<I, M> {
  identity: I,
  marker:   M,
  timeout:  Duration,
  /// Bumped by every logout. A sign-in that returns after the count moved
  /// belongs to a session the user already left.
  logouts:  Mutex<u64>,
}

impl<I, M> SessionGuard<I, M>
where
  I: IdentityService,
  M: MarkerStore,
{
  pub fn new(identity: I, marker: M) -> Self {
    Self { identity, marker, timeout: DEFAULT_TIMEOUT, logouts: Mutex::new(0) }
  }

  /// Bound every identity-service call by `timeout`.
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn identity(&self) -> &I { &self.identity }

  pub fn marker(&self) -> &M { &self.marker }

  /// Reconcile the server session with the local marker.
  ///
  /// Any half-present state is torn down before returning
  /// [`Verdict::Unauthenticated`], so calling this twice in a row gives the
  /// same answer without further side effects.
  pub async fn verify_session(&self) -> Verdict {
    let marker = self.marker.read();
    let session = self.server_session().await;

    match reconcile(marker.as_deref(), session.as_ref()) {
      Ok(Verdict::Authenticated(subject)) => {
        debug!(%subject, "session verified");
        Verdict::Authenticated(subject)
      }
      Ok(Verdict::Unauthenticated) => Verdict::Unauthenticated,
      Err(mismatch) => {
        warn!(reason = %mismatch, "session signals disagree; tearing down");
        if marker.is_some() {
          self.marker.clear();
        }
        if session.is_some() {
          self.revoke_server_session().await;
        }
        Verdict::Unauthenticated
      }
    }
  }

  /// Sign in through the identity service and, on success, write the marker.
  ///
  /// Every failure, including an unreachable or slow identity service, comes
  /// back as [`Error::Auth`] with a message fit for display. No marker is
  /// written on failure. A sign-in overtaken by [`Self::logout`] is revoked
  /// again and also reported as [`Error::Auth`].
  pub async fn login(&self, credentials: Credentials) -> Result<SubjectId> {
    let identifier = credentials.identifier.trim();
    if identifier.is_empty() || credentials.secret.trim().is_empty() {
      return Err(Error::Auth(BLANK_CREDENTIALS.to_owned()));
    }
    let credentials = Credentials::new(identifier, credentials.secret);
    let generation = *self.logouts.lock();

    let outcome = timeout(self.timeout, self.identity.sign_in(credentials))
      .await
      .map_err(|_| Error::Auth("The identity service did not respond in time.".to_owned()))?
      .map_err(|e| {
        warn!(error = %e, "sign-in request failed");
        Error::Auth(format!("The identity service is unavailable: {e}"))
      })?;

    match outcome {
      SignIn::Granted(session) => {
        let current = {
          let logouts = self.logouts.lock();
          let current = *logouts == generation;
          if current {
            self.marker.write(&session.subject_id.to_string());
          }
          current
        };
        if !current {
          warn!(subject = %session.subject_id, "logged out during sign-in; revoking");
          self.revoke_server_session().await;
          return Err(Error::Auth(SIGNED_OUT_DURING_LOGIN.to_owned()));
        }
        info!(subject = %session.subject_id, "logged in");
        Ok(session.subject_id)
      }
      SignIn::Denied(reason) => {
        info!(%reason, "login denied");
        Err(Error::Auth(reason))
      }
    }
  }

  /// Revoke the server session, then clear the marker.
  ///
  /// The marker is cleared even when the revoke fails, so the client never
  /// stays logged in locally. Logging out without a session does nothing.
  /// Any sign-in still in flight is abandoned.
  pub async fn logout(&self) {
    *self.logouts.lock() += 1;
    self.revoke_server_session().await;
    self.marker.clear();
    info!("logged out");
  }

  /// The current subject, if the identity service and the marker agree on it.
  /// Unlike [`Self::verify_session`] this never tears anything down.
  pub async fn current_user(&self) -> Option<SubjectId> {
    let marked: SubjectId = self.marker.read()?.parse().ok()?;
    let server = timeout(self.timeout, self.identity.get_current_user())
      .await
      .ok()?
      .ok()??;
    (server == marked).then_some(marked)
  }

  async fn server_session(&self) -> Option<Session> {
    match timeout(self.timeout, self.identity.get_session()).await {
      Ok(Ok(session)) => session,
      Ok(Err(e)) => {
        warn!(error = %e, "could not confirm server session");
        None
      }
      Err(_) => {
        warn!("server session check timed out");
        None
      }
    }
  }

  async fn revoke_server_session(&self) {
    match timeout(self.timeout, self.identity.sign_out()).await {
      Ok(Ok(())) => {}
      Ok(Err(e)) => warn!(error = %e, "server sign-out failed"),
      Err(_) => warn!("server sign-out timed out"),
    }
  }
}

fn reconcile(
  marker: Option<&str>,
  session: Option<&Session>,
) -> Result<Verdict, SessionMismatch> {
  match (marker, session) {
    (None, None) => Ok(Verdict::Unauthenticated),
    (Some(_), None) => Err(SessionMismatch::MarkerWithoutSession),
    (None, Some(_)) => Err(SessionMismatch::SessionWithoutMarker),
    (Some(raw), Some(session)) => {
      let marker: SubjectId = raw
        .parse()
        .map_err(|_| SessionMismatch::UnreadableMarker(raw.to_owned()))?;
      if marker == session.subject_id {
        Ok(Verdict::Authenticated(marker))
      } else {
        Err(SessionMismatch::DifferentSubjects { marker, server: session.subject_id })
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{marker::MemoryMarker, testing::FakeIdentity};

  fn guard(identity: &FakeIdentity) -> SessionGuard<FakeIdentity, MemoryMarker> {
    SessionGuard::new(identity.clone(), MemoryMarker::new())
  }

  #[tokio::test]
  async fn login_writes_marker_and_verifies() {
    let identity = FakeIdentity::default();
    let subject = identity.add_account("dana", "hunter2");
    let g = guard(&identity);

    let who = g.login(Credentials::new("dana", "hunter2")).await.unwrap();
    assert_eq!(who, subject);
    assert_eq!(g.marker().read(), Some(subject.to_string()));
    assert_eq!(g.verify_session().await, Verdict::Authenticated(subject));
  }

  #[tokio::test]
  async fn denied_login_writes_nothing() {
    let identity = FakeIdentity::default();
    identity.add_account("dana", "hunter2");
    let g = guard(&identity);

    let err = g.login(Credentials::new("dana", "wrong")).await.unwrap_err();
    assert!(matches!(err, Error::Auth(ref m) if m.contains("Invalid")), "{err}");
    assert_eq!(g.marker().read(), None);
    assert!(!identity.has_session());
  }

  #[tokio::test]
  async fn blank_credentials_never_reach_the_service() {
    let identity = FakeIdentity::default();
    let g = guard(&identity);

    let err = g.login(Credentials::new("  ", "x")).await.unwrap_err();
    assert!(matches!(err, Error::Auth(ref m) if m == BLANK_CREDENTIALS));
    assert_eq!(identity.sign_in_calls(), 0);
  }

  #[tokio::test]
  async fn unreachable_service_is_an_auth_error() {
    let identity = FakeIdentity::default();
    identity.add_account("dana", "hunter2");
    identity.set_unreachable(true);
    let g = guard(&identity);

    let err = g.login(Credentials::new("dana", "hunter2")).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert_eq!(g.marker().read(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn slow_identity_service_is_an_auth_error() {
    let identity = FakeIdentity::default();
    identity.add_account("dana", "hunter2");
    let _gate = identity.gate_sign_in();
    let g = guard(&identity).with_timeout(Duration::from_secs(2));

    let err = g.login(Credentials::new("dana", "hunter2")).await.unwrap_err();
    assert!(matches!(err, Error::Auth(ref m) if m.contains("in time")), "{err}");
    assert_eq!(g.marker().read(), None);
    assert!(!identity.has_session());
  }

  #[tokio::test]
  async fn logout_during_sign_in_wins() {
    let identity = FakeIdentity::default();
    identity.add_account("dana", "hunter2");
    let g = guard(&identity);

    let gate = identity.gate_sign_in();
    let (login, ()) = tokio::join!(g.login(Credentials::new("dana", "hunter2")), async {
      gate.started.notified().await;
      g.logout().await;
      gate.release.notify_one();
    });

    let err = login.unwrap_err();
    assert!(matches!(err, Error::Auth(ref m) if m == SIGNED_OUT_DURING_LOGIN), "{err}");
    assert_eq!(g.marker().read(), None);
    // The session granted after the logout was revoked again.
    assert!(!identity.has_session());
    assert_eq!(g.verify_session().await, Verdict::Unauthenticated);
  }

  #[tokio::test]
  async fn login_after_logout_still_works() {
    let identity = FakeIdentity::default();
    let dana = identity.add_account("dana", "hunter2");
    let g = guard(&identity);
    g.logout().await;

    assert_eq!(g.login(Credentials::new("dana", "hunter2")).await.unwrap(), dana);
    assert_eq!(g.verify_session().await, Verdict::Authenticated(dana));
  }

  #[tokio::test]
  async fn logout_then_verify_is_unauthenticated_even_if_server_keeps_session() {
    let identity = FakeIdentity::default();
    identity.add_account("dana", "hunter2");
    let g = guard(&identity);
    g.login(Credentials::new("dana", "hunter2")).await.unwrap();

    // The revoke fails, but the marker must still go.
    identity.set_unreachable(true);
    g.logout().await;
    identity.set_unreachable(false);
    assert!(identity.has_session(), "server session survived the failed revoke");

    assert_eq!(g.verify_session().await, Verdict::Unauthenticated);
    assert_eq!(g.marker().read(), None);
    // The lingering server half was torn down by verification.
    assert!(!identity.has_session());
  }

  #[tokio::test]
  async fn logout_is_idempotent() {
    let identity = FakeIdentity::default();
    let g = guard(&identity);
    g.logout().await;
    g.logout().await;
    assert_eq!(g.verify_session().await, Verdict::Unauthenticated);
  }

  #[tokio::test]
  async fn expired_server_session_clears_marker() {
    let identity = FakeIdentity::default();
    identity.add_account("dana", "hunter2");
    let g = guard(&identity);
    g.login(Credentials::new("dana", "hunter2")).await.unwrap();

    identity.expire_session();
    assert_eq!(g.verify_session().await, Verdict::Unauthenticated);
    assert_eq!(g.marker().read(), None);
  }

  #[tokio::test]
  async fn fresh_tab_does_not_inherit_server_session() {
    let identity = FakeIdentity::default();
    let subject = identity.add_account("dana", "hunter2");
    identity.force_session(subject);

    let g = guard(&identity);
    assert_eq!(g.verify_session().await, Verdict::Unauthenticated);
    assert!(!identity.has_session());

    // A second call is a no-op.
    let revokes = identity.sign_out_calls();
    assert_eq!(g.verify_session().await, Verdict::Unauthenticated);
    assert_eq!(identity.sign_out_calls(), revokes);
  }

  #[tokio::test]
  async fn marker_for_another_subject_is_torn_down() {
    let identity = FakeIdentity::default();
    let dana = identity.add_account("dana", "hunter2");
    identity.force_session(dana);

    let g = guard(&identity);
    g.marker().write(&SubjectId::new().to_string());

    assert_eq!(g.verify_session().await, Verdict::Unauthenticated);
    assert_eq!(g.marker().read(), None);
    assert!(!identity.has_session());
  }

  #[tokio::test]
  async fn garbage_marker_is_torn_down() {
    let identity = FakeIdentity::default();
    let dana = identity.add_account("dana", "hunter2");
    identity.force_session(dana);

    let g = guard(&identity);
    g.marker().write("copied-from-somewhere");
    assert_eq!(g.verify_session().await, Verdict::Unauthenticated);
    assert_eq!(g.marker().read(), None);
  }

  #[tokio::test]
  async fn current_user_requires_agreement() {
    let identity = FakeIdentity::default();
    let dana = identity.add_account("dana", "hunter2");
    let g = guard(&identity);
    assert_eq!(g.current_user().await, None);

    g.login(Credentials::new("dana", "hunter2")).await.unwrap();
    assert_eq!(g.current_user().await, Some(dana));

    identity.expire_session();
    assert_eq!(g.current_user().await, None);
    // Unlike verification, asking does not clear the marker.
    assert!(g.marker().read().is_some());
  }

  #[test]
  fn credentials_debug_hides_secret() {
    let rendered = format!("{:?}", Credentials::new("dana", "hunter2"));
    assert!(!rendered.contains("hunter2"));
  }
}
