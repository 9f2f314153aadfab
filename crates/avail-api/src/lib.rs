//! JSON REST API for the availability registry.
//!
//! Exposes an axum [`Router`] backed by any
//! [`avail_core::store::RegistryStore`]. Clients authenticate with the bearer
//! token returned by `POST /session`. TLS and listener setup are the caller's
//! responsibility.
//!
//! | Method   | Path | Auth |
//! |----------|------|------|
//! | `POST`   | `/session` | – |
//! | `GET`    | `/session` | bearer |
//! | `DELETE` | `/session` | optional bearer |
//! | `GET`    | `/profiles/{subject_id}` | bearer, own subject |
//! | `GET`    | `/declarations?subject_id=` | bearer, own subject |
//! | `POST`   | `/declarations` | bearer |
//! | `GET`    | `/lookup?handle=` | bearer |

pub mod auth;
pub mod declarations;
pub mod error;
pub mod lookup;
pub mod profiles;
pub mod session;

use std::{sync::Arc, time::Duration};

use avail_core::store::RegistryStore;
use axum::{
  Router,
  routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Session lifetime used when none is configured.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:       Arc<S>,
  /// Lifetime of sessions opened by `POST /session`.
  pub session_ttl: Duration,
}

impl<S> AppState<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store, session_ttl: DEFAULT_SESSION_TTL } }

  pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
    self.session_ttl = ttl;
    self
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), session_ttl: self.session_ttl }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the registry API router over `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RegistryStore + 'static,
{
  Router::new()
    // Identity
    .route(
      "/session",
      post(session::create::<S>)
        .get(session::get_one)
        .delete(session::delete::<S>),
    )
    // Records
    .route("/profiles/{subject_id}", get(profiles::get_one::<S>))
    .route(
      "/declarations",
      get(declarations::list::<S>).post(declarations::create::<S>),
    )
    .route("/lookup", get(lookup::handler::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
