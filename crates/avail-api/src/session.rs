//! Handlers for `/session` endpoints.
//!
//! | Method   | Path       | Notes |
//! |----------|------------|-------|
//! | `POST`   | `/session` | Body: `{"identifier":…,"secret":…}`; 201 with token |
//! | `GET`    | `/session` | Bearer; the live session |
//! | `DELETE` | `/session` | Optional bearer; always 204 |

use argon2::{Argon2, PasswordHash, PasswordVerifier as _};
use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use avail_core::{
  identity::RegistrationStatus,
  store::{Credentials, RegistryStore, Session},
};
use tracing::{debug, info, warn};

use crate::{
  AppState,
  auth::{Authenticated, bearer_token},
  error::{ApiError, INVALID_CREDENTIALS},
};

// ─── Sign in ─────────────────────────────────────────────────────────────────

/// `POST /session`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistryStore,
{
  let identifier = body.identifier.trim();
  if identifier.is_empty() || body.secret.is_empty() {
    return Err(ApiError::Denied(INVALID_CREDENTIALS.to_owned()));
  }

  let account = state
    .store
    .find_account(identifier)
    .await
    .map_err(ApiError::store)?;
  let Some(account) = account else {
    debug!("sign-in for unknown identifier");
    return Err(ApiError::Denied(INVALID_CREDENTIALS.to_owned()));
  };

  let verified = match PasswordHash::new(&account.password_hash) {
    Ok(parsed) => Argon2::default()
      .verify_password(body.secret.as_bytes(), &parsed)
      .is_ok(),
    Err(e) => {
      warn!(subject_id = %account.subject_id, error = %e, "stored password hash unreadable");
      false
    }
  };
  if !verified {
    debug!(subject_id = %account.subject_id, "sign-in with wrong secret");
    return Err(ApiError::Denied(INVALID_CREDENTIALS.to_owned()));
  }

  let profile = state
    .store
    .get_profile(account.subject_id)
    .await
    .map_err(ApiError::store)?;
  if profile.is_some_and(|p| p.registration_status == RegistrationStatus::Suspended) {
    info!(subject_id = %account.subject_id, "sign-in refused for suspended registration");
    return Err(ApiError::Forbidden("Registration suspended.".to_owned()));
  }

  let issued = state
    .store
    .open_session(account.subject_id, state.session_ttl)
    .await
    .map_err(ApiError::store)?;
  info!(subject_id = %account.subject_id, "session opened");
  Ok((StatusCode::CREATED, Json(issued)))
}

// ─── Current session ─────────────────────────────────────────────────────────

/// `GET /session`
pub async fn get_one(auth: Authenticated) -> Json<Session> { Json(auth.session) }

// ─── Sign out ────────────────────────────────────────────────────────────────

/// `DELETE /session`
///
/// Idempotent: an absent, unknown or already revoked token still gets 204.
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
) -> Result<StatusCode, ApiError>
where
  S: RegistryStore,
{
  if let Some(token) = bearer_token(&headers) {
    state
      .store
      .revoke_session(token)
      .await
      .map_err(ApiError::store)?;
  }
  Ok(StatusCode::NO_CONTENT)
}
