//! Handlers for `/declarations` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/declarations?subject_id=<uuid>` | Newest first |
//! | `POST` | `/declarations` | Body: `{"status":true,"annotation":"…"}` |
//!
//! Declarations are append-only; there is no update or delete route.

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use avail_core::{
  SubjectId,
  declaration::{Declaration, NewDeclaration},
  store::RegistryStore,
};
use serde::Deserialize;
use tracing::info;

use crate::{AppState, auth::Authenticated, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub subject_id: SubjectId,
}

/// `GET /declarations?subject_id=<uuid>`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Declaration>>, ApiError>
where
  S: RegistryStore,
{
  if params.subject_id != auth.session.subject_id {
    return Err(ApiError::Forbidden("declaration history is private to its subject".into()));
  }
  let records = state
    .store
    .list_declarations(params.subject_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  /// Optional; must match the session subject when given.
  pub subject_id: Option<SubjectId>,
  pub status:     bool,
  #[serde(default)]
  pub annotation: String,
}

/// `POST /declarations`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RegistryStore,
{
  let subject_id = auth.session.subject_id;
  if body.subject_id.is_some_and(|s| s != subject_id) {
    return Err(ApiError::Forbidden("cannot declare for another subject".into()));
  }

  let stored = state
    .store
    .insert_declaration(NewDeclaration::new(subject_id, body.status, body.annotation))
    .await
    .map_err(ApiError::store)?;
  info!(%subject_id, seq = stored.seq, status = stored.status, "declaration recorded");
  Ok((StatusCode::CREATED, Json(stored)))
}
