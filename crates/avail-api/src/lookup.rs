//! `GET /lookup?handle=<handle>` — public view of another subject.

use axum::{
  Json,
  extract::{Query, State},
};
use avail_core::{
  declaration::select_current,
  identity::{PublicEntry, normalize_handle},
  store::RegistryStore,
};
use serde::Deserialize;

use crate::{AppState, auth::Authenticated, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct LookupParams {
  pub handle: String,
}

/// `GET /lookup?handle=<handle>`
///
/// Accepts the handle with or without its leading `@`.
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  _auth: Authenticated,
  Query(params): Query<LookupParams>,
) -> Result<Json<PublicEntry>, ApiError>
where
  S: RegistryStore,
{
  let handle = normalize_handle(&params.handle)
    .ok_or_else(|| ApiError::BadRequest("handle must not be blank".into()))?;

  let record = state
    .store
    .find_by_handle(&handle)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no subject with handle @{handle}")))?;

  let history = state
    .store
    .list_declarations(record.subject_id)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(PublicEntry {
    current:             select_current(record.subject_id, &history),
    handle:              record.handle,
    legal_name:          record.legal_name,
    registration_status: record.registration_status,
  }))
}
