//! Handlers for `/profiles` endpoints.
//!
//! A subject may read only its own identity record. Other subjects are seen
//! through `/lookup`, which exposes the public fields alone.

use axum::{
  Json,
  extract::{Path, State},
};
use avail_core::{SubjectId, identity::IdentityRecord, store::RegistryStore};

use crate::{AppState, auth::Authenticated, error::ApiError};

/// `GET /profiles/{subject_id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  auth: Authenticated,
  Path(subject_id): Path<SubjectId>,
) -> Result<Json<IdentityRecord>, ApiError>
where
  S: RegistryStore,
{
  if subject_id != auth.session.subject_id {
    return Err(ApiError::Forbidden("profiles are private to their subject".into()));
  }
  state
    .store
    .get_profile(subject_id)
    .await
    .map_err(ApiError::store)?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("no identity record for subject {subject_id}")))
}
