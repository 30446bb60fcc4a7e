//! Handlers for `/actors` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/actors` | Body: `{"handle":"ana"}` |
//! | `GET`  | `/actors/:id` | 404 if not found |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use curio_core::{cache::CounterCache, store::EngagementStore, subject::Actor};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub handle: String,
}

/// `POST /actors`
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  let handle = body.handle.trim();
  if handle.is_empty() {
    return Err(ApiError::BadRequest("handle must not be empty".into()));
  }
  let actor = state
    .engine
    .store()
    .add_actor(handle.to_owned())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok((StatusCode::CREATED, Json(actor)))
}

/// `GET /actors/:id`
pub async fn get_one<S, C>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<i64>,
) -> Result<Json<Actor>, ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  let actor = state
    .engine
    .store()
    .get_actor(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("actor {id} not found")))?;
  Ok(Json(actor))
}
