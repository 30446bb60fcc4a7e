//! Handlers for `/subjects` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/subjects` | Body: `{"kind":"post","title":"…","body":"…"}` |
//! | `GET`    | `/subjects/:id` | 404 if not found |
//! | `PUT`    | `/subjects/:id` | Body: `{"title"?:…, "body"?:…}`; queues image cleanup |
//! | `DELETE` | `/subjects/:id` | 204; queues image cleanup |
//! | `POST`   | `/subjects/:id/images` | Body: `{"name":"cover.png"}`; 409 if the name is indexed |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use curio_core::{
  cache::CounterCache,
  lifecycle::ImageRef,
  store::EngagementStore,
  subject::{NewSubject, Subject, SubjectUpdate},
};
use serde::Deserialize;

use crate::{AppState, detached, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /subjects`
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  Json(body): Json<NewSubject>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  if body.title.trim().is_empty() {
    return Err(ApiError::BadRequest("title must not be empty".into()));
  }
  let subject = state
    .engine
    .store()
    .add_subject(body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  tracing::info!(subject_id = subject.subject_id, kind = %subject.kind, "subject created");
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /subjects/:id`
pub async fn get_one<S, C>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<i64>,
) -> Result<Json<Subject>, ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  Ok(Json(state.engine.subject(id).await?))
}

// ─── Update / delete ──────────────────────────────────────────────────────────

/// `PUT /subjects/:id`
pub async fn update<S, C>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<i64>,
  Json(body): Json<SubjectUpdate>,
) -> Result<Json<Subject>, ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  if body.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
    return Err(ApiError::BadRequest("title must not be empty".into()));
  }
  let engine = state.engine;
  let subject = detached(async move { engine.update_subject(id, body).await }).await?;
  Ok(Json(subject))
}

/// `DELETE /subjects/:id`
pub async fn delete_one<S, C>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  let engine = state.engine;
  detached(async move { engine.delete_subject(id).await }).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Images ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ImageBody {
  pub name: String,
}

/// `POST /subjects/:id/images` — index an already-uploaded object.
pub async fn register_image<S, C>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<i64>,
  Json(body): Json<ImageBody>,
) -> Result<(StatusCode, Json<ImageRef>), ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  let name = curio_core::refs::object_name(&body.name)
    .ok_or_else(|| ApiError::BadRequest("image name must not be empty".into()))?;
  state.engine.subject(id).await?;
  let image = state
    .engine
    .store()
    .register_image(id, name.to_owned())
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::Conflict(format!("image {name} is already indexed")))?;
  Ok((StatusCode::CREATED, Json(image)))
}
