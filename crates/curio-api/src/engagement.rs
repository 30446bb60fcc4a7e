//! Handlers for view, click and like endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/subjects/:id/views` | Visitor from proxy headers or peer address |
//! | `POST` | `/subjects/:id/clicks` | As views, separate dedup scope |
//! | `POST` | `/subjects/:id/likes` | Body: `{"actor_id":1}`; toggles |
//! | `POST` | `/subjects/:id/likes/resync` | Recount from like edges |
//!
//! Every response carries counts read back from the relational store.

use axum::{
  Json,
  extract::{Path, State},
};
use curio_core::{
  cache::CounterCache,
  engagement::{EngagementCounts, EventType, LikeOutcome},
  store::EngagementStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, detached, error::ApiError, visitor::VisitorOrigin};

// ─── Views and clicks ─────────────────────────────────────────────────────────

/// `POST /subjects/:id/views`
pub async fn view<S, C>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<i64>,
  origin: VisitorOrigin,
) -> Result<Json<EngagementCounts>, ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  record(state, id, EventType::View, origin).await
}

/// `POST /subjects/:id/clicks`
pub async fn click<S, C>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<i64>,
  origin: VisitorOrigin,
) -> Result<Json<EngagementCounts>, ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  record(state, id, EventType::Click, origin).await
}

async fn record<S, C>(
  state: AppState<S, C>,
  id: i64,
  event: EventType,
  origin: VisitorOrigin,
) -> Result<Json<EngagementCounts>, ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  let fingerprint = origin.fingerprint(&state.fingerprints);
  let engine = state.engine;
  let counts =
    detached(async move { engine.record_event(id, event, fingerprint.as_ref()).await }).await?;
  Ok(Json(counts))
}

// ─── Likes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LikeBody {
  pub actor_id: i64,
}

/// `POST /subjects/:id/likes` — body: `{"actor_id":1}`
pub async fn toggle_like<S, C>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<i64>,
  Json(body): Json<LikeBody>,
) -> Result<Json<LikeOutcome>, ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  let engine = state.engine;
  let outcome = detached(async move { engine.toggle_like(id, body.actor_id).await }).await?;
  Ok(Json(outcome))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResyncResponse {
  pub subject_id: i64,
  pub like_count: i64,
}

/// `POST /subjects/:id/likes/resync`
pub async fn resync_likes<S, C>(
  State(state): State<AppState<S, C>>,
  Path(id): Path<i64>,
) -> Result<Json<ResyncResponse>, ApiError>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  let engine = state.engine;
  let like_count = detached(async move { engine.resync_likes(id).await }).await?;
  Ok(Json(ResyncResponse { subject_id: id, like_count }))
}
