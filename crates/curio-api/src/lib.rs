//! JSON REST API for Curio's engagement subsystem.
//!
//! Exposes an axum [`Router`] backed by any [`EngagementStore`] and
//! [`CounterCache`]. Auth, TLS, and object upload are the caller's
//! responsibility.
//!
//! Engine calls run on their own tokio task, so a client that disconnects
//! mid-request never cancels a counter fold halfway through.

pub mod actors;
pub mod engagement;
pub mod error;
pub mod subjects;
pub mod visitor;

use std::{future::Future, path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use curio_core::{cache::CounterCache, store::EngagementStore};
use curio_engage::{EngageError, Engagement, fingerprint::FingerprintResolver};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CURIO_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                      String,
  #[serde(default = "default_port")]
  pub port:                      u16,
  pub store_path:                PathBuf,
  pub object_dir:                PathBuf,
  #[serde(default = "default_dedup_window_secs")]
  pub dedup_window_secs:         u64,
  /// Period of the background like resync. Unset disables it.
  #[serde(default)]
  pub like_resync_interval_secs: Option<u64>,
  /// Identity used for loopback visitors. Unset resolves the local host.
  #[serde(default)]
  pub loopback_alias:            Option<String>,
  /// Headers consulted for the visitor address, in order, before the peer
  /// address. Unset uses the built-in list.
  #[serde(default)]
  pub fingerprint_headers:       Option<Vec<String>>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_dedup_window_secs() -> u64 { curio_engage::dedup::DEFAULT_WINDOW.as_secs() }

impl ServerConfig {
  /// Build the fingerprint resolver this configuration describes.
  pub fn fingerprint_resolver(&self, loopback_alias: Option<String>) -> FingerprintResolver {
    let resolver = match &self.fingerprint_headers {
      Some(headers) => FingerprintResolver::from_headers(headers.iter().map(String::as_str)),
      None => FingerprintResolver::default(),
    };
    resolver.with_loopback_alias(loopback_alias)
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, C> {
  pub engine:       Engagement<S, C>,
  pub fingerprints: Arc<FingerprintResolver>,
}

impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self {
      engine:       self.engine.clone(),
      fingerprints: self.fingerprints.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
pub fn router<S, C>(state: AppState<S, C>) -> Router<()>
where
  S: EngagementStore + 'static,
  C: CounterCache + 'static,
{
  Router::new()
    // Subjects
    .route("/subjects", post(subjects::create::<S, C>))
    .route(
      "/subjects/{id}",
      get(subjects::get_one::<S, C>)
        .put(subjects::update::<S, C>)
        .delete(subjects::delete_one::<S, C>),
    )
    .route("/subjects/{id}/images", post(subjects::register_image::<S, C>))
    // Engagement
    .route("/subjects/{id}/views", post(engagement::view::<S, C>))
    .route("/subjects/{id}/clicks", post(engagement::click::<S, C>))
    .route("/subjects/{id}/likes", post(engagement::toggle_like::<S, C>))
    .route("/subjects/{id}/likes/resync", post(engagement::resync_likes::<S, C>))
    // Actors
    .route("/actors", post(actors::create::<S, C>))
    .route("/actors/{id}", get(actors::get_one::<S, C>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Run an engine call to completion on its own task.
async fn detached<F, T>(call: F) -> Result<T, ApiError>
where
  F: Future<Output = Result<T, EngageError>> + Send + 'static,
  T: Send + 'static,
{
  tokio::spawn(call)
    .await
    .map_err(|e| ApiError::Internal(format!("engine task failed: {e}")))?
    .map_err(ApiError::from)
}

#[cfg(test)]
mod tests;
