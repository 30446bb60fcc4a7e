//! Idempotent event deduplication.
//!
//! A view or click counts only if no marker exists for
//! `(event type, subject, fingerprint)`. The marker is created by the same
//! atomic set-if-absent that tests for it, and expires on its own after the
//! dedup window.

use std::{sync::Arc, time::Duration};

use curio_core::{
  cache::{CacheError, CounterCache},
  engagement::EventType,
};

use crate::fingerprint::Fingerprint;

/// How long a visitor's repeat events on one subject are suppressed.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10 * 60);

/// Cache key for a dedup marker.
pub fn marker_key(event: EventType, subject_id: i64, fingerprint: &Fingerprint) -> String {
  format!("dedup:{event}:{subject_id}:{fingerprint}")
}

pub struct Deduplicator<C> {
  cache:  Arc<C>,
  window: Duration,
}

impl<C> Clone for Deduplicator<C> {
  fn clone(&self) -> Self {
    Self { cache: self.cache.clone(), window: self.window }
  }
}

impl<C: CounterCache> Deduplicator<C> {
  pub fn new(cache: Arc<C>, window: Duration) -> Self { Self { cache, window } }

  pub fn window(&self) -> Duration { self.window }

  /// Atomically record `(event, subject_id, fingerprint)` for `ttl`.
  ///
  /// Returns `true` only for the first occurrence inside the window. A
  /// repeat leaves the existing marker and its TTL untouched.
  pub async fn mark_if_first(
    &self,
    event: EventType,
    subject_id: i64,
    fingerprint: &Fingerprint,
    ttl: Duration,
  ) -> Result<bool, CacheError> {
    let key = marker_key(event, subject_id, fingerprint);
    self.cache.set_if_absent(&key, ttl).await
  }

  /// Decide whether an event should be counted, failing closed.
  ///
  /// Unknown visitors and cache failures both answer `false`: an outage may
  /// under-count, but it never double-counts.
  pub async fn should_count(
    &self,
    event: EventType,
    subject_id: i64,
    fingerprint: Option<&Fingerprint>,
  ) -> bool {
    let Some(fingerprint) = fingerprint else {
      tracing::debug!(%event, subject_id, "visitor unknown, event not counted");
      return false;
    };

    match self.mark_if_first(event, subject_id, fingerprint, self.window).await {
      Ok(first) => first,
      Err(e) => {
        tracing::warn!(%event, subject_id, error = %e, "dedup backend unavailable, event not counted");
        false
      }
    }
  }
}
