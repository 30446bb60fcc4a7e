//! The counter reconciler: the only writer of authoritative counters.
//!
//! Each operation is a single store call that commits its own transaction
//! before returning, independent of anything else the request is doing.
//! A counted view stays counted even if a later step of the request fails.

use std::sync::Arc;

use curio_core::{
  engagement::{Adjusted, FoldOutcome},
  store::EngagementStore,
  subject::Counter,
};

use crate::{EngageError, Result};

pub struct Reconciler<S> {
  store: Arc<S>,
}

impl<S> Clone for Reconciler<S> {
  fn clone(&self) -> Self { Self { store: self.store.clone() } }
}

impl<S: EngagementStore> Reconciler<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Fold a cached like-count into the subject row.
  ///
  /// Negative values (possible when unlikes race a cold cache) are clamped
  /// to zero. Folds not newer than the stored revision are skipped and come
  /// back as [`FoldOutcome::Stale`].
  #[tracing::instrument(level = "debug", skip(self))]
  pub async fn fold_into_authoritative(
    &self,
    subject_id: i64,
    adjusted: Adjusted,
  ) -> Result<FoldOutcome> {
    let value = if adjusted.value < 0 {
      tracing::warn!(
        subject_id,
        value = adjusted.value,
        revision = adjusted.revision,
        "negative like counter clamped to zero"
      );
      0
    } else {
      adjusted.value
    };

    let outcome = self
      .store
      .fold_like_count(subject_id, value, adjusted.revision)
      .await
      .map_err(EngageError::store)?;

    if let FoldOutcome::Stale { stored } = outcome {
      tracing::debug!(subject_id, revision = adjusted.revision, stored, "stale fold skipped");
    }
    Ok(outcome)
  }

  /// Count one first-seen event against `counter`.
  pub async fn count_event(&self, subject_id: i64, counter: Counter) -> Result<i64> {
    let value = self
      .store
      .increment_counter(subject_id, counter)
      .await
      .map_err(EngageError::store)?;
    tracing::debug!(subject_id, %counter, value, "event counted");
    Ok(value)
  }

  /// Reset the like-count to the number of live like edges and advance the
  /// stored revision, so the cache's next fold for the subject comes back
  /// stale.
  pub async fn recount_likes(&self, subject_id: i64) -> Result<i64> {
    self
      .store
      .recount_likes(subject_id)
      .await
      .map_err(EngageError::store)
  }
}
