//! The fast like counter held in the counter cache.
//!
//! The cached value is what gets folded into the relational like-count. It is
//! seeded lazily from the stored count the first time a subject is touched,
//! so a cold cache continues from the authoritative value instead of zero.

use std::sync::Arc;

use curio_core::{
  cache::{CacheError, CounterCache},
  engagement::Adjusted,
  subject::Subject,
};

/// Cache key for a subject's like counter.
pub fn counter_key(subject_id: i64) -> String { format!("likes:{subject_id}") }

pub struct FastCounter<C> {
  cache: Arc<C>,
}

impl<C> Clone for FastCounter<C> {
  fn clone(&self) -> Self { Self { cache: self.cache.clone() } }
}

impl<C: CounterCache> FastCounter<C> {
  pub fn new(cache: Arc<C>) -> Self { Self { cache } }

  /// Initialise the counter from `subject`'s stored like-count if the cache
  /// has no value for it. Returns `true` if this call seeded it.
  pub async fn seed(&self, subject: &Subject) -> Result<bool, CacheError> {
    let key = counter_key(subject.subject_id);
    let seeded = self
      .cache
      .seed(&key, subject.like_count, subject.like_revision)
      .await?;
    if seeded {
      tracing::debug!(
        subject_id = subject.subject_id,
        like_count = subject.like_count,
        "like counter seeded from store"
      );
    }
    Ok(seeded)
  }

  /// Atomically add `delta` and return the new value with its revision.
  pub async fn adjust(&self, subject_id: i64, delta: i64) -> Result<Adjusted, CacheError> {
    self.cache.adjust(&counter_key(subject_id), delta).await
  }

  /// Overwrite the counter during resynchronisation, at a revision newer
  /// than `stored_revision`.
  pub async fn reset(
    &self,
    subject_id: i64,
    value: i64,
    stored_revision: u64,
  ) -> Result<Adjusted, CacheError> {
    self.cache.reset(&counter_key(subject_id), value, stored_revision).await
  }
}
