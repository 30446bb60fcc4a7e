//! [`Engagement`], the entry point the HTTP layer talks to.

use std::{sync::Arc, time::Duration};

use curio_core::{
  cache::CounterCache,
  engagement::{EngagementCounts, EventType, LikeOutcome},
  store::EngagementStore,
  subject::{Subject, SubjectUpdate},
};

use crate::{
  EngageError,
  Result,
  bus::LifecycleBus,
  counter::FastCounter,
  dedup::{DEFAULT_WINDOW, Deduplicator},
  fingerprint::Fingerprint,
  likes::LikeToggleEngine,
  reconciler::Reconciler,
};

#[derive(Debug, Clone, Copy)]
pub struct EngageConfig {
  pub dedup_window: Duration,
}

impl Default for EngageConfig {
  fn default() -> Self { Self { dedup_window: DEFAULT_WINDOW } }
}

/// Counters, likes and lifecycle cleanup over one store and one cache.
///
/// Cloning is cheap; all parts are reference-counted.
pub struct Engagement<S, C> {
  store:      Arc<S>,
  dedup:      Deduplicator<C>,
  reconciler: Reconciler<S>,
  likes:      LikeToggleEngine<S, C>,
  bus:        Arc<LifecycleBus>,
}

impl<S, C> Clone for Engagement<S, C> {
  fn clone(&self) -> Self {
    Self {
      store:      self.store.clone(),
      dedup:      self.dedup.clone(),
      reconciler: self.reconciler.clone(),
      likes:      self.likes.clone(),
      bus:        self.bus.clone(),
    }
  }
}

impl<S, C> Engagement<S, C>
where
  S: EngagementStore,
  C: CounterCache,
{
  pub fn new(
    store: Arc<S>,
    cache: Arc<C>,
    bus: Arc<LifecycleBus>,
    config: EngageConfig,
  ) -> Self {
    Self {
      dedup: Deduplicator::new(cache.clone(), config.dedup_window),
      reconciler: Reconciler::new(store.clone()),
      likes: LikeToggleEngine::new(store.clone(), FastCounter::new(cache)),
      store,
      bus,
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn bus(&self) -> &Arc<LifecycleBus> { &self.bus }

  /// Look up a subject, mapping absence to [`EngageError::SubjectNotFound`].
  pub async fn subject(&self, subject_id: i64) -> Result<Subject> {
    self
      .store
      .get_subject(subject_id)
      .await
      .map_err(EngageError::store)?
      .ok_or(EngageError::SubjectNotFound(subject_id))
  }

  /// Record a view or click from `fingerprint` and return the counts read
  /// back from the store. Duplicates inside the dedup window and unknown
  /// visitors are not counted but still succeed.
  #[tracing::instrument(level = "debug", skip(self, fingerprint))]
  pub async fn record_event(
    &self,
    subject_id: i64,
    event: EventType,
    fingerprint: Option<&Fingerprint>,
  ) -> Result<EngagementCounts> {
    self.subject(subject_id).await?;

    let counted = self.dedup.should_count(event, subject_id, fingerprint).await;
    if counted {
      self.reconciler.count_event(subject_id, event.counter()).await?;
    }

    let subject = self.subject(subject_id).await?;
    Ok(EngagementCounts {
      subject_id,
      counted,
      view_count: subject.view_count,
      like_count: subject.like_count,
      click_count: subject.click_count,
    })
  }

  /// Like or unlike `subject_id` on behalf of `actor_id`.
  pub async fn toggle_like(&self, subject_id: i64, actor_id: i64) -> Result<LikeOutcome> {
    self.likes.toggle(subject_id, actor_id).await
  }

  /// Update a subject. Cleanup of images the new body no longer references
  /// is queued once the update has committed.
  pub async fn update_subject(&self, subject_id: i64, update: SubjectUpdate) -> Result<Subject> {
    self.subject(subject_id).await?;
    let committed = self
      .store
      .update_subject(subject_id, update)
      .await
      .map_err(EngageError::store)?;
    Ok(self.bus.dispatch(committed))
  }

  /// Delete a subject. Its images are removed after the delete commits.
  pub async fn delete_subject(&self, subject_id: i64) -> Result<()> {
    self.subject(subject_id).await?;
    let committed = self
      .store
      .delete_subject(subject_id)
      .await
      .map_err(EngageError::store)?;
    self.bus.dispatch(committed);
    tracing::info!(subject_id, "subject deleted");
    Ok(())
  }

  /// Resynchronise one subject's like-count with its live like edges.
  pub async fn resync_likes(&self, subject_id: i64) -> Result<i64> {
    self.subject(subject_id).await?;
    self.likes.resync(subject_id).await
  }

  /// Resynchronise every subject. Failures are logged per subject; returns
  /// how many subjects were resynchronised.
  pub async fn resync_all_likes(&self) -> Result<usize> {
    let ids = self.store.list_subject_ids().await.map_err(EngageError::store)?;
    let mut done = 0;
    for id in ids {
      match self.likes.resync(id).await {
        Ok(_) => done += 1,
        Err(e) => tracing::warn!(subject_id = id, error = %e, "like resync failed"),
      }
    }
    tracing::info!(subjects = done, "like counts resynchronised");
    Ok(done)
  }
}
