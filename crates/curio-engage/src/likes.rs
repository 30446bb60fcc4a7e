//! The like toggle engine.
//!
//! Per `(subject, actor)` pair the state is either liked (a like edge exists)
//! or not. A toggle:
//!
//! 1. resolves subject and actor, failing before any cache mutation;
//! 2. flips the edge in one relational transaction, which also tells us the
//!    direction;
//! 3. adjusts the fast counter by `+1` or `-1` accordingly;
//! 4. folds the returned value into the authoritative like-count.
//!
//! Steps 2 and 3 are never reordered: the delta depends on what step 2
//! observed. Steps 2 to 4 and resynchronisation hold a per-subject lock, so a
//! resync never counts an edge whose delta is still on its way to the cache.
//!
//! A fold that comes back stale means the store moved past the cache (an edge
//! recount during a cache outage, or a resync elsewhere). The engine then
//! rebuilds both sides from the live edges instead of trusting the cache.

use std::sync::Arc;

use curio_core::{
  cache::CacheError,
  cache::CounterCache,
  engagement::{Adjusted, FoldOutcome, LikeOutcome},
  store::EngagementStore,
  subject::Subject,
};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
  EngageError,
  Result,
  counter::FastCounter,
  reconciler::Reconciler,
};

pub struct LikeToggleEngine<S, C> {
  store:      Arc<S>,
  counter:    FastCounter<C>,
  reconciler: Reconciler<S>,
  locks:      Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl<S, C> Clone for LikeToggleEngine<S, C> {
  fn clone(&self) -> Self {
    Self {
      store:      self.store.clone(),
      counter:    self.counter.clone(),
      reconciler: self.reconciler.clone(),
      locks:      self.locks.clone(),
    }
  }
}

impl<S, C> LikeToggleEngine<S, C>
where
  S: EngagementStore,
  C: CounterCache,
{
  pub fn new(store: Arc<S>, counter: FastCounter<C>) -> Self {
    let reconciler = Reconciler::new(store.clone());
    Self { store, counter, reconciler, locks: Arc::new(DashMap::new()) }
  }

  /// Flip the like state of `(subject_id, actor_id)`.
  #[tracing::instrument(level = "debug", skip(self))]
  pub async fn toggle(&self, subject_id: i64, actor_id: i64) -> Result<LikeOutcome> {
    self.subject(subject_id).await?;
    self
      .store
      .get_actor(actor_id)
      .await
      .map_err(EngageError::store)?
      .ok_or(EngageError::ActorNotFound(actor_id))?;

    let _guard = self.lock(subject_id).await;

    let liked = self
      .store
      .toggle_like_edge(subject_id, actor_id)
      .await
      .map_err(EngageError::store)?;
    let delta = if liked { 1 } else { -1 };

    // Re-read under the lock: the seed must reflect the latest fold.
    let subject = self.subject(subject_id).await?;
    let like_count = match self.adjust(&subject, delta).await {
      Ok(adjusted) => self.fold(subject_id, adjusted).await?,
      Err(e) => {
        // The edge already flipped; rebuild the count from the edges
        // themselves so the toggle still lands.
        tracing::warn!(subject_id, error = %e, "like counter unavailable, recounting edges");
        self.reconciler.recount_likes(subject_id).await?
      }
    };

    tracing::info!(subject_id, actor_id, liked, like_count, "like toggled");
    Ok(LikeOutcome { subject_id, actor_id, liked, like_count })
  }

  /// Resynchronise a subject's like-count with its live like edges, writing
  /// the result to both the fast counter and the relational store.
  pub async fn resync(&self, subject_id: i64) -> Result<i64> {
    let _guard = self.lock(subject_id).await;
    self.resync_locked(subject_id).await
  }

  async fn resync_locked(&self, subject_id: i64) -> Result<i64> {
    let subject = self.subject(subject_id).await?;
    let live = self
      .store
      .count_like_edges(subject_id)
      .await
      .map_err(EngageError::store)?;

    match self.counter.reset(subject_id, live, subject.like_revision).await {
      // A stale outcome here means another process folded a newer revision.
      Ok(adjusted) => Ok(
        self
          .reconciler
          .fold_into_authoritative(subject_id, adjusted)
          .await?
          .stored(),
      ),
      Err(e) => {
        tracing::warn!(subject_id, error = %e, "like counter unavailable during resync");
        self.reconciler.recount_likes(subject_id).await
      }
    }
  }

  async fn lock(&self, subject_id: i64) -> OwnedMutexGuard<()> {
    let lock = self.locks.entry(subject_id).or_default().clone();
    lock.lock_owned().await
  }

  async fn subject(&self, subject_id: i64) -> Result<Subject> {
    self
      .store
      .get_subject(subject_id)
      .await
      .map_err(EngageError::store)?
      .ok_or(EngageError::SubjectNotFound(subject_id))
  }

  async fn adjust(&self, subject: &Subject, delta: i64) -> std::result::Result<Adjusted, CacheError> {
    self.counter.seed(subject).await?;
    self.counter.adjust(subject.subject_id, delta).await
  }

  /// Fold the adjusted value. A stale fold triggers a resync from the
  /// edges. A failed fold is tolerated: the cache keeps the newer value and
  /// the next successful fold for this subject catches up.
  async fn fold(&self, subject_id: i64, adjusted: Adjusted) -> Result<i64> {
    match self.reconciler.fold_into_authoritative(subject_id, adjusted).await {
      Ok(FoldOutcome::Applied { stored }) => Ok(stored),
      Ok(FoldOutcome::Stale { stored }) => {
        tracing::info!(
          subject_id,
          revision = adjusted.revision,
          stored,
          "like counter behind the store, resyncing from edges"
        );
        self.resync_locked(subject_id).await
      }
      Err(e) => {
        tracing::warn!(
          subject_id,
          revision = adjusted.revision,
          error = %e,
          "like fold failed, cache is ahead of store"
        );
        Ok(self.subject(subject_id).await?.like_count)
      }
    }
  }
}
