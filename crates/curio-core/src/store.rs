//! The `EngagementStore` trait, the relational side of the engagement
//! subsystem.
//!
//! The trait is implemented by storage backends (e.g. `curio-store-sqlite`).
//! `curio-engage` and `curio-api` depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use crate::{
  engagement::FoldOutcome,
  lifecycle::{Committed, ImageRef},
  subject::{Actor, Counter, NewSubject, Subject, SubjectUpdate},
};

/// Abstraction over the relational store that owns authoritative counters.
///
/// Every counter write commits in its own transaction before the future
/// resolves. No method nests inside a transaction opened by the caller, so a
/// later failure elsewhere in the same request cannot undo a counted event.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait EngagementStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Create a subject with all counters at zero.
  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Retrieve a subject by id. Returns `None` if not found.
  fn get_subject(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Ids of every subject, in ascending order.
  fn list_subject_ids(
    &self,
  ) -> impl Future<Output = Result<Vec<i64>, Self::Error>> + Send + '_;

  /// Apply `update` and publish a [`ChangeKind::Updated`] event carrying the
  /// image references of the new body.
  ///
  /// [`ChangeKind::Updated`]: crate::lifecycle::ChangeKind::Updated
  fn update_subject(
    &self,
    id: i64,
    update: SubjectUpdate,
  ) -> impl Future<Output = Result<Committed<Subject>, Self::Error>> + Send + '_;

  /// Delete a subject and its like edges, publishing a
  /// [`ChangeKind::Deleted`] event. Indexed images are left for the cleanup
  /// handler.
  ///
  /// [`ChangeKind::Deleted`]: crate::lifecycle::ChangeKind::Deleted
  fn delete_subject(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Committed<()>, Self::Error>> + Send + '_;

  // ── Actors ────────────────────────────────────────────────────────────

  fn add_actor(
    &self,
    handle: String,
  ) -> impl Future<Output = Result<Actor, Self::Error>> + Send + '_;

  fn get_actor(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Actor>, Self::Error>> + Send + '_;

  // ── Like edges ────────────────────────────────────────────────────────

  /// Flip the like edge for `(subject_id, actor_id)` in one transaction.
  ///
  /// Returns `true` if the edge exists afterwards (the pair is now liked).
  fn toggle_like_edge(
    &self,
    subject_id: i64,
    actor_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn like_edge_exists(
    &self,
    subject_id: i64,
    actor_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn count_like_edges(
    &self,
    subject_id: i64,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  // ── Counters ──────────────────────────────────────────────────────────

  /// Add one to `counter` and return the committed value.
  fn increment_counter(
    &self,
    subject_id: i64,
    counter: Counter,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Write a cached like-count into the subject row unless a fold with an
  /// equal or newer `revision` already landed. `value` must already be
  /// clamped by the caller.
  fn fold_like_count(
    &self,
    subject_id: i64,
    value: i64,
    revision: u64,
  ) -> impl Future<Output = Result<FoldOutcome, Self::Error>> + Send + '_;

  /// Set the like-count to the number of live like edges, bypassing the
  /// cache, and advance the like revision so that any value the cache still
  /// holds is treated as stale by later folds. Returns the recounted value.
  fn recount_likes(
    &self,
    subject_id: i64,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  // ── Image index ───────────────────────────────────────────────────────

  /// Index an object under `subject_id`. Returns `None` if `name` is
  /// already indexed; names are unique across subjects.
  fn register_image(
    &self,
    subject_id: i64,
    name: String,
  ) -> impl Future<Output = Result<Option<ImageRef>, Self::Error>> + Send + '_;

  fn images_for_subject(
    &self,
    subject_id: i64,
  ) -> impl Future<Output = Result<Vec<ImageRef>, Self::Error>> + Send + '_;

  /// Remove an index row. Returns `false` if it was already gone.
  fn remove_image<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
