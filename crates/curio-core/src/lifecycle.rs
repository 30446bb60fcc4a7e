//! Lifecycle events and the transaction-bound outbox that carries them.
//!
//! A mutation publishes its event into an [`Outbox`] while its transaction is
//! still open. The outbox only leaves the store wrapped in [`Committed`], so
//! a rolled-back transaction can never dispatch anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

// ─── Events ──────────────────────────────────────────────────────────────────

/// What happened to the subject.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
  Updated,
  Deleted,
}

/// An immutable notice that a subject's state durably changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
  pub subject_id:    i64,
  pub change:        ChangeKind,
  /// Resources still referenced after the change. Always empty for
  /// [`ChangeKind::Deleted`], which implies "everything the subject owned".
  pub resource_refs: Vec<String>,
}

impl LifecycleEvent {
  pub fn updated(
    subject_id: i64,
    resource_refs: impl IntoIterator<Item = String>,
  ) -> Self {
    Self {
      subject_id,
      change: ChangeKind::Updated,
      resource_refs: resource_refs.into_iter().collect(),
    }
  }

  pub fn deleted(subject_id: i64) -> Self {
    Self {
      subject_id,
      change: ChangeKind::Deleted,
      resource_refs: Vec::new(),
    }
  }
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

/// Events published inside an open transaction, awaiting its commit.
#[derive(Debug, Default)]
pub struct Outbox {
  events: Vec<LifecycleEvent>,
}

impl Outbox {
  pub fn new() -> Self { Self::default() }

  /// Queue `event` for dispatch once the owning transaction commits.
  pub fn publish(&mut self, event: LifecycleEvent) { self.events.push(event); }

  /// Seal the outbox after a successful commit.
  pub fn seal<T>(self, value: T) -> Committed<T> {
    Committed { value, outbox: self }
  }
}

/// The result of a committed mutation plus the events it published.
#[derive(Debug)]
pub struct Committed<T> {
  pub value: T,
  outbox:    Outbox,
}

impl<T> Committed<T> {
  /// Split into the value and the events that are now safe to dispatch.
  pub fn into_parts(self) -> (T, Vec<LifecycleEvent>) {
    (self.value, self.outbox.events)
  }
}

// ─── Image index ─────────────────────────────────────────────────────────────

/// A row of the local image index; mirrors one object in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
  pub name:       String,
  pub subject_id: i64,
  pub created_at: DateTime<Utc>,
}
