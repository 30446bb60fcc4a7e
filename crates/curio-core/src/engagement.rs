//! Engagement events, like edges, and counter values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::subject::Counter;

/// A deduplicated engagement event kind. Each maps to one counter column.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EventType {
  View,
  Click,
}

impl EventType {
  /// The counter a first-seen event of this type increments.
  pub fn counter(self) -> Counter {
    match self {
      Self::View => Counter::Views,
      Self::Click => Counter::Clicks,
    }
  }
}

/// "Actor likes subject". At most one per `(subject_id, actor_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeEdge {
  pub subject_id: i64,
  pub actor_id:   i64,
  pub created_at: DateTime<Utc>,
}

/// A counter value as held by the counter cache.
///
/// `revision` increases with every mutation of the key, which lets the
/// reconciler discard folds that complete out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjusted {
  pub value:    i64,
  pub revision: u64,
}

/// Result of folding a cached like-count into the relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
  /// The value was written; `stored` is what the row now holds.
  Applied { stored: i64 },
  /// A fold with an equal or newer revision already landed.
  Stale { stored: i64 },
}

impl FoldOutcome {
  pub fn stored(self) -> i64 {
    match self {
      Self::Applied { stored } | Self::Stale { stored } => stored,
    }
  }
}

/// The state of a `(subject, actor)` pair after a like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOutcome {
  pub subject_id: i64,
  pub actor_id:   i64,
  pub liked:      bool,
  /// Authoritative like-count read back after folding.
  pub like_count: i64,
}

/// Counts returned to a client after a view or click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
  pub subject_id:  i64,
  /// Whether this request was counted (false for duplicates and unknown
  /// visitors).
  pub counted:     bool,
  pub view_count:  i64,
  pub like_count:  i64,
  pub click_count: i64,
}
