//! Subjects and actors: the countable content items and the people who
//! engage with them.
//!
//! A subject's counters are owned by the relational store. Request handlers
//! never write them directly; they go through the reconciler or the like
//! toggle engine in `curio-engage`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// The kind of content a subject represents.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SubjectKind {
  Post,
  Link,
  Playlist,
}

/// A countable content item together with its authoritative counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:    i64,
  pub kind:          SubjectKind,
  pub title:         String,
  /// Markdown/HTML body; image references are extracted from it on update.
  pub body:          String,
  pub view_count:    i64,
  pub like_count:    i64,
  pub click_count:   i64,
  /// Cache revision of the last folded like-count.
  #[serde(skip)]
  pub like_revision: u64,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Subject {
  /// Read the authoritative value of `counter`.
  pub fn count(&self, counter: Counter) -> i64 {
    match counter {
      Counter::Views => self.view_count,
      Counter::Likes => self.like_count,
      Counter::Clicks => self.click_count,
    }
  }
}

/// Input to [`crate::store::EngagementStore::add_subject`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubject {
  pub kind:  SubjectKind,
  pub title: String,
  #[serde(default)]
  pub body:  String,
}

/// Input to [`crate::store::EngagementStore::update_subject`]. Absent fields
/// are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectUpdate {
  pub title: Option<String>,
  pub body:  Option<String>,
}

/// A user who can like subjects. Account management lives elsewhere; only the
/// identity matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub actor_id:   i64,
  pub handle:     String,
  pub created_at: DateTime<Utc>,
}

/// One of the authoritative counter columns on a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Counter {
  Views,
  Likes,
  Clicks,
}

impl Counter {
  /// The column holding this counter in the `subjects` table.
  pub fn column(self) -> &'static str {
    match self {
      Self::Views => "view_count",
      Self::Likes => "like_count",
      Self::Clicks => "click_count",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn subject_kind_string_forms_agree() {
    for kind in [SubjectKind::Post, SubjectKind::Link, SubjectKind::Playlist] {
      let text = kind.to_string();
      assert_eq!(text.parse::<SubjectKind>().unwrap(), kind);
      let json = serde_json::to_string(&kind).unwrap();
      assert_eq!(json, format!("\"{text}\""));
    }
  }

  #[test]
  fn unknown_kind_fails_to_parse() {
    assert!("comment".parse::<SubjectKind>().is_err());
  }
}
