//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings. Revisions are unsigned in Rust
//! and `INTEGER` in SQLite.

use chrono::{DateTime, Utc};
use curio_core::{
  lifecycle::ImageRef,
  subject::{Actor, Subject, SubjectKind},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── SubjectKind ─────────────────────────────────────────────────────────────

pub fn encode_subject_kind(k: SubjectKind) -> &'static str {
  match k {
    SubjectKind::Post => "post",
    SubjectKind::Link => "link",
    SubjectKind::Playlist => "playlist",
  }
}

pub fn decode_subject_kind(s: &str) -> Result<SubjectKind> {
  s.parse::<SubjectKind>()
    .map_err(|_| curio_core::Error::UnknownSubjectKind(s.to_owned()).into())
}

// ─── Revision ────────────────────────────────────────────────────────────────

pub fn encode_revision(rev: u64) -> i64 { i64::try_from(rev).unwrap_or(i64::MAX) }

pub fn decode_revision(raw: i64) -> u64 { u64::try_from(raw).unwrap_or(0) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SUBJECT_COLUMNS: &str = "subject_id, kind, title, body, view_count, \
   like_count, click_count, like_revision, created_at, updated_at";

/// Raw values read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:    i64,
  pub kind:          String,
  pub title:         String,
  pub body:          String,
  pub view_count:    i64,
  pub like_count:    i64,
  pub click_count:   i64,
  pub like_revision: i64,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawSubject {
  /// Map a row selected with [`SUBJECT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:    row.get(0)?,
      kind:          row.get(1)?,
      title:         row.get(2)?,
      body:          row.get(3)?,
      view_count:    row.get(4)?,
      like_count:    row.get(5)?,
      click_count:   row.get(6)?,
      like_revision: row.get(7)?,
      created_at:    row.get(8)?,
      updated_at:    row.get(9)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:    self.subject_id,
      kind:          decode_subject_kind(&self.kind)?,
      title:         self.title,
      body:          self.body,
      view_count:    self.view_count,
      like_count:    self.like_count,
      click_count:   self.click_count,
      like_revision: decode_revision(self.like_revision),
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from an `actors` row.
pub struct RawActor {
  pub actor_id:   i64,
  pub handle:     String,
  pub created_at: String,
}

impl RawActor {
  pub fn into_actor(self) -> Result<Actor> {
    Ok(Actor {
      actor_id:   self.actor_id,
      handle:     self.handle,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `images` row.
pub struct RawImage {
  pub name:       String,
  pub subject_id: i64,
  pub created_at: String,
}

impl RawImage {
  pub fn into_image(self) -> Result<ImageRef> {
    Ok(ImageRef {
      name:       self.name,
      subject_id: self.subject_id,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
