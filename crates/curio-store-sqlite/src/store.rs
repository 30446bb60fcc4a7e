//! [`SqliteStore`] — the SQLite implementation of [`EngagementStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use curio_core::{
  engagement::FoldOutcome,
  lifecycle::{Committed, ImageRef, LifecycleEvent, Outbox},
  refs::image_refs,
  store::EngagementStore,
  subject::{Actor, Counter, NewSubject, Subject, SubjectUpdate},
};

use crate::{
  Error,
  Result,
  encode::{
    RawActor, RawImage, RawSubject, SUBJECT_COLUMNS, encode_dt, encode_revision,
    encode_subject_kind,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An engagement store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// are serialised on the connection's thread, so each closure passed to
/// `call` observes and commits a consistent state.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn fetch_subject(&self, id: i64) -> Result<Option<RawSubject>> {
    let sql = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1");
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id], RawSubject::from_row)
            .optional()?,
        )
      })
      .await?;
    Ok(raw)
  }
}

// ─── EngagementStore impl ────────────────────────────────────────────────────

impl EngagementStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn add_subject(&self, input: NewSubject) -> Result<Subject> {
    let now      = Utc::now();
    let at_str   = encode_dt(now);
    let kind_str = encode_subject_kind(input.kind).to_owned();
    let title    = input.title.clone();
    let body     = input.body.clone();

    let subject_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (kind, title, body, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?4)",
          rusqlite::params![kind_str, title, body, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    tracing::debug!(subject_id, kind = %input.kind, "subject created");

    Ok(Subject {
      subject_id,
      kind: input.kind,
      title: input.title,
      body: input.body,
      view_count: 0,
      like_count: 0,
      click_count: 0,
      like_revision: 0,
      created_at: now,
      updated_at: now,
    })
  }

  async fn get_subject(&self, id: i64) -> Result<Option<Subject>> {
    self.fetch_subject(id).await?.map(RawSubject::into_subject).transpose()
  }

  async fn list_subject_ids(&self) -> Result<Vec<i64>> {
    let ids = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT subject_id FROM subjects ORDER BY subject_id")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(ids)
  }

  async fn update_subject(
    &self,
    id:     i64,
    update: SubjectUpdate,
  ) -> Result<Committed<Subject>> {
    let now_str = encode_dt(Utc::now());
    let sql     = format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1");

    let committed: Option<(RawSubject, Outbox)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(mut raw) = tx
          .query_row(&sql, rusqlite::params![id], RawSubject::from_row)
          .optional()?
        else {
          return Ok(None);
        };

        if let Some(title) = update.title {
          raw.title = title;
        }
        if let Some(body) = update.body {
          raw.body = body;
        }
        raw.updated_at = now_str;

        let mut outbox = Outbox::new();
        outbox.publish(LifecycleEvent::updated(id, image_refs(&raw.body)));

        // Dropping `tx` on an early return rolls back, and the outbox with it.
        tx.execute(
          "UPDATE subjects SET title = ?2, body = ?3, updated_at = ?4
           WHERE subject_id = ?1",
          rusqlite::params![id, raw.title, raw.body, raw.updated_at],
        )?;
        tx.commit()?;
        Ok(Some((raw, outbox)))
      })
      .await?;

    let (raw, outbox) = committed.ok_or(Error::SubjectNotFound(id))?;
    Ok(outbox.seal(raw.into_subject()?))
  }

  async fn delete_subject(&self, id: i64) -> Result<Committed<()>> {
    let outbox: Option<Outbox> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
          "DELETE FROM like_edges WHERE subject_id = ?1",
          rusqlite::params![id],
        )?;
        let removed = tx.execute(
          "DELETE FROM subjects WHERE subject_id = ?1",
          rusqlite::params![id],
        )?;
        if removed == 0 {
          return Ok(None);
        }

        let mut outbox = Outbox::new();
        outbox.publish(LifecycleEvent::deleted(id));

        tx.commit()?;
        Ok(Some(outbox))
      })
      .await?;

    let outbox = outbox.ok_or(Error::SubjectNotFound(id))?;
    tracing::debug!(subject_id = id, "subject deleted");
    Ok(outbox.seal(()))
  }

  // ── Actors ────────────────────────────────────────────────────────────────

  async fn add_actor(&self, handle: String) -> Result<Actor> {
    let now    = Utc::now();
    let at_str = encode_dt(now);
    let name   = handle.clone();

    let actor_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO actors (handle, created_at) VALUES (?1, ?2)",
          rusqlite::params![name, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Actor { actor_id, handle, created_at: now })
  }

  async fn get_actor(&self, id: i64) -> Result<Option<Actor>> {
    let raw: Option<RawActor> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT actor_id, handle, created_at FROM actors WHERE actor_id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(RawActor {
                  actor_id:   row.get(0)?,
                  handle:     row.get(1)?,
                  created_at: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawActor::into_actor).transpose()
  }

  // ── Like edges ────────────────────────────────────────────────────────────

  async fn toggle_like_edge(&self, subject_id: i64, actor_id: i64) -> Result<bool> {
    let at_str = encode_dt(Utc::now());

    let liked = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Existence is observed and flipped in one statement pair under the
        // same write lock; the caller derives the cache delta from it.
        let removed = tx.execute(
          "DELETE FROM like_edges WHERE subject_id = ?1 AND actor_id = ?2",
          rusqlite::params![subject_id, actor_id],
        )?;
        let liked = if removed == 0 {
          tx.execute(
            "INSERT INTO like_edges (subject_id, actor_id, created_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![subject_id, actor_id, at_str],
          )?;
          true
        } else {
          false
        };

        tx.commit()?;
        Ok(liked)
      })
      .await?;

    Ok(liked)
  }

  async fn like_edge_exists(&self, subject_id: i64, actor_id: i64) -> Result<bool> {
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM like_edges WHERE subject_id = ?1 AND actor_id = ?2",
              rusqlite::params![subject_id, actor_id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn count_like_edges(&self, subject_id: i64) -> Result<i64> {
    let count = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM like_edges WHERE subject_id = ?1",
          rusqlite::params![subject_id],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(count)
  }

  // ── Counters ──────────────────────────────────────────────────────────────

  async fn increment_counter(&self, subject_id: i64, counter: Counter) -> Result<i64> {
    let column = counter.column();
    let sql = format!(
      "UPDATE subjects SET {column} = {column} + 1
       WHERE subject_id = ?1
       RETURNING {column}"
    );

    let value: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = tx
          .query_row(&sql, rusqlite::params![subject_id], |row| row.get(0))
          .optional()?;
        tx.commit()?;
        Ok(value)
      })
      .await?;

    value.ok_or(Error::SubjectNotFound(subject_id))
  }

  async fn fold_like_count(
    &self,
    subject_id: i64,
    value:      i64,
    revision:   u64,
  ) -> Result<FoldOutcome> {
    let rev = encode_revision(revision);

    let outcome: Option<(usize, i64)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let applied = tx.execute(
          "UPDATE subjects SET like_count = ?2, like_revision = ?3
           WHERE subject_id = ?1 AND like_revision < ?3",
          rusqlite::params![subject_id, value, rev],
        )?;
        let stored: Option<i64> = tx
          .query_row(
            "SELECT like_count FROM subjects WHERE subject_id = ?1",
            rusqlite::params![subject_id],
            |row| row.get(0),
          )
          .optional()?;
        tx.commit()?;
        Ok(stored.map(|stored| (applied, stored)))
      })
      .await?;

    match outcome {
      None => Err(Error::SubjectNotFound(subject_id)),
      Some((0, stored)) => Ok(FoldOutcome::Stale { stored }),
      Some((_, stored)) => Ok(FoldOutcome::Applied { stored }),
    }
  }

  async fn recount_likes(&self, subject_id: i64) -> Result<i64> {
    let value: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = tx
          .query_row(
            "UPDATE subjects
             SET like_count    = (SELECT COUNT(*) FROM like_edges WHERE subject_id = ?1),
                 like_revision = like_revision + 1
             WHERE subject_id = ?1
             RETURNING like_count",
            rusqlite::params![subject_id],
            |row| row.get(0),
          )
          .optional()?;
        tx.commit()?;
        Ok(value)
      })
      .await?;

    value.ok_or(Error::SubjectNotFound(subject_id))
  }

  // ── Image index ───────────────────────────────────────────────────────────

  async fn register_image(&self, subject_id: i64, name: String) -> Result<Option<ImageRef>> {
    let now      = Utc::now();
    let at_str   = encode_dt(now);
    let name_arg = name.clone();

    let inserted: Option<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM subjects WHERE subject_id = ?1",
            rusqlite::params![subject_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }
        let inserted = tx.execute(
          "INSERT INTO images (name, subject_id, created_at) VALUES (?1, ?2, ?3)
           ON CONFLICT (name) DO NOTHING",
          rusqlite::params![name_arg, subject_id, at_str],
        )?;
        tx.commit()?;
        Ok(Some(inserted))
      })
      .await?;

    match inserted {
      None => Err(Error::SubjectNotFound(subject_id)),
      Some(0) => {
        tracing::debug!(subject_id, image = %name, "image already indexed");
        Ok(None)
      }
      Some(_) => Ok(Some(ImageRef { name, subject_id, created_at: now })),
    }
  }

  async fn images_for_subject(&self, subject_id: i64) -> Result<Vec<ImageRef>> {
    let raws: Vec<RawImage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT name, subject_id, created_at FROM images
           WHERE subject_id = ?1 ORDER BY name",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject_id], |row| {
            Ok(RawImage {
              name:       row.get(0)?,
              subject_id: row.get(1)?,
              created_at: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawImage::into_image).collect()
  }

  async fn remove_image(&self, name: &str) -> Result<bool> {
    let name = name.to_owned();
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM images WHERE name = ?1", rusqlite::params![name])?)
      })
      .await?;
    Ok(removed > 0)
  }
}
