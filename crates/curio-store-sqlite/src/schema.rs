//! SQL schema for the Curio SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Counter columns are written only by increments, folds and recounts.
CREATE TABLE IF NOT EXISTS subjects (
    subject_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    kind          TEXT    NOT NULL,   -- 'post' | 'link' | 'playlist'
    title         TEXT    NOT NULL CHECK (length(trim(title)) > 0),
    body          TEXT    NOT NULL DEFAULT '',
    view_count    INTEGER NOT NULL DEFAULT 0 CHECK (view_count  >= 0),
    like_count    INTEGER NOT NULL DEFAULT 0 CHECK (like_count  >= 0),
    click_count   INTEGER NOT NULL DEFAULT 0 CHECK (click_count >= 0),
    like_revision INTEGER NOT NULL DEFAULT 0,  -- cache revision of last fold
    created_at    TEXT    NOT NULL,
    updated_at    TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS actors (
    actor_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    handle     TEXT    NOT NULL UNIQUE,
    created_at TEXT    NOT NULL
);

-- One row per (subject, actor) pair that is currently liked.
CREATE TABLE IF NOT EXISTS like_edges (
    subject_id INTEGER NOT NULL REFERENCES subjects(subject_id) ON DELETE CASCADE,
    actor_id   INTEGER NOT NULL REFERENCES actors(actor_id)     ON DELETE CASCADE,
    created_at TEXT    NOT NULL,
    PRIMARY KEY (subject_id, actor_id)
);

-- Local index of uploaded images. No foreign key: rows must outlive a
-- deleted subject until the post-commit cleanup removes them.
CREATE TABLE IF NOT EXISTS images (
    name       TEXT    PRIMARY KEY,
    subject_id INTEGER NOT NULL,
    created_at TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS images_subject_idx ON images(subject_id);

PRAGMA user_version = 1;
";
