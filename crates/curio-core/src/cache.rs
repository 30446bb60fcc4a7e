//! The `CounterCache` trait: the shared, remote-style key-value store that
//! holds dedup markers and fast like counters.
//!
//! Every mutating operation is a single atomic primitive. Callers never read
//! a value, change it, and write it back.

use std::{future::Future, time::Duration};

use thiserror::Error;

use crate::engagement::Adjusted;

#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache backend unavailable: {0}")]
  Unavailable(String),

  #[error("key {key:?} does not hold a counter")]
  WrongType { key: String },
}

/// Abstraction over the counter cache backend.
///
/// A networked implementation maps these onto `SET key 1 NX PX ttl` and a
/// transactional pair of `HINCRBY`s (value and revision).
pub trait CounterCache: Send + Sync {
  /// Atomically set `key` with expiry `ttl` if it is absent.
  ///
  /// Returns `true` when this call created the key. An existing key is left
  /// untouched, including its remaining TTL.
  fn set_if_absent<'a>(
    &'a self,
    key: &'a str,
    ttl: Duration,
  ) -> impl Future<Output = Result<bool, CacheError>> + Send + 'a;

  /// Atomically initialise a counter to `value` at `revision` if it is
  /// absent. Returns `true` when this call created it.
  fn seed<'a>(
    &'a self,
    key: &'a str,
    value: i64,
    revision: u64,
  ) -> impl Future<Output = Result<bool, CacheError>> + Send + 'a;

  /// Atomically add `delta` (which may be negative) and return the
  /// post-adjustment value. An absent counter starts at zero. No clamping.
  fn adjust<'a>(
    &'a self,
    key: &'a str,
    delta: i64,
  ) -> impl Future<Output = Result<Adjusted, CacheError>> + Send + 'a;

  /// Overwrite a counter with `value` at a revision greater than both its
  /// current revision and `floor`. Only used by resynchronisation against
  /// the relational store, which passes its own revision as `floor`.
  fn reset<'a>(
    &'a self,
    key: &'a str,
    value: i64,
    floor: u64,
  ) -> impl Future<Output = Result<Adjusted, CacheError>> + Send + 'a;

  /// Non-authoritative read for display and diagnostics.
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Adjusted>, CacheError>> + Send + 'a;
}
