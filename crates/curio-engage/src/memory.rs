//! [`MemoryCache`], an in-process [`CounterCache`] on a sharded concurrent
//! map.
//!
//! Every operation runs under the shard lock of its key via the `entry` API,
//! which gives the same atomicity a remote cache provides with `SET NX` and
//! `INCRBY`. Expired dedup markers are treated as absent and are purged
//! lazily or by [`MemoryCache::purge_expired`].

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use curio_core::{
  cache::{CacheError, CounterCache},
  engagement::Adjusted,
};
use dashmap::{DashMap, mapref::entry::Entry as MapEntry};

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy)]
enum Entry {
  Marker { expires_at: Instant },
  Counter(Adjusted),
}

pub struct MemoryCache {
  entries: DashMap<String, Entry>,
  clock:   Arc<dyn Clock>,
}

impl MemoryCache {
  pub fn new() -> Self { Self::with_clock(Arc::new(SystemClock)) }

  pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
    Self { entries: DashMap::new(), clock }
  }

  /// Drop every expired marker. Returns how many were removed.
  pub fn purge_expired(&self) -> usize {
    let now = self.clock.now();
    let before = self.entries.len();
    self.entries.retain(|_, entry| match entry {
      Entry::Marker { expires_at } => *expires_at > now,
      Entry::Counter(_) => true,
    });
    before.saturating_sub(self.entries.len())
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  fn wrong_type(key: &str) -> CacheError {
    CacheError::WrongType { key: key.to_owned() }
  }
}

impl Default for MemoryCache {
  fn default() -> Self { Self::new() }
}

impl CounterCache for MemoryCache {
  async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
    let now = self.clock.now();
    let marker = Entry::Marker { expires_at: now + ttl };

    match self.entries.entry(key.to_owned()) {
      MapEntry::Vacant(slot) => {
        slot.insert(marker);
        Ok(true)
      }
      MapEntry::Occupied(mut slot) => match *slot.get() {
        Entry::Marker { expires_at } if expires_at <= now => {
          slot.insert(marker);
          Ok(true)
        }
        _ => Ok(false),
      },
    }
  }

  async fn seed(&self, key: &str, value: i64, revision: u64) -> Result<bool, CacheError> {
    match self.entries.entry(key.to_owned()) {
      MapEntry::Vacant(slot) => {
        slot.insert(Entry::Counter(Adjusted { value, revision }));
        Ok(true)
      }
      MapEntry::Occupied(slot) => match slot.get() {
        Entry::Counter(_) => Ok(false),
        Entry::Marker { .. } => Err(Self::wrong_type(key)),
      },
    }
  }

  async fn adjust(&self, key: &str, delta: i64) -> Result<Adjusted, CacheError> {
    let mut slot = self
      .entries
      .entry(key.to_owned())
      .or_insert(Entry::Counter(Adjusted { value: 0, revision: 0 }));

    match slot.value_mut() {
      Entry::Counter(counter) => {
        counter.value += delta;
        counter.revision += 1;
        Ok(*counter)
      }
      Entry::Marker { .. } => Err(Self::wrong_type(key)),
    }
  }

  async fn reset(&self, key: &str, value: i64, floor: u64) -> Result<Adjusted, CacheError> {
    let mut slot = self
      .entries
      .entry(key.to_owned())
      .or_insert(Entry::Counter(Adjusted { value, revision: 0 }));

    match slot.value_mut() {
      Entry::Counter(counter) => {
        counter.value = value;
        counter.revision = counter.revision.max(floor) + 1;
        Ok(*counter)
      }
      Entry::Marker { .. } => Err(Self::wrong_type(key)),
    }
  }

  async fn get(&self, key: &str) -> Result<Option<Adjusted>, CacheError> {
    match self.entries.get(key).map(|entry| *entry.value()) {
      None => Ok(None),
      Some(Entry::Counter(counter)) => Ok(Some(counter)),
      Some(Entry::Marker { .. }) => Err(Self::wrong_type(key)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;

  const TTL: Duration = Duration::from_secs(600);

  fn cache() -> (Arc<ManualClock>, MemoryCache) {
    let clock = Arc::new(ManualClock::new());
    let cache = MemoryCache::with_clock(clock.clone());
    (clock, cache)
  }

  #[tokio::test]
  async fn set_if_absent_only_succeeds_once_per_window() {
    let (clock, cache) = cache();
    assert!(cache.set_if_absent("k", TTL).await.unwrap());
    assert!(!cache.set_if_absent("k", TTL).await.unwrap());

    clock.advance(Duration::from_secs(599));
    assert!(!cache.set_if_absent("k", TTL).await.unwrap());

    clock.advance(Duration::from_secs(1));
    assert!(cache.set_if_absent("k", TTL).await.unwrap());
  }

  #[tokio::test]
  async fn failed_set_does_not_extend_ttl() {
    let (clock, cache) = cache();
    assert!(cache.set_if_absent("k", TTL).await.unwrap());
    clock.advance(Duration::from_secs(300));
    assert!(!cache.set_if_absent("k", TTL).await.unwrap());
    // Expires at the original 600 s mark, not 900 s.
    clock.advance(Duration::from_secs(300));
    assert!(cache.set_if_absent("k", TTL).await.unwrap());
  }

  #[tokio::test]
  async fn adjust_starts_at_zero_and_bumps_revision() {
    let (_, cache) = cache();
    assert_eq!(cache.get("c").await.unwrap(), None);
    assert_eq!(
      cache.adjust("c", 1).await.unwrap(),
      Adjusted { value: 1, revision: 1 }
    );
    assert_eq!(
      cache.adjust("c", -3).await.unwrap(),
      Adjusted { value: -2, revision: 2 }
    );
    assert_eq!(
      cache.get("c").await.unwrap(),
      Some(Adjusted { value: -2, revision: 2 })
    );
  }

  #[tokio::test]
  async fn seed_only_initialises_absent_counters() {
    let (_, cache) = cache();
    assert!(cache.seed("c", 10, 7).await.unwrap());
    assert!(!cache.seed("c", 99, 99).await.unwrap());
    assert_eq!(
      cache.adjust("c", 1).await.unwrap(),
      Adjusted { value: 11, revision: 8 }
    );
  }

  #[tokio::test]
  async fn reset_overwrites_value_with_new_revision() {
    let (_, cache) = cache();
    cache.adjust("c", 5).await.unwrap();
    assert_eq!(
      cache.reset("c", 2, 0).await.unwrap(),
      Adjusted { value: 2, revision: 2 }
    );
  }

  #[tokio::test]
  async fn reset_jumps_past_the_floor_revision() {
    let (_, cache) = cache();
    cache.adjust("c", 1).await.unwrap();
    assert_eq!(
      cache.reset("c", 4, 9).await.unwrap(),
      Adjusted { value: 4, revision: 10 }
    );
    assert_eq!(
      cache.reset("fresh", 3, 5).await.unwrap(),
      Adjusted { value: 3, revision: 6 }
    );
  }

  #[tokio::test]
  async fn markers_and_counters_do_not_mix() {
    let (_, cache) = cache();
    cache.set_if_absent("m", TTL).await.unwrap();
    assert!(matches!(
      cache.adjust("m", 1).await,
      Err(CacheError::WrongType { .. })
    ));
    assert!(matches!(cache.get("m").await, Err(CacheError::WrongType { .. })));
  }

  #[tokio::test]
  async fn concurrent_adjustments_are_not_lost() {
    let cache = Arc::new(MemoryCache::new());
    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..64 {
      let cache = cache.clone();
      tasks.spawn(async move {
        for _ in 0..50 {
          cache.adjust("hot", 1).await.unwrap();
        }
      });
    }
    while let Some(res) = tasks.join_next().await {
      res.unwrap();
    }
    let value = cache.get("hot").await.unwrap().unwrap();
    assert_eq!(value.value, 64 * 50);
    assert_eq!(value.revision, 64 * 50);
  }

  #[tokio::test]
  async fn purge_drops_only_expired_markers() {
    let (clock, cache) = cache();
    cache.set_if_absent("old", Duration::from_secs(10)).await.unwrap();
    cache.set_if_absent("new", TTL).await.unwrap();
    cache.adjust("counter", 1).await.unwrap();

    clock.advance(Duration::from_secs(11));
    assert_eq!(cache.purge_expired(), 1);
    assert_eq!(cache.len(), 2);
  }
}
