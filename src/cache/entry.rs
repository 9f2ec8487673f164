//! Snapshot types handed out by the cache store.

use std::time::Duration;
use tokio::time::Instant;

use super::key::QueryKey;
use crate::api::NormalizedError;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
  /// Never fetched
  Idle,
  /// A fetch for this key is in flight
  Loading,
  /// Last fetch succeeded
  Success,
  /// Last fetch failed; `value` may still hold an older result
  Error,
}

/// What we currently believe a resource's value is, and how old that belief
/// is.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  pub key: QueryKey,
  pub value: Option<V>,
  /// When the value was last fetched; `None` if never, or if invalidated
  pub fetched_at: Option<Instant>,
  pub stale_after: Duration,
  pub status: CacheStatus,
  pub error: Option<NormalizedError>,
  pub subscriber_count: usize,
}

impl<V> CacheEntry<V> {
  pub fn new(key: QueryKey) -> Self {
    Self {
      stale_after: key.class().stale_after(),
      key,
      value: None,
      fetched_at: None,
      status: CacheStatus::Idle,
      error: None,
      subscriber_count: 0,
    }
  }

  /// Fresh: fetched successfully less than `stale_after` ago.
  pub fn is_fresh(&self, now: Instant) -> bool {
    self.status == CacheStatus::Success
      && self
        .fetched_at
        .is_some_and(|at| now.saturating_duration_since(at) < self.stale_after)
  }

  /// Holds a value that is past its freshness window (or was invalidated).
  pub fn is_stale(&self, now: Instant) -> bool {
    self.value.is_some() && !self.is_fresh(now)
  }

  pub fn age(&self, now: Instant) -> Option<Duration> {
    self.fetched_at.map(|at| now.saturating_duration_since(at))
  }
}

/// Change notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  /// A fetch completed and its result was applied
  Updated(QueryKey),
  /// The entry was marked stale; its value is still available
  Invalidated(QueryKey),
  /// The entry was dropped after its last subscriber left
  Evicted(QueryKey),
}

impl CacheEvent {
  pub fn key(&self) -> &QueryKey {
    match self {
      CacheEvent::Updated(key) | CacheEvent::Invalidated(key) | CacheEvent::Evicted(key) => key,
    }
  }
}
