//! In-memory store of resource snapshots.
//!
//! Stale-while-revalidate with request coalescing: every key has at most one
//! current fetch, and every caller that arrives while it runs awaits the same
//! shared future. Fetches run on their own tasks so a dropped caller never
//! cancels them. Each fetch is stamped with a store-wide generation; a result
//! is applied only if its generation is still the entry's current one.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::entry::{CacheEntry, CacheEvent, CacheStatus};
use super::key::{KeyPrefix, QueryKey};
use crate::api::{ErrorKind, NormalizedError};

pub const DEFAULT_GC_WINDOW: Duration = Duration::from_secs(5 * 60);

type FetchResult<V> = Result<V, NormalizedError>;
type SharedFetch<V> = Shared<BoxFuture<'static, FetchResult<V>>>;

struct Slot<V> {
  entry: CacheEntry<V>,
  generation: u64,
  in_flight: Option<SharedFetch<V>>,
  gc_timer: Option<JoinHandle<()>>,
}

impl<V> Slot<V> {
  fn new(key: QueryKey) -> Self {
    Self {
      entry: CacheEntry::new(key),
      generation: 0,
      in_flight: None,
      gc_timer: None,
    }
  }
}

struct StoreState<V> {
  slots: HashMap<QueryKey, Slot<V>>,
  next_generation: u64,
}

impl<V> StoreState<V> {
  fn bump_generation(&mut self) -> u64 {
    self.next_generation += 1;
    self.next_generation
  }
}

struct StoreInner<V> {
  state: Mutex<StoreState<V>>,
  events: broadcast::Sender<CacheEvent>,
  gc_window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
  /// Use the cached value if fresh, else join or start a fetch
  IfStale,
  /// Join an in-flight fetch or start one
  Revalidate,
  /// Always start a new generation
  Supersede,
}

enum Plan<V> {
  Fresh(V),
  Wait(SharedFetch<V>),
}

/// Keyed cache of resource snapshots. Clones share state.
pub struct CacheStore<V> {
  inner: Arc<StoreInner<V>>,
}

impl<V> Clone for CacheStore<V> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<V> CacheStore<V>
where
  V: Clone + Send + Sync + 'static,
{
  pub fn new(gc_window: Duration) -> Self {
    let (events, _) = broadcast::channel(256);
    Self {
      inner: Arc::new(StoreInner {
        state: Mutex::new(StoreState {
          slots: HashMap::new(),
          next_generation: 0,
        }),
        events,
        gc_window,
      }),
    }
  }

  pub fn events(&self) -> broadcast::Receiver<CacheEvent> {
    self.inner.events.subscribe()
  }

  /// Snapshot of the entry, creating an idle one if absent.
  pub fn get(&self, key: &QueryKey) -> CacheEntry<V> {
    let mut state = self.lock();
    state
      .slots
      .entry(key.clone())
      .or_insert_with(|| Slot::new(key.clone()))
      .entry
      .clone()
  }

  /// Snapshot without creating anything.
  pub fn peek(&self, key: &QueryKey) -> Option<CacheEntry<V>> {
    self.lock().slots.get(key).map(|slot| slot.entry.clone())
  }

  /// Return the value if fresh, otherwise join or start a fetch.
  ///
  /// The fresh path returns before the first await point.
  pub async fn ensure_fresh<F, Fut>(&self, key: &QueryKey, fetcher: F) -> FetchResult<V>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = FetchResult<V>> + Send + 'static,
  {
    match self.plan(key, FetchMode::IfStale, fetcher) {
      Plan::Fresh(value) => Ok(value),
      Plan::Wait(fetch) => fetch.await,
    }
  }

  /// Revalidate regardless of freshness, joining a fetch already in flight.
  pub async fn refresh<F, Fut>(&self, key: &QueryKey, fetcher: F) -> FetchResult<V>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = FetchResult<V>> + Send + 'static,
  {
    match self.plan(key, FetchMode::Revalidate, fetcher) {
      Plan::Fresh(value) => Ok(value),
      Plan::Wait(fetch) => fetch.await,
    }
  }

  /// Start a new fetch that supersedes any in flight.
  pub async fn refetch<F, Fut>(&self, key: &QueryKey, fetcher: F) -> FetchResult<V>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = FetchResult<V>> + Send + 'static,
  {
    match self.plan(key, FetchMode::Supersede, fetcher) {
      Plan::Fresh(value) => Ok(value),
      Plan::Wait(fetch) => fetch.await,
    }
  }

  /// Warm the entry in the background if it is not fresh.
  pub fn prefetch<F, Fut>(&self, key: &QueryKey, fetcher: F)
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = FetchResult<V>> + Send + 'static,
  {
    if let Plan::Wait(fetch) = self.plan(key, FetchMode::IfStale, fetcher) {
      debug!(key = %key, "prefetching");
      tokio::spawn(fetch);
    }
  }

  /// Store a value directly with a fresh timestamp.
  pub fn set(&self, key: &QueryKey, value: V) {
    let mut state = self.lock();
    let generation = state.bump_generation();
    let slot = state
      .slots
      .entry(key.clone())
      .or_insert_with(|| Slot::new(key.clone()));

    slot.generation = generation;
    slot.in_flight = None;
    slot.entry.value = Some(value);
    slot.entry.fetched_at = Some(Instant::now());
    slot.entry.status = CacheStatus::Success;
    slot.entry.error = None;
    drop(state);

    self.emit(CacheEvent::Updated(key.clone()));
  }

  /// Mark the entry stale. The value and status are kept so it can still be
  /// rendered while a refetch runs.
  pub fn invalidate(&self, key: &QueryKey) {
    let hit = match self.lock().slots.get_mut(key) {
      Some(slot) => {
        slot.entry.fetched_at = None;
        true
      }
      None => false,
    };

    if hit {
      debug!(key = %key, "invalidated");
      self.emit(CacheEvent::Invalidated(key.clone()));
    }
  }

  /// Invalidate every entry whose key starts with `prefix`.
  pub fn invalidate_prefix(&self, prefix: &KeyPrefix) -> usize {
    let keys: Vec<QueryKey> = self
      .lock()
      .slots
      .keys()
      .filter(|key| key.matches(prefix))
      .cloned()
      .collect();

    for key in &keys {
      self.invalidate(key);
    }
    keys.len()
  }

  pub fn subscribe(&self, key: &QueryKey) {
    let mut state = self.lock();
    let slot = state
      .slots
      .entry(key.clone())
      .or_insert_with(|| Slot::new(key.clone()));

    slot.entry.subscriber_count += 1;
    if let Some(timer) = slot.gc_timer.take() {
      timer.abort();
    }
  }

  /// Drop one subscriber. The last one out arms the GC timer; unsubscribing
  /// an entry with no subscribers is a no-op.
  pub fn unsubscribe(&self, key: &QueryKey) {
    let mut state = self.lock();
    let Some(slot) = state.slots.get_mut(key) else {
      warn!(key = %key, "unsubscribe for unknown key");
      return;
    };

    if slot.entry.subscriber_count == 0 {
      warn!(key = %key, "unsubscribe with no subscribers");
      return;
    }

    slot.entry.subscriber_count -= 1;
    if slot.entry.subscriber_count == 0 {
      self.arm_gc(key, slot);
    }
  }

  fn plan<F, Fut>(&self, key: &QueryKey, mode: FetchMode, fetcher: F) -> Plan<V>
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = FetchResult<V>> + Send + 'static,
  {
    let now = Instant::now();
    let mut state = self.lock();
    let generation = state.next_generation + 1;
    let slot = state
      .slots
      .entry(key.clone())
      .or_insert_with(|| Slot::new(key.clone()));

    if mode == FetchMode::IfStale && slot.entry.is_fresh(now) {
      if let Some(value) = &slot.entry.value {
        return Plan::Fresh(value.clone());
      }
    }

    if mode != FetchMode::Supersede {
      if let Some(fetch) = &slot.in_flight {
        debug!(key = %key, "joining in-flight fetch");
        return Plan::Wait(fetch.clone());
      }
    }

    slot.generation = generation;
    slot.entry.status = CacheStatus::Loading;

    let store = self.clone();
    let task_key = key.clone();
    let handle = tokio::spawn(async move {
      let result = fetcher().await;
      store.complete(&task_key, generation, result.clone());
      result
    });

    let fetch = async move {
      handle.await.unwrap_or_else(|err| {
        Err(NormalizedError::new(
          ErrorKind::Unknown("FETCH_ABORTED".to_string()),
          err.to_string(),
        ))
      })
    }
    .boxed()
    .shared();

    slot.in_flight = Some(fetch.clone());
    state.next_generation = generation;
    debug!(key = %key, generation, ?mode, "fetch started");

    Plan::Wait(fetch)
  }

  fn complete(&self, key: &QueryKey, generation: u64, result: FetchResult<V>) {
    let mut state = self.lock();
    let Some(slot) = state.slots.get_mut(key) else {
      debug!(key = %key, generation, "entry evicted, result discarded");
      return;
    };

    if slot.generation != generation {
      debug!(
        key = %key,
        generation,
        current = slot.generation,
        "superseded result discarded"
      );
      return;
    }

    slot.in_flight = None;
    match result {
      Ok(value) => {
        slot.entry.value = Some(value);
        slot.entry.fetched_at = Some(Instant::now());
        slot.entry.status = CacheStatus::Success;
        slot.entry.error = None;
      }
      Err(err) => {
        debug!(key = %key, error = %err, "fetch failed, keeping previous value");
        slot.entry.status = CacheStatus::Error;
        slot.entry.error = Some(err);
      }
    }

    if slot.entry.subscriber_count == 0 && slot.gc_timer.is_none() {
      self.arm_gc(key, slot);
    }
    drop(state);

    self.emit(CacheEvent::Updated(key.clone()));
  }

  fn arm_gc(&self, key: &QueryKey, slot: &mut Slot<V>) {
    let store = self.clone();
    let gc_key = key.clone();
    let window = self.inner.gc_window;
    let timer = tokio::spawn(async move {
      tokio::time::sleep(window).await;
      store.collect(&gc_key);
    });

    if let Some(previous) = slot.gc_timer.replace(timer) {
      previous.abort();
    }
  }

  fn collect(&self, key: &QueryKey) {
    let evicted = {
      let mut state = self.lock();
      match state.slots.get(key) {
        Some(slot) if slot.entry.subscriber_count == 0 => {
          state.slots.remove(key);
          true
        }
        _ => false,
      }
    };

    if evicted {
      debug!(key = %key, "evicted");
      self.emit(CacheEvent::Evicted(key.clone()));
    }
  }

  fn emit(&self, event: CacheEvent) {
    // No receivers is fine.
    let _ = self.inner.events.send(event);
  }

  fn lock(&self) -> MutexGuard<'_, StoreState<V>> {
    self
      .inner
      .state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::ResourceClass;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn key(namespace: &str) -> QueryKey {
    QueryKey::new(ResourceClass::Standard, namespace)
  }

  fn counting(
    calls: &Arc<AtomicUsize>,
    delay: Duration,
    value: &str,
  ) -> impl FnOnce() -> BoxFuture<'static, FetchResult<String>> + Send + 'static {
    let calls = calls.clone();
    let value = value.to_string();
    move || {
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        Ok(value)
      }
      .boxed()
    }
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_callers_share_one_fetch() {
    let store = CacheStore::<String>::new(DEFAULT_GC_WINDOW);
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("articles");

    let (a, b, c) = tokio::join!(
      store.ensure_fresh(&k, counting(&calls, Duration::from_millis(100), "v")),
      store.ensure_fresh(&k, counting(&calls, Duration::from_millis(100), "v")),
      store.ensure_fresh(&k, counting(&calls, Duration::from_millis(100), "v")),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap(), "v");
    assert_eq!(b.unwrap(), "v");
    assert_eq!(c.unwrap(), "v");
    assert_eq!(store.get(&k).status, CacheStatus::Success);
  }

  #[tokio::test(start_paused = true)]
  async fn test_fresh_entry_skips_network() {
    let store = CacheStore::<String>::new(DEFAULT_GC_WINDOW);
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("sentiment");

    store
      .ensure_fresh(&k, counting(&calls, Duration::ZERO, "one"))
      .await
      .unwrap();

    tokio::time::advance(Duration::from_secs(60)).await;
    let value = store
      .ensure_fresh(&k, counting(&calls, Duration::ZERO, "two"))
      .await
      .unwrap();
    assert_eq!(value, "one");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(ResourceClass::Standard.stale_after()).await;
    assert!(store.get(&k).is_stale(Instant::now()));
    let value = store
      .ensure_fresh(&k, counting(&calls, Duration::ZERO, "two"))
      .await
      .unwrap();
    assert_eq!(value, "two");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_failure_keeps_previous_value() {
    let store = CacheStore::<String>::new(DEFAULT_GC_WINDOW);
    let k = key("health");
    store.set(&k, "old".to_string());

    let result = store
      .refresh(&k, || async { Err(NormalizedError::network("connection refused")) })
      .await;
    assert!(result.is_err());

    let entry = store.get(&k);
    assert_eq!(entry.status, CacheStatus::Error);
    assert_eq!(entry.value.as_deref(), Some("old"));
    assert_eq!(entry.error.map(|e| e.kind), Some(ErrorKind::Network));
  }

  #[tokio::test(start_paused = true)]
  async fn test_slow_superseded_response_is_discarded() {
    let store = CacheStore::<String>::new(DEFAULT_GC_WINDOW);
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("articles");

    let slow = {
      let store = store.clone();
      let k = k.clone();
      let fetch = counting(&calls, Duration::from_millis(200), "a");
      tokio::spawn(async move { store.refetch(&k, fetch).await })
    };
    tokio::task::yield_now().await;

    let fast = store
      .refetch(&k, counting(&calls, Duration::from_millis(50), "b"))
      .await
      .unwrap();
    assert_eq!(fast, "b");

    // The slow caller still gets its own result back.
    assert_eq!(slow.await.unwrap().unwrap(), "a");
    assert_eq!(store.get(&k).value.as_deref(), Some("b"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_set_discards_older_in_flight_result() {
    let store = CacheStore::<String>::new(DEFAULT_GC_WINDOW);
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("quote");

    let pending = {
      let store = store.clone();
      let k = k.clone();
      let fetch = counting(&calls, Duration::from_millis(100), "fetched");
      tokio::spawn(async move { store.refresh(&k, fetch).await })
    };
    tokio::task::yield_now().await;

    store.set(&k, "manual".to_string());
    pending.await.unwrap().unwrap();

    assert_eq!(store.get(&k).value.as_deref(), Some("manual"));
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidate_keeps_value() {
    let store = CacheStore::<String>::new(DEFAULT_GC_WINDOW);
    let mut events = store.events();
    let k = key("sources");
    store.set(&k, "v".to_string());
    assert_eq!(events.recv().await.unwrap(), CacheEvent::Updated(k.clone()));

    store.invalidate(&k);
    assert_eq!(events.recv().await.unwrap(), CacheEvent::Invalidated(k.clone()));

    let entry = store.get(&k);
    assert_eq!(entry.value.as_deref(), Some("v"));
    assert_eq!(entry.status, CacheStatus::Success);
    assert_eq!(entry.fetched_at, None);
    assert!(entry.is_stale(Instant::now()));
  }

  #[tokio::test(start_paused = true)]
  async fn test_invalidate_prefix_matches_whole_segments() {
    let store = CacheStore::<String>::new(DEFAULT_GC_WINDOW);
    let list = key("articles").with_segment("limit=20");
    let detail = QueryKey::new(ResourceClass::Static, "articles").with_segment("7");
    let other = key("articles_archive");
    for k in [&list, &detail, &other] {
      store.set(k, "v".to_string());
    }

    assert_eq!(store.invalidate_prefix(&KeyPrefix::new("articles")), 2);
    assert_eq!(store.get(&list).fetched_at, None);
    assert_eq!(store.get(&detail).fetched_at, None);
    assert!(store.get(&other).fetched_at.is_some());
  }

  #[tokio::test(start_paused = true)]
  async fn test_gc_evicts_after_last_unsubscribe() {
    let store = CacheStore::<String>::new(Duration::from_secs(60));
    let mut events = store.events();
    let k = key("scraper");

    store.subscribe(&k);
    store.set(&k, "v".to_string());
    let _ = events.recv().await;

    store.unsubscribe(&k);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(store.peek(&k).is_some());

    // Resubscribing disarms the timer.
    store.subscribe(&k);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(store.peek(&k).is_some());

    store.unsubscribe(&k);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(store.peek(&k).is_none());
    assert_eq!(events.recv().await.unwrap(), CacheEvent::Evicted(k));
  }

  #[tokio::test(start_paused = true)]
  async fn test_unsubscribe_at_zero_is_noop() {
    let store = CacheStore::<String>::new(DEFAULT_GC_WINDOW);
    let k = key("health");

    store.subscribe(&k);
    store.unsubscribe(&k);
    store.unsubscribe(&k);
    assert_eq!(store.get(&k).subscriber_count, 0);

    store.subscribe(&k);
    assert_eq!(store.get(&k).subscriber_count, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_eviction_does_not_cancel_fetch() {
    let store = CacheStore::<String>::new(Duration::from_secs(1));
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("articles");

    store.subscribe(&k);
    let pending = {
      let store = store.clone();
      let k = k.clone();
      let fetch = counting(&calls, Duration::from_secs(5), "late");
      tokio::spawn(async move { store.refresh(&k, fetch).await })
    };
    tokio::task::yield_now().await;

    store.unsubscribe(&k);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(store.peek(&k).is_none());

    assert_eq!(pending.await.unwrap().unwrap(), "late");
    assert!(store.peek(&k).is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_loading_status_while_in_flight() {
    let store = CacheStore::<String>::new(DEFAULT_GC_WINDOW);
    let calls = Arc::new(AtomicUsize::new(0));
    let k = key("articles");

    store.prefetch(&k, counting(&calls, Duration::from_millis(100), "v"));
    assert_eq!(store.get(&k).status, CacheStatus::Loading);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(store.get(&k).status, CacheStatus::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }
}
