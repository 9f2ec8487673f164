//! Adaptive polling for subscribed resources.
//!
//! Each polled key gets one subscription with its own timer. The delay until
//! the next poll is recomputed after every attempt:
//!
//! ```text
//! delay = min(base(class) × 2^failures, max_interval)
//!         × (hidden ? hidden_multiplier : 1)
//!         or no poll at all while offline
//! ```
//!
//! Rate limiting defers `Normal` subscriptions to the quota reset instant.
//! On reconnect every subscription fires once straight away. One whose fetch
//! is still running then fires as soon as that fetch completes.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use super::rate_limit::RateLimitTracker;
use crate::api::NormalizedError;
use crate::cache::{CacheStore, QueryKey};

pub const DEFAULT_HIDDEN_MULTIPLIER: u32 = 10;
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Whether a subscription keeps polling while the quota is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
  Critical,
  #[default]
  Normal,
}

/// Terminal focus, standing in for page visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
  #[default]
  Visible,
  Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
  pub hidden_multiplier: u32,
  pub max_interval: Duration,
}

impl Default for PollPolicy {
  fn default() -> Self {
    Self {
      hidden_multiplier: DEFAULT_HIDDEN_MULTIPLIER,
      max_interval: DEFAULT_MAX_INTERVAL,
    }
  }
}

pub fn backoff_multiplier(consecutive_failures: u32) -> u32 {
  1u32 << consecutive_failures.min(16)
}

/// Delay until the next poll, or `None` while offline.
pub fn effective_interval(
  base: Duration,
  consecutive_failures: u32,
  visibility: Visibility,
  online: bool,
  policy: &PollPolicy,
) -> Option<Duration> {
  if !online {
    return None;
  }

  let interval = base
    .saturating_mul(backoff_multiplier(consecutive_failures))
    .min(policy.max_interval);
  match visibility {
    Visibility::Visible => Some(interval),
    Visibility::Hidden => Some(interval.saturating_mul(policy.hidden_multiplier)),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
  Idle,
  Scheduled { due: Instant },
  Firing,
  /// Offline; resumes on the reconnect catch-up
  Suspended,
  Cancelled,
}

pub type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, NormalizedError>> + Send + Sync>;

/// Read-only view of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStatus {
  pub phase: PollPhase,
  pub consecutive_failures: u32,
  pub consumers: usize,
  pub last_delay: Option<Duration>,
  pub catch_up_pending: bool,
}

struct PollSubscription<V> {
  base: Duration,
  priority: Priority,
  fetcher: Fetcher<V>,
  consecutive_failures: u32,
  phase: PollPhase,
  timer: Option<JoinHandle<()>>,
  /// Token of the timer allowed to fire; older timers see a mismatch
  epoch: u64,
  consumers: usize,
  /// Went offline or missed a catch-up while firing
  catch_up_pending: bool,
  subscribed_at: Instant,
  last_completed: Option<Instant>,
  last_delay: Option<Duration>,
}

impl<V> PollSubscription<V> {
  fn cancel_timer(&mut self) {
    if let Some(timer) = self.timer.take() {
      timer.abort();
    }
  }

  fn status(&self) -> PollStatus {
    PollStatus {
      phase: self.phase,
      consecutive_failures: self.consecutive_failures,
      consumers: self.consumers,
      last_delay: self.last_delay,
      catch_up_pending: self.catch_up_pending,
    }
  }
}

struct SchedulerState<V> {
  subs: HashMap<QueryKey, PollSubscription<V>>,
  visibility: Visibility,
  next_epoch: u64,
}

struct SchedulerInner<V> {
  store: CacheStore<V>,
  connectivity: ConnectivityMonitor,
  rate_limits: RateLimitTracker,
  policy: PollPolicy,
  state: Mutex<SchedulerState<V>>,
}

/// Drives `CacheStore::refresh` for every polled key. Clones share state.
pub struct PollScheduler<V> {
  inner: Arc<SchedulerInner<V>>,
}

impl<V> Clone for PollScheduler<V> {
  fn clone(&self) -> Self {
    Self {
      inner: self.inner.clone(),
    }
  }
}

impl<V> PollScheduler<V>
where
  V: Clone + Send + Sync + 'static,
{
  pub fn new(
    store: CacheStore<V>,
    connectivity: ConnectivityMonitor,
    rate_limits: RateLimitTracker,
    policy: PollPolicy,
  ) -> Self {
    Self {
      inner: Arc::new(SchedulerInner {
        store,
        connectivity,
        rate_limits,
        policy,
        state: Mutex::new(SchedulerState {
          subs: HashMap::new(),
          visibility: Visibility::Visible,
          next_epoch: 0,
        }),
      }),
    }
  }

  /// Add a consumer for `key`. The first consumer creates the subscription
  /// and schedules its first poll one interval from now.
  pub fn subscribe(&self, key: &QueryKey, priority: Priority, fetcher: Fetcher<V>) {
    let now = Instant::now();
    let mut state = self.lock();
    let visibility = state.visibility;
    let SchedulerState {
      subs, next_epoch, ..
    } = &mut *state;

    if let Some(sub) = subs.get_mut(key) {
      sub.consumers += 1;
      return;
    }

    let sub = subs.entry(key.clone()).or_insert(PollSubscription {
      base: key.class().poll_interval(),
      priority,
      fetcher,
      consecutive_failures: 0,
      phase: PollPhase::Idle,
      timer: None,
      epoch: 0,
      consumers: 1,
      catch_up_pending: false,
      subscribed_at: now,
      last_completed: None,
      last_delay: None,
    });

    debug!(key = %key, class = key.class().name(), ?priority, "poll subscription created");
    self.schedule_next(key, sub, next_epoch, visibility, now);
  }

  /// Remove a consumer. The last one out cancels the timer.
  pub fn unsubscribe(&self, key: &QueryKey) {
    let mut state = self.lock();
    let Some(sub) = state.subs.get_mut(key) else {
      warn!(key = %key, "poll unsubscribe for unknown key");
      return;
    };

    sub.consumers = sub.consumers.saturating_sub(1);
    if sub.consumers > 0 {
      return;
    }

    sub.cancel_timer();
    sub.phase = PollPhase::Cancelled;
    state.subs.remove(key);
    debug!(key = %key, "poll subscription cancelled");
  }

  pub fn visibility(&self) -> Visibility {
    self.lock().visibility
  }

  /// Switch visibility and reschedule everything from its last completion.
  pub fn set_visibility(&self, visibility: Visibility) {
    let now = Instant::now();
    let mut state = self.lock();
    if state.visibility == visibility {
      return;
    }
    state.visibility = visibility;
    info!(?visibility, "visibility changed, rescheduling polls");

    let SchedulerState {
      subs, next_epoch, ..
    } = &mut *state;
    for (key, sub) in subs.iter_mut() {
      if !matches!(sub.phase, PollPhase::Idle | PollPhase::Scheduled { .. }) {
        continue;
      }
      let anchor = sub.last_completed.unwrap_or(sub.subscribed_at);
      self.schedule_next(key, sub, next_epoch, visibility, anchor.min(now));
    }
  }

  /// Fire every subscription once, immediately.
  pub fn catch_up(&self) {
    let now = Instant::now();
    let mut state = self.lock();
    let SchedulerState {
      subs, next_epoch, ..
    } = &mut *state;

    let mut fired = 0;
    let mut deferred = 0;
    for (key, sub) in subs.iter_mut() {
      if sub.phase == PollPhase::Firing {
        sub.catch_up_pending = true;
        deferred += 1;
        continue;
      }
      sub.catch_up_pending = false;
      self.arm(key, sub, next_epoch, now);
      fired += 1;
    }
    info!(subscriptions = fired, in_flight = deferred, "catch-up refresh");
  }

  /// Abort every timer; used when the connection drops.
  pub fn suspend_all(&self) {
    let mut state = self.lock();
    for sub in state.subs.values_mut() {
      if sub.phase == PollPhase::Firing {
        sub.catch_up_pending = true;
        continue;
      }
      sub.cancel_timer();
      sub.phase = PollPhase::Suspended;
    }
    debug!(subscriptions = state.subs.len(), "polling suspended");
  }

  /// React to connectivity edges: suspend on offline, catch up on reconnect.
  pub fn watch_connectivity(&self) -> JoinHandle<()> {
    let scheduler = self.clone();
    let mut events = self.inner.connectivity.events();

    tokio::spawn(async move {
      loop {
        match events.recv().await {
          Ok(ConnectivityEvent::WentOffline) => scheduler.suspend_all(),
          Ok(ConnectivityEvent::Reconnected) => scheduler.catch_up(),
          Ok(ConnectivityEvent::Settled) => {}
          Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "connectivity events lagged, resyncing");
            if scheduler.inner.connectivity.is_online() {
              scheduler.catch_up();
            } else {
              scheduler.suspend_all();
            }
          }
          Err(RecvError::Closed) => break,
        }
      }
    })
  }

  pub fn status(&self, key: &QueryKey) -> Option<PollStatus> {
    self.lock().subs.get(key).map(PollSubscription::status)
  }

  pub fn active_count(&self) -> usize {
    self.lock().subs.len()
  }

  fn schedule_next(
    &self,
    key: &QueryKey,
    sub: &mut PollSubscription<V>,
    next_epoch: &mut u64,
    visibility: Visibility,
    anchor: Instant,
  ) {
    let online = self.inner.connectivity.is_online();
    match effective_interval(
      sub.base,
      sub.consecutive_failures,
      visibility,
      online,
      &self.inner.policy,
    ) {
      Some(delay) => {
        sub.last_delay = Some(delay);
        self.arm(key, sub, next_epoch, anchor + delay);
      }
      None => {
        sub.cancel_timer();
        sub.phase = PollPhase::Suspended;
      }
    }
  }

  fn arm(&self, key: &QueryKey, sub: &mut PollSubscription<V>, next_epoch: &mut u64, due: Instant) {
    sub.cancel_timer();

    *next_epoch += 1;
    let epoch = *next_epoch;
    sub.epoch = epoch;
    sub.phase = PollPhase::Scheduled { due };

    let scheduler = self.clone();
    let key = key.clone();
    sub.timer = Some(tokio::spawn(async move {
      tokio::time::sleep_until(due).await;
      scheduler.fire(key, epoch).await;
    }));
  }

  async fn fire(&self, key: QueryKey, epoch: u64) {
    let fetcher = {
      let mut state = self.lock();
      let SchedulerState {
        subs, next_epoch, ..
      } = &mut *state;
      let Some(sub) = subs.get_mut(&key) else {
        return;
      };
      if sub.epoch != epoch {
        return;
      }
      // This task owns the handle; detach it rather than abort ourselves.
      sub.timer.take();

      if !self.inner.connectivity.is_online() {
        sub.phase = PollPhase::Suspended;
        debug!(key = %key, "offline, poll suspended");
        return;
      }

      if !self.inner.rate_limits.allows_poll(sub.priority) {
        let wait = self.inner.rate_limits.reset_in();
        debug!(key = %key, wait_secs = wait.as_secs(), "rate limited, poll deferred");
        self.arm(&key, sub, next_epoch, Instant::now() + wait);
        return;
      }

      sub.phase = PollPhase::Firing;
      sub.fetcher.clone()
    };

    let result = self.inner.store.refresh(&key, move || fetcher()).await;

    let now = Instant::now();
    let mut state = self.lock();
    let visibility = state.visibility;
    let SchedulerState {
      subs, next_epoch, ..
    } = &mut *state;
    let Some(sub) = subs.get_mut(&key) else {
      return;
    };

    sub.last_completed = Some(now);
    let owes_catch_up = std::mem::take(&mut sub.catch_up_pending);
    match result {
      Ok(_) => sub.consecutive_failures = 0,
      Err(err) if owes_catch_up => {
        debug!(key = %key, error = %err, "fetch interrupted by an outage failed");
      }
      Err(err) => {
        sub.consecutive_failures = sub.consecutive_failures.saturating_add(1);
        warn!(
          key = %key,
          failures = sub.consecutive_failures,
          category = ?err.category(),
          error = %err,
          "poll failed, backing off"
        );
      }
    }

    // Suspended or re-armed while the fetch ran.
    if sub.phase != PollPhase::Firing {
      return;
    }
    if owes_catch_up && self.inner.connectivity.is_online() {
      debug!(key = %key, "in-flight fetch finished, firing missed catch-up");
      self.arm(&key, sub, next_epoch, now);
      return;
    }
    self.schedule_next(&key, sub, next_epoch, visibility, now);
  }

  fn lock(&self) -> MutexGuard<'_, SchedulerState<V>> {
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
  use crate::cache::{ResourceClass, DEFAULT_GC_WINDOW};
  use crate::sync::connectivity::DEFAULT_RECONNECT_GRACE;
  use crate::sync::rate_limit::RateLimitInfo;
  use futures::FutureExt;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct Harness {
    scheduler: PollScheduler<String>,
    connectivity: ConnectivityMonitor,
    rate_limits: RateLimitTracker,
  }

  fn harness() -> Harness {
    let connectivity = ConnectivityMonitor::new(DEFAULT_RECONNECT_GRACE);
    let rate_limits = RateLimitTracker::new();
    let scheduler = PollScheduler::new(
      CacheStore::new(DEFAULT_GC_WINDOW),
      connectivity.clone(),
      rate_limits.clone(),
      PollPolicy::default(),
    );
    Harness {
      scheduler,
      connectivity,
      rate_limits,
    }
  }

  /// Fails for the first `failures` calls, then succeeds.
  fn scripted(calls: &Arc<AtomicUsize>, failures: usize) -> Fetcher<String> {
    let calls = calls.clone();
    Arc::new(move || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      async move {
        if n < failures {
          Err(NormalizedError::network("unreachable"))
        } else {
          Ok(format!("value {}", n))
        }
      }
      .boxed()
    })
  }

  fn frequent(namespace: &str) -> QueryKey {
    QueryKey::new(ResourceClass::Frequent, namespace)
  }

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
  }

  #[test]
  fn test_effective_interval() {
    let policy = PollPolicy::default();
    let base = Duration::from_secs(30);

    assert_eq!(
      effective_interval(base, 0, Visibility::Visible, true, &policy),
      Some(base)
    );
    assert_eq!(
      effective_interval(base, 2, Visibility::Visible, true, &policy),
      Some(Duration::from_secs(120))
    );
    assert_eq!(
      effective_interval(base, 0, Visibility::Hidden, true, &policy),
      Some(Duration::from_secs(300))
    );
    assert_eq!(
      effective_interval(base, 6, Visibility::Visible, true, &policy),
      Some(DEFAULT_MAX_INTERVAL)
    );
    assert_eq!(
      effective_interval(base, 0, Visibility::Visible, false, &policy),
      None
    );
    assert_eq!(
      effective_interval(base, u32::MAX, Visibility::Visible, true, &policy),
      Some(DEFAULT_MAX_INTERVAL)
    );
  }

  #[test]
  fn test_hidden_multiplier_applies_after_backoff_cap() {
    let policy = PollPolicy::default();
    let static_base = Duration::from_secs(600);

    assert_eq!(
      effective_interval(static_base, 0, Visibility::Hidden, true, &policy),
      Some(Duration::from_secs(6000))
    );
    assert_eq!(
      effective_interval(static_base, 3, Visibility::Hidden, true, &policy),
      Some(Duration::from_secs(6000))
    );
    assert_eq!(
      effective_interval(Duration::from_secs(30), 6, Visibility::Hidden, true, &policy),
      Some(Duration::from_secs(6000))
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_backoff_then_reset_on_success() {
    let h = harness();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = frequent("health");

    h.scheduler
      .subscribe(&key, Priority::Normal, scripted(&calls, 2));
    assert_eq!(
      h.scheduler.status(&key).unwrap().last_delay,
      Some(Duration::from_secs(30))
    );

    tokio::time::sleep(Duration::from_secs(31)).await;
    let status = h.scheduler.status(&key).unwrap();
    assert_eq!(status.consecutive_failures, 1);
    assert_eq!(status.last_delay, Some(Duration::from_secs(60)));

    tokio::time::sleep(Duration::from_secs(60)).await;
    let status = h.scheduler.status(&key).unwrap();
    assert_eq!(status.consecutive_failures, 2);
    assert_eq!(status.last_delay, Some(Duration::from_secs(120)));

    tokio::time::sleep(Duration::from_secs(120)).await;
    let status = h.scheduler.status(&key).unwrap();
    assert_eq!(status.consecutive_failures, 0);
    assert_eq!(status.last_delay, Some(Duration::from_secs(30)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn test_hidden_slows_polling_and_focus_reschedules() {
    let h = harness();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = frequent("scraper");

    h.scheduler
      .subscribe(&key, Priority::Normal, scripted(&calls, 0));
    h.scheduler.set_visibility(Visibility::Hidden);

    tokio::time::sleep(Duration::from_secs(299)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Last poll ended at 300s; visible interval is 30s from there.
    h.scheduler.set_visibility(Visibility::Visible);
    tokio::time::sleep(Duration::from_secs(28)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_focus_fires_overdue_subscription_at_once() {
    let h = harness();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = frequent("health");

    h.scheduler.set_visibility(Visibility::Hidden);
    h.scheduler
      .subscribe(&key, Priority::Normal, scripted(&calls, 0));

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    h.scheduler.set_visibility(Visibility::Visible);
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_offline_suspends_and_reconnect_catches_up_once() {
    let h = harness();
    let _listener = h.scheduler.watch_connectivity();
    let health = Arc::new(AtomicUsize::new(0));
    let quotes = Arc::new(AtomicUsize::new(0));
    let health_key = frequent("health");
    let quote_key = QueryKey::new(ResourceClass::Realtime, "quote").with_segment("AAPL");

    h.scheduler
      .subscribe(&health_key, Priority::Critical, scripted(&health, 0));
    h.scheduler
      .subscribe(&quote_key, Priority::Normal, scripted(&quotes, 0));

    h.connectivity.set_online(false);
    settle().await;
    assert_eq!(
      h.scheduler.status(&health_key).unwrap().phase,
      PollPhase::Suspended
    );

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(health.load(Ordering::SeqCst), 0);
    assert_eq!(quotes.load(Ordering::SeqCst), 0);

    h.connectivity.set_online(true);
    settle().await;
    assert_eq!(health.load(Ordering::SeqCst), 1);
    assert_eq!(quotes.load(Ordering::SeqCst), 1);

    // Back on the normal cadence afterwards.
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(quotes.load(Ordering::SeqCst), 1);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(quotes.load(Ordering::SeqCst), 2);
    assert_eq!(health.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_in_flight_across_outage_gets_catch_up() {
    let h = harness();
    let _listener = h.scheduler.watch_connectivity();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = frequent("health");

    // First fetch hangs for 10s, then times out; later ones succeed.
    let fetcher: Fetcher<String> = {
      let calls = calls.clone();
      Arc::new(move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move {
          if n == 0 {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Err(NormalizedError::timeout("timed out"))
          } else {
            Ok(format!("value {}", n))
          }
        }
        .boxed()
      })
    };
    h.scheduler.subscribe(&key, Priority::Normal, fetcher);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    h.connectivity.set_online(false);
    settle().await;
    h.connectivity.set_online(true);
    settle().await;

    let status = h.scheduler.status(&key).unwrap();
    assert_eq!(status.phase, PollPhase::Firing);
    assert!(status.catch_up_pending);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The hung fetch fails at 40s and the catch-up fires right away.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let status = h.scheduler.status(&key).unwrap();
    assert_eq!(status.consecutive_failures, 0);
    assert!(!status.catch_up_pending);
    assert_eq!(status.last_delay, Some(Duration::from_secs(30)));
  }

  #[tokio::test(start_paused = true)]
  async fn test_rate_limit_defers_normal_priority_only() {
    let h = harness();
    let normal = Arc::new(AtomicUsize::new(0));
    let critical = Arc::new(AtomicUsize::new(0));

    h.rate_limits.observe(RateLimitInfo {
      limit: 60,
      remaining: 0,
      reset_in: Duration::from_secs(45),
    });

    h.scheduler
      .subscribe(&frequent("sentiment"), Priority::Normal, scripted(&normal, 0));
    h.scheduler
      .subscribe(&frequent("health"), Priority::Critical, scripted(&critical, 0));

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(critical.load(Ordering::SeqCst), 1);
    assert_eq!(normal.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(normal.load(Ordering::SeqCst), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_last_consumer_cancels_timer() {
    let h = harness();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = frequent("sources");

    h.scheduler
      .subscribe(&key, Priority::Normal, scripted(&calls, 0));
    h.scheduler
      .subscribe(&key, Priority::Normal, scripted(&calls, 0));
    assert_eq!(h.scheduler.status(&key).unwrap().consumers, 2);

    h.scheduler.unsubscribe(&key);
    assert!(h.scheduler.status(&key).is_some());

    h.scheduler.unsubscribe(&key);
    assert!(h.scheduler.status(&key).is_none());
    assert_eq!(h.scheduler.active_count(), 0);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_subscribe_while_offline_is_suspended() {
    let h = harness();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = frequent("health");

    h.connectivity.set_online(false);
    h.scheduler
      .subscribe(&key, Priority::Critical, scripted(&calls, 0));

    assert_eq!(h.scheduler.status(&key).unwrap().phase, PollPhase::Suspended);
  }
}
