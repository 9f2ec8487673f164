//! Online/offline tracking with a reconnect grace window.
//!
//! Signals come from two places: the API client (a network-level failure
//! means offline, any HTTP response means online) and a probe task that
//! checks reachability on a timer. Repeated signals are ignored, so the state
//! only changes on real transitions.
//!
//! ```text
//!            offline              online (was_offline)
//!   Online ─────────► Offline ─────────────────────► ReconnectingGrace
//!      ▲                 ▲                                  │
//!      │                 └──────────── offline ─────────────┤
//!      └──────────────── grace window elapsed ──────────────┘
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_RECONNECT_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityPhase {
  Online,
  Offline,
  /// Back online after an outage; the "reconnected" banner is showing
  ReconnectingGrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
  pub phase: ConnectivityPhase,
  pub is_online: bool,
  pub was_offline: bool,
  pub last_transition_at: Instant,
}

impl ConnectivityState {
  fn online(now: Instant) -> Self {
    Self {
      phase: ConnectivityPhase::Online,
      is_online: true,
      was_offline: false,
      last_transition_at: now,
    }
  }
}

/// Edge events, published once per transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
  WentOffline,
  /// Entered the grace window; active subscriptions should catch up now
  Reconnected,
  /// Grace window over, fully online
  Settled,
}

/// Connectivity state machine. Clones share state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
  inner: Arc<MonitorInner>,
}

struct MonitorInner {
  state: watch::Sender<ConnectivityState>,
  events: broadcast::Sender<ConnectivityEvent>,
  grace: Duration,
  grace_timer: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
  /// Start in the online state.
  pub fn new(grace: Duration) -> Self {
    let (state, _) = watch::channel(ConnectivityState::online(Instant::now()));
    let (events, _) = broadcast::channel(16);

    Self {
      inner: Arc::new(MonitorInner {
        state,
        events,
        grace,
        grace_timer: Mutex::new(None),
      }),
    }
  }

  pub fn state(&self) -> ConnectivityState {
    *self.inner.state.borrow()
  }

  pub fn is_online(&self) -> bool {
    self.state().is_online
  }

  /// Receiver for the full state (banners read this).
  pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
    self.inner.state.subscribe()
  }

  /// Receiver for transition edges (the scheduler reads this).
  pub fn events(&self) -> broadcast::Receiver<ConnectivityEvent> {
    self.inner.events.subscribe()
  }

  /// Feed a reachability signal.
  pub fn set_online(&self, online: bool) {
    if online {
      self.go_online();
    } else {
      self.go_offline();
    }
  }

  fn go_offline(&self) {
    let now = Instant::now();
    let changed = self.inner.state.send_if_modified(|state| {
      if state.phase == ConnectivityPhase::Offline {
        return false;
      }
      *state = ConnectivityState {
        phase: ConnectivityPhase::Offline,
        is_online: false,
        was_offline: true,
        last_transition_at: now,
      };
      true
    });

    if changed {
      self.cancel_grace_timer();
      warn!("connection lost, background refreshes suspended");
      let _ = self.inner.events.send(ConnectivityEvent::WentOffline);
    }
  }

  fn go_online(&self) {
    let now = Instant::now();
    let changed = self.inner.state.send_if_modified(|state| {
      if state.phase != ConnectivityPhase::Offline {
        return false;
      }
      state.last_transition_at = now;
      state.is_online = true;
      state.phase = if state.was_offline {
        ConnectivityPhase::ReconnectingGrace
      } else {
        ConnectivityPhase::Online
      };
      true
    });

    if !changed {
      return;
    }

    if self.state().phase == ConnectivityPhase::ReconnectingGrace {
      info!(grace_ms = self.inner.grace.as_millis() as u64, "connection restored");
      let _ = self.inner.events.send(ConnectivityEvent::Reconnected);
      self.start_grace_timer();
    }
  }

  fn start_grace_timer(&self) {
    let monitor = self.clone();
    let grace = self.inner.grace;
    let handle = tokio::spawn(async move {
      tokio::time::sleep(grace).await;
      monitor.settle();
    });

    let mut timer = self.timer_lock();
    if let Some(previous) = timer.replace(handle) {
      previous.abort();
    }
  }

  fn cancel_grace_timer(&self) {
    if let Some(handle) = self.timer_lock().take() {
      handle.abort();
    }
  }

  fn settle(&self) {
    let now = Instant::now();
    let changed = self.inner.state.send_if_modified(|state| {
      if state.phase != ConnectivityPhase::ReconnectingGrace {
        return false;
      }
      state.phase = ConnectivityPhase::Online;
      state.was_offline = false;
      state.last_transition_at = now;
      true
    });

    if changed {
      debug!("reconnect grace window over");
      let _ = self.inner.events.send(ConnectivityEvent::Settled);
    }
  }

  fn timer_lock(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
    self
      .inner
      .grace_timer
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }
}

/// Spawn a task that checks reachability and feeds the result to `monitor`.
///
/// Probes every `online_every` while online and every `offline_every` while
/// offline, so an outage is noticed quickly once it ends even though no
/// polls are running.
pub fn spawn_probe<F, Fut>(
  monitor: ConnectivityMonitor,
  online_every: Duration,
  offline_every: Duration,
  probe: F,
) -> JoinHandle<()>
where
  F: Fn() -> Fut + Send + 'static,
  Fut: Future<Output = bool> + Send + 'static,
{
  tokio::spawn(async move {
    loop {
      let wait = if monitor.is_online() {
        online_every
      } else {
        offline_every
      };
      tokio::time::sleep(wait).await;

      let reachable = probe().await;
      debug!(reachable, "connectivity probe");
      monitor.set_online(reachable);
    }
  })
}
