//! Passive tracking of the server's request quota.
//!
//! The tracker never issues requests. The API client hands it the quota
//! headers of every response, and the poll scheduler and manual refresh path
//! ask it whether they may go ahead.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

use super::scheduler::Priority;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Used for a 429 that carries neither `Retry-After` nor a reset header.
const DEFAULT_LIMITED_WINDOW: Duration = Duration::from_secs(60);

/// Quota metadata read from one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
  pub limit: u32,
  pub remaining: u32,
  /// Time left until the quota resets, relative to when the headers were read
  pub reset_in: Duration,
}

impl RateLimitInfo {
  /// Read the `X-RateLimit-*` headers. `reset` is an epoch timestamp in
  /// seconds. Returns `None` unless all three headers are present and valid.
  pub fn from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Self> {
    let limit = header_number(headers, LIMIT_HEADER)?;
    let remaining = header_number(headers, REMAINING_HEADER)?;
    let reset: i64 = header_number(headers, RESET_HEADER)?;

    let secs = reset.saturating_sub(now.timestamp()).max(0) as u64;

    Some(Self {
      limit,
      remaining,
      reset_in: Duration::from_secs(secs),
    })
  }
}

/// Parse a `Retry-After` header, either delay-seconds or an HTTP date.
pub fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
  let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?.trim();

  if let Ok(secs) = value.parse::<u64>() {
    return Some(Duration::from_secs(secs));
  }

  let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
  (at - now).to_std().ok()
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
  headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Current view of the quota.
///
/// `is_limited` implies `remaining == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitState {
  pub limit: u32,
  pub remaining: u32,
  pub reset_at: Option<Instant>,
  pub is_limited: bool,
}

impl RateLimitState {
  /// Time until the quota resets, zero if it already has.
  pub fn reset_in(&self, now: Instant) -> Duration {
    self
      .reset_at
      .map(|at| at.saturating_duration_since(now))
      .unwrap_or(Duration::ZERO)
  }

  /// Whether any quota metadata has been seen yet
  pub fn is_known(&self) -> bool {
    self.reset_at.is_some()
  }

  fn decay(&mut self, now: Instant) -> bool {
    match self.reset_at {
      Some(at) if self.is_limited && at <= now => {
        self.is_limited = false;
        self.remaining = self.limit;
        true
      }
      _ => false,
    }
  }
}

/// A manual refresh refused because the quota is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate limited, quota resets in {}s", .reset_in.as_secs())]
pub struct RefreshRejected {
  pub reset_in: Duration,
}

/// Shared quota tracker. Clones share state.
#[derive(Clone, Default)]
pub struct RateLimitTracker {
  state: Arc<Mutex<RateLimitState>>,
}

impl RateLimitTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record quota headers from a response.
  pub fn observe(&self, info: RateLimitInfo) {
    let now = Instant::now();
    let mut state = self.lock();
    let was_limited = state.is_limited;

    state.limit = info.limit;
    state.remaining = info.remaining;
    state.reset_at = Some(now + info.reset_in);
    state.is_limited = info.remaining == 0 && !info.reset_in.is_zero();

    if state.is_limited && !was_limited {
      warn!(
        limit = info.limit,
        reset_in_secs = info.reset_in.as_secs(),
        "request quota exhausted"
      );
    } else if was_limited && !state.is_limited {
      info!(remaining = info.remaining, "request quota available again");
    }
  }

  /// Record an HTTP 429.
  ///
  /// Uses `retry_after` when given, otherwise keeps a known future reset
  /// time, otherwise waits a default window.
  pub fn mark_exhausted(&self, retry_after: Option<Duration>) {
    let now = Instant::now();
    let mut state = self.lock();

    let reset_at = match (retry_after, state.reset_at) {
      (Some(wait), _) => now + wait,
      (None, Some(at)) if at > now => at,
      _ => now + DEFAULT_LIMITED_WINDOW,
    };

    state.remaining = 0;
    state.reset_at = Some(reset_at);
    state.is_limited = true;

    warn!(
      reset_in_secs = reset_at.saturating_duration_since(now).as_secs(),
      "server answered 429, pausing background refreshes"
    );
  }

  /// Current state, with `is_limited` cleared if the reset time has passed.
  pub fn snapshot(&self) -> RateLimitState {
    let now = Instant::now();
    let mut state = self.lock();
    if state.decay(now) {
      info!("request quota reset");
    }
    *state
  }

  pub fn is_limited(&self) -> bool {
    self.snapshot().is_limited
  }

  pub fn reset_in(&self) -> Duration {
    self.snapshot().reset_in(Instant::now())
  }

  /// Whether a background poll of the given priority may run now.
  pub fn allows_poll(&self, priority: Priority) -> bool {
    priority == Priority::Critical || !self.is_limited()
  }

  /// Gate for user-initiated refreshes.
  pub fn check_manual(&self) -> Result<(), RefreshRejected> {
    let state = self.snapshot();
    if state.is_limited {
      Err(RefreshRejected {
        reset_in: state.reset_in(Instant::now()),
      })
    } else {
      Ok(())
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, RateLimitState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
