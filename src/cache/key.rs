//! Cache keys and resource classes.

use std::fmt;
use std::time::Duration;

/// Staleness policy for a category of data.
///
/// The class decides how long a value counts as fresh, the base polling
/// interval, and the request timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceClass {
  /// Quotes and other tick data
  Realtime,
  /// Health and scraper counters
  Frequent,
  /// Article lists and aggregates
  Standard,
  /// Reference data that rarely changes
  Static,
}

impl ResourceClass {
  pub fn stale_after(self) -> Duration {
    match self {
      ResourceClass::Realtime => Duration::from_secs(5),
      ResourceClass::Frequent => Duration::from_secs(30),
      ResourceClass::Standard => Duration::from_secs(120),
      ResourceClass::Static => Duration::from_secs(600),
    }
  }

  /// Base interval for adaptive polling, before any multipliers.
  pub fn poll_interval(self) -> Duration {
    self.stale_after()
  }

  pub fn request_timeout(self) -> Duration {
    match self {
      ResourceClass::Realtime => Duration::from_secs(10),
      ResourceClass::Frequent => Duration::from_secs(15),
      ResourceClass::Standard | ResourceClass::Static => Duration::from_secs(30),
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      ResourceClass::Realtime => "realtime",
      ResourceClass::Frequent => "frequent",
      ResourceClass::Standard => "standard",
      ResourceClass::Static => "static",
    }
  }
}

/// Identity of a cache entry.
///
/// A key is a resource class plus a path of segments; the first segment is
/// the resource namespace (`articles`, `quote`, ...). The class is part of
/// the identity, so an entry's class can never change while it lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
  class: ResourceClass,
  segments: Vec<String>,
}

impl QueryKey {
  pub fn new(class: ResourceClass, namespace: &str) -> Self {
    Self {
      class,
      segments: vec![namespace.to_string()],
    }
  }

  pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
    self.segments.push(segment.into());
    self
  }

  /// Append one `name=value` segment per pair, in order.
  pub fn with_pairs<'a>(mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
    self
      .segments
      .extend(pairs.into_iter().map(|(k, v)| format!("{}={}", k, v)));
    self
  }

  pub fn class(&self) -> ResourceClass {
    self.class
  }

  /// Whole-segment prefix match; `articles` never matches `articles_archive`.
  pub fn matches(&self, prefix: &KeyPrefix) -> bool {
    self.segments.len() >= prefix.0.len()
      && self.segments.iter().zip(&prefix.0).all(|(a, b)| a == b)
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.segments.join("/"))
  }
}

/// Segment prefix used for bulk invalidation. Class-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix(Vec<String>);

impl KeyPrefix {
  pub fn new(namespace: &str) -> Self {
    Self(vec![namespace.to_string()])
  }

  pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
    self.0.push(segment.into());
    self
  }
}
