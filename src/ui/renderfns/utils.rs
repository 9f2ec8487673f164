use ratatui::prelude::Color;
use std::time::Duration;

use crate::api::types::Sentiment;
use crate::cache::CacheStatus;

/// Truncate a string to a maximum number of characters, adding "..." if
/// truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn sentiment_color(sentiment: Option<Sentiment>) -> Color {
  match sentiment {
    Some(Sentiment::Positive) => Color::Green,
    Some(Sentiment::Negative) => Color::Red,
    Some(Sentiment::Neutral) => Color::Gray,
    None => Color::DarkGray,
  }
}

/// Color for a price or score change
pub fn change_color(change: f64) -> Color {
  if change > 0.0 {
    Color::Green
  } else if change < 0.0 {
    Color::Red
  } else {
    Color::White
  }
}

pub fn cache_status_color(status: CacheStatus, is_stale: bool) -> Color {
  match status {
    CacheStatus::Error => Color::Red,
    CacheStatus::Loading => Color::Yellow,
    CacheStatus::Success if is_stale => Color::Yellow,
    CacheStatus::Success => Color::Green,
    CacheStatus::Idle => Color::DarkGray,
  }
}

/// Compact age like `4s`, `3m`, `2h`
pub fn format_age(age: Duration) -> String {
  let secs = age.as_secs();
  match secs {
    0..=59 => format!("{}s", secs),
    60..=3599 => format!("{}m", secs / 60),
    _ => format!("{}h", secs / 3600),
  }
}

pub fn format_signed(value: f64, precision: usize) -> String {
  format!("{:+.*}", precision, value)
}
