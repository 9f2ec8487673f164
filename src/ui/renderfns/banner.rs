use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::time::Duration;
use tokio::time::Instant;

use crate::api::Locale;
use crate::sync::{ConnectivityPhase, ConnectivityState, RateLimitState};

/// One-line notice shown under the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
  Offline,
  Reconnected,
  RateLimited { reset_in: Duration },
  Stale,
}

impl Banner {
  /// Pick the most important notice, if any.
  ///
  /// Offline wins over everything, then rate limiting, then the reconnect
  /// notice, then the stale-data hint.
  pub fn select(
    connectivity: &ConnectivityState,
    quota: &RateLimitState,
    showing_stale: bool,
    now: Instant,
  ) -> Option<Self> {
    if connectivity.phase == ConnectivityPhase::Offline {
      return Some(Banner::Offline);
    }
    if quota.is_limited {
      return Some(Banner::RateLimited {
        reset_in: quota.reset_in(now),
      });
    }
    if connectivity.phase == ConnectivityPhase::ReconnectingGrace {
      return Some(Banner::Reconnected);
    }
    showing_stale.then_some(Banner::Stale)
  }

  pub fn text(&self, locale: Locale) -> String {
    match (self, locale) {
      (Banner::Offline, Locale::En) => "Offline. Showing cached data; updates resume when the connection returns.".to_string(),
      (Banner::Offline, Locale::Es) => "Sin conexión. Mostrando datos en caché; las actualizaciones se reanudarán al reconectar.".to_string(),
      (Banner::Reconnected, Locale::En) => "Back online. Refreshing everything.".to_string(),
      (Banner::Reconnected, Locale::Es) => "Conexión restablecida. Actualizando todo.".to_string(),
      (Banner::RateLimited { reset_in }, Locale::En) => format!(
        "Request limit reached. Automatic updates paused for {}s.",
        ceil_secs(*reset_in)
      ),
      (Banner::RateLimited { reset_in }, Locale::Es) => format!(
        "Límite de solicitudes alcanzado. Actualizaciones pausadas durante {}s.",
        ceil_secs(*reset_in)
      ),
      (Banner::Stale, Locale::En) => "Some data is out of date; refreshing in the background.".to_string(),
      (Banner::Stale, Locale::Es) => "Algunos datos están desactualizados; actualizando en segundo plano.".to_string(),
    }
  }

  fn style(&self) -> Style {
    match self {
      Banner::Offline => Style::default().fg(Color::White).bg(Color::Red),
      Banner::RateLimited { .. } => Style::default().fg(Color::Black).bg(Color::Yellow),
      Banner::Reconnected => Style::default().fg(Color::Black).bg(Color::Green),
      Banner::Stale => Style::default().fg(Color::Yellow).bg(Color::Black),
    }
  }
}

fn ceil_secs(duration: Duration) -> u64 {
  duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

pub fn draw_banner(frame: &mut Frame, area: Rect, banner: Banner, locale: Locale) {
  let paragraph = Paragraph::new(format!(" {}", banner.text(locale))).style(banner.style());
  frame.render_widget(paragraph, area);
}
