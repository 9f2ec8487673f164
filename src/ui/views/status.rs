use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use super::{empty_message, refresh_outcome, resource_title, ViewContext};
use crate::api::types::{HealthStatus, ScraperStats, SourceList};
use crate::resources::ResourceHandle;
use crate::sync::{PollPhase, PollStatus};
use crate::ui::renderfns::{format_age, truncate};
use crate::ui::view::{View, ViewAction};

/// Server health, scraper counters and the configured sources
pub struct StatusView {
  ctx: ViewContext,
  health: ResourceHandle<HealthStatus>,
  scraper: ResourceHandle<ScraperStats>,
  sources: ResourceHandle<SourceList>,
}

impl StatusView {
  pub fn new(ctx: ViewContext) -> Self {
    let health = ctx.resources.health(true);
    let scraper = ctx.resources.scraper_stats(true);
    let sources = ctx.resources.sources(false);
    Self {
      ctx,
      health,
      scraper,
      sources,
    }
  }

  fn row(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
      Span::styled(format!("{:<18}", label), Style::default().fg(Color::DarkGray)),
      Span::styled(value, Style::default().fg(color)),
    ])
  }

  fn poll_row(status: PollStatus) -> Line<'static> {
    let phase = match status.phase {
      PollPhase::Idle => "idle",
      PollPhase::Scheduled { .. } => "scheduled",
      PollPhase::Firing => "fetching",
      PollPhase::Suspended => "suspended",
      PollPhase::Cancelled => "cancelled",
    };
    let mut value = phase.to_string();
    if let Some(delay) = status.last_delay {
      value.push_str(&format!(", every {}", format_age(delay)));
    }
    let color = if status.consecutive_failures > 0 {
      value.push_str(&format!(", {} failed", status.consecutive_failures));
      Color::Yellow
    } else {
      Color::White
    };
    Self::row("polling", value, color)
  }

  fn render_health(&self, frame: &mut Frame, area: Rect) {
    let view = self.health.snapshot();
    let block = Block::default()
      .title(resource_title("Health", &view, None))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(health) = view.value.as_deref() else {
      let paragraph = Paragraph::new(empty_message(&view, self.ctx.locale, ""))
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    };

    let status_color = if health.is_healthy() {
      Color::Green
    } else {
      Color::Red
    };
    let mut lines = vec![Self::row("status", health.status.clone(), status_color)];
    if let Some(database) = &health.database {
      lines.push(Self::row("database", database.clone(), Color::White));
    }
    if let Some(version) = &health.version {
      lines.push(Self::row("version", version.clone(), Color::White));
    }
    if let Some(uptime) = health.uptime_seconds {
      lines.push(Self::row(
        "uptime",
        format_age(std::time::Duration::from_secs(uptime)),
        Color::White,
      ));
    }
    if let Some(status) = self.health.poll_status() {
      lines.push(Self::poll_row(status));
    }
    if let Some(error) = &view.error {
      lines.push(Self::row("last check", error.user_message(self.ctx.locale), Color::Red));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_scraper(&self, frame: &mut Frame, area: Rect) {
    let view = self.scraper.snapshot();
    let block = Block::default()
      .title(resource_title("Scraper", &view, None))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(stats) = view.value.as_deref() else {
      let paragraph = Paragraph::new(empty_message(&view, self.ctx.locale, ""))
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    };

    let failure_color = if stats.failures_last_24h > 0 {
      Color::Yellow
    } else {
      Color::White
    };
    let last_run = match (&stats.last_run_at, &stats.last_run_status) {
      (Some(at), Some(status)) => format!("{} ({})", at.format("%Y-%m-%d %H:%M"), status),
      (Some(at), None) => at.format("%Y-%m-%d %H:%M").to_string(),
      (None, Some(status)) => status.clone(),
      (None, None) => "-".to_string(),
    };

    let lines = vec![
      Self::row("total articles", stats.total_articles.to_string(), Color::White),
      Self::row("today", stats.articles_today.to_string(), Color::White),
      Self::row("active sources", stats.sources_active.to_string(), Color::White),
      Self::row("failures (24h)", stats.failures_last_24h.to_string(), failure_color),
      Self::row("last run", last_run, Color::White),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn render_sources(&self, frame: &mut Frame, area: Rect) {
    let view = self.sources.snapshot();
    let sources = view.value.as_deref().map(|s| s.0.as_slice()).unwrap_or(&[]);
    let block = Block::default()
      .title(resource_title("Sources", &view, Some(sources.len())))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if sources.is_empty() {
      let paragraph = Paragraph::new(empty_message(&view, self.ctx.locale, "No sources configured."))
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = sources
      .iter()
      .map(|source| {
        let (marker, color) = if source.enabled {
          ("●", Color::Green)
        } else {
          ("○", Color::DarkGray)
        };
        ListItem::new(Line::from(vec![
          Span::styled(format!("{} ", marker), Style::default().fg(color)),
          Span::styled(
            format!("{:<24}", truncate(&source.name, 23)),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(
            format!("{:>8} articles  ", source.article_count),
            Style::default().fg(Color::White),
          ),
          Span::styled(
            source.url.clone().unwrap_or_default(),
            Style::default().fg(Color::DarkGray),
          ),
        ]))
      })
      .collect();

    frame.render_widget(List::new(items).block(block), area);
  }
}

impl View for StatusView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        let result = self
          .health
          .refetch()
          .and_then(|()| self.scraper.refetch())
          .and_then(|()| self.sources.refetch());
        return refresh_outcome(result);
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(8), Constraint::Min(3)])
      .split(area);
    let top = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
      .split(rows[0]);

    self.render_health(frame, top[0]);
    self.render_scraper(frame, top[1]);
    self.render_sources(frame, rows[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "Status".to_string()
  }

  fn is_showing_stale(&self) -> bool {
    self.health.snapshot().is_stale || self.scraper.snapshot().is_stale
  }
}
