use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::sync::{ConnectivityPhase, ConnectivityState, RateLimitState};
use crate::ui::view::{ShortcutInfo, ShortcutVisibility};

/// Draw the header bar with logo, API host, sync status and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  connectivity: &ConnectivityState,
  quota: &RateLimitState,
  shortcuts: &[ShortcutInfo],
) {
  let mut spans = vec![
    Span::styled(" newsdash ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
  ];

  let (label, color) = match connectivity.phase {
    ConnectivityPhase::Online => ("online", Color::Green),
    ConnectivityPhase::ReconnectingGrace => ("reconnected", Color::Cyan),
    ConnectivityPhase::Offline => ("offline", Color::Red),
  };
  spans.push(Span::styled(format!(" ● {} ", label), Style::default().fg(color)));

  if quota.is_known() {
    let color = if quota.is_limited {
      Color::Red
    } else if quota.remaining * 5 < quota.limit {
      Color::Yellow
    } else {
      Color::DarkGray
    };
    spans.push(Span::styled(
      format!(" quota {}/{} ", quota.remaining, quota.limit),
      Style::default().fg(color),
    ));
  }

  spans.push(Span::raw(" "));

  // Shortcuts - keys and brackets highlighted, descriptions dimmed
  let mut shortcuts: Vec<&ShortcutInfo> = shortcuts
    .iter()
    .filter(|s| s.visibility == ShortcutVisibility::Always)
    .collect();
  shortcuts.sort_by_key(|s| s.priority);
  for shortcut in shortcuts {
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}   ", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Host and port of the API base URL, for the header
pub fn extract_host(url: &url::Url) -> String {
  match (url.host_str(), url.port()) {
    (Some(host), Some(port)) => format!("{}:{}", host, port),
    (Some(host), None) => host.to_string(),
    _ => url.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_host() {
    let url = url::Url::parse("https://news.example.com/api/v1/").unwrap();
    assert_eq!(extract_host(&url), "news.example.com");

    let url = url::Url::parse("http://localhost:8000/api/v1/").unwrap();
    assert_eq!(extract_host(&url), "localhost:8000");
  }
}
