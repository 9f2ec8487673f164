use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::view::{ShortcutInfo, ShortcutVisibility};

/// Draw the footer bar: breadcrumb, prompt hints, then any notice
pub fn draw_footer(
  frame: &mut Frame,
  area: Rect,
  breadcrumb: &[String],
  shortcuts: &[ShortcutInfo],
  notice: Option<&str>,
) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i == breadcrumb.len() - 1 {
      // Current view - highlighted
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };

    spans.push(Span::styled(part.clone(), style));
  }

  let mut hints: Vec<&ShortcutInfo> = shortcuts
    .iter()
    .filter(|s| s.visibility == ShortcutVisibility::WhenActive)
    .collect();
  hints.sort_by_key(|s| s.priority);
  for hint in hints {
    spans.push(Span::styled(
      format!("  <{}>", hint.key),
      Style::default().fg(Color::Yellow),
    ));
    spans.push(Span::styled(
      format!(" {}", hint.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  if let Some(notice) = notice {
    spans.push(Span::styled("  │ ", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(notice.to_string(), Style::default().fg(Color::Yellow)));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
