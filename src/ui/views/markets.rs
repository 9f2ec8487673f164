use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

use super::{empty_message, refresh_outcome, resource_title, ViewContext};
use crate::api::types::{SentimentSummary, StockQuote};
use crate::resources::{ResourceHandle, ResourceView};
use crate::ui::clamp_selection;
use crate::ui::renderfns::{cache_status_color, change_color, format_age, format_signed};
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// Watchlist quotes beside the aggregate sentiment summary
pub struct MarketsView {
  ctx: ViewContext,
  quotes: Vec<(String, ResourceHandle<StockQuote>)>,
  sentiment: ResourceHandle<SentimentSummary>,
  table_state: TableState,
}

impl MarketsView {
  pub fn new<'a>(ctx: ViewContext, symbols: impl IntoIterator<Item = &'a String>) -> Self {
    let quotes = symbols
      .into_iter()
      .map(|symbol| (symbol.clone(), ctx.resources.stock_quote(symbol, true)))
      .collect();
    let sentiment = ctx.resources.sentiment(true);

    Self {
      ctx,
      quotes,
      sentiment,
      table_state: TableState::default(),
    }
  }

  fn quote_row(symbol: &str, view: &ResourceView<StockQuote>) -> Row<'static> {
    let age = match view.age {
      Some(age) => format_age(age),
      None if view.is_loading() => "...".to_string(),
      None => "-".to_string(),
    };
    let freshness = Cell::from(age)
      .style(Style::default().fg(cache_status_color(view.status, view.is_stale)));

    match &view.value {
      Some(quote) => {
        let color = change_color(quote.change);
        Row::new(vec![
          Cell::from(symbol.to_string()).style(Style::default().fg(Color::Cyan)),
          Cell::from(format!("{:>10.2}", quote.price)),
          Cell::from(format!("{:>8}", format_signed(quote.change, 2))).style(Style::default().fg(color)),
          Cell::from(format!("{:>7}%", format_signed(quote.change_percent, 2)))
            .style(Style::default().fg(color)),
          Cell::from(quote.volume.map(|v| v.to_string()).unwrap_or_default()),
          freshness,
        ])
      }
      None => {
        let note = error_note(view);
        Row::new(vec![
          Cell::from(symbol.to_string()).style(Style::default().fg(Color::Cyan)),
          Cell::from(note).style(Style::default().fg(Color::Red)),
          Cell::from(""),
          Cell::from(""),
          Cell::from(""),
          freshness,
        ])
      }
    }
  }

  fn render_quotes(&mut self, frame: &mut Frame, area: Rect) {
    let selected = clamp_selection(self.table_state.selected(), self.quotes.len());
    self.table_state.select(selected);

    let block = Block::default()
      .title(format!(" Watchlist ({}) ", self.quotes.len()))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if self.quotes.is_empty() {
      let paragraph = Paragraph::new("Watchlist is empty. Add a symbol with :quote <SYMBOL>.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let rows: Vec<Row> = self
      .quotes
      .iter()
      .map(|(symbol, handle)| Self::quote_row(symbol, &handle.snapshot()))
      .collect();

    let header = Row::new(vec!["Symbol", "Price", "Change", "Change%", "Volume", "Age"])
      .style(Style::default().fg(Color::DarkGray).bold());

    let table = Table::new(
      rows,
      [
        Constraint::Length(8),
        Constraint::Length(11),
        Constraint::Length(9),
        Constraint::Length(9),
        Constraint::Length(12),
        Constraint::Length(6),
      ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }

  fn render_sentiment(&self, frame: &mut Frame, area: Rect) {
    let view = self.sentiment.snapshot();
    let block = Block::default()
      .title(resource_title("Sentiment", &view, None))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let Some(summary) = view.value.as_deref() else {
      let paragraph = Paragraph::new(empty_message(&view, self.ctx.locale, ""))
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    };

    let total = summary.total().max(1);
    let bar_width = area.width.saturating_sub(24) as u64;
    let bar = |count: u64, label: &'static str, color: Color| {
      let filled = bar_cells(count, total, bar_width);
      Line::from(vec![
        Span::styled(format!("{:<9}", label), Style::default().fg(color)),
        Span::styled(format!("{:>6} ", count), Style::default().fg(Color::White)),
        Span::styled("█".repeat(filled), Style::default().fg(color)),
      ])
    };

    let mut lines = vec![
      bar(summary.positive, "positive", Color::Green),
      bar(summary.neutral, "neutral", Color::Gray),
      bar(summary.negative, "negative", Color::Red),
      Line::from(vec![
        Span::styled("average  ", Style::default().fg(Color::DarkGray)),
        Span::styled(
          format_signed(summary.average_score, 3),
          Style::default().fg(change_color(summary.average_score)),
        ),
      ]),
      Line::from(""),
    ];

    let mut by_source: Vec<_> = summary.by_source.iter().collect();
    by_source.sort_by(|a, b| b.article_count.cmp(&a.article_count));
    for source in by_source {
      lines.push(Line::from(vec![
        Span::styled(format!("{:<18}", source.source), Style::default().fg(Color::Cyan)),
        Span::styled(
          format!("{:>7} ", format_signed(source.average_score, 2)),
          Style::default().fg(change_color(source.average_score)),
        ),
        Span::styled(
          format!("{} articles", source.article_count),
          Style::default().fg(Color::DarkGray),
        ),
      ]));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn selected(&self) -> Option<&ResourceHandle<StockQuote>> {
    let idx = self.table_state.selected()?;
    self.quotes.get(idx).map(|(_, handle)| handle)
  }
}

impl View for MarketsView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Char('r') => {
        // Selected quote, or the sentiment panel when nothing is selected
        let result = match self.selected() {
          Some(handle) => handle.refetch(),
          None => self.sentiment.refetch(),
        };
        return refresh_outcome(result);
      }
      KeyCode::Char('S') => return refresh_outcome(self.sentiment.refetch()),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
      .split(area);

    self.render_quotes(frame, chunks[0]);
    self.render_sentiment(frame, chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    "Markets".to_string()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh quote").with_priority(40),
      ShortcutInfo::new("S", "refresh sentiment").with_priority(45),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }

  fn is_showing_stale(&self) -> bool {
    self.sentiment.snapshot().is_stale || self.quotes.iter().any(|(_, h)| h.snapshot().is_stale)
  }
}

/// Error code shown in place of a quote that failed to load.
fn error_note<R>(view: &ResourceView<R>) -> String {
  view
    .error
    .as_ref()
    .map(|error| error.kind.code())
    .unwrap_or_default()
}

/// Cells of a sentiment bar `width` wide for `count` out of `total`.
fn bar_cells(count: u64, total: u64, width: u64) -> usize {
  let total = u128::from(total.max(1));
  let filled = u128::from(count.min(total as u64)) * u128::from(width) / total;
  filled as usize
}
