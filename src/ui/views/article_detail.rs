use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use std::sync::Arc;

use super::{refresh_outcome, resource_title, ViewContext};
use crate::api::types::Article;
use crate::resources::ResourceHandle;
use crate::ui::renderfns::{format_signed, sentiment_color, truncate};
use crate::ui::view::{View, ViewAction};

/// Full article, seeded with the list row until the detail arrives
pub struct ArticleDetailView {
  ctx: ViewContext,
  summary: Arc<Article>,
  handle: ResourceHandle<Article>,
  scroll: u16,
}

impl ArticleDetailView {
  pub fn new(ctx: ViewContext, article: Article) -> Self {
    let handle = ctx.resources.article_from_row(&article, false);
    Self {
      ctx,
      summary: Arc::new(article),
      handle,
      scroll: 0,
    }
  }

  fn meta_lines(article: &Article) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let published = article
      .published_at
      .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
      .unwrap_or_else(|| "-".to_string());

    let sentiment = match (article.sentiment, article.sentiment_score) {
      (Some(s), Some(score)) => format!("{} ({})", s.as_str(), format_signed(score, 2)),
      (Some(s), None) => s.as_str().to_string(),
      (None, _) => "-".to_string(),
    };

    let tickers = if article.tickers.is_empty() {
      "-".to_string()
    } else {
      article.tickers.join(", ")
    };

    vec![
      Line::from(vec![
        Span::styled("Source:    ", label),
        Span::styled(article.source.clone(), Style::default().fg(Color::Cyan)),
      ]),
      Line::from(vec![
        Span::styled("Published: ", label),
        Span::raw(published),
      ]),
      Line::from(vec![
        Span::styled("Sentiment: ", label),
        Span::styled(sentiment, Style::default().fg(sentiment_color(article.sentiment))),
      ]),
      Line::from(vec![
        Span::styled("Tickers:   ", label),
        Span::styled(tickers, Style::default().fg(Color::Yellow)),
      ]),
      Line::from(vec![
        Span::styled("URL:       ", label),
        Span::styled(article.url.clone(), Style::default().fg(Color::Blue)),
      ]),
    ]
  }
}

impl View for ArticleDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.scroll = self.scroll.saturating_add(1);
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.scroll = self.scroll.saturating_sub(1);
      }
      KeyCode::PageDown => self.scroll = self.scroll.saturating_add(10),
      KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(10),
      KeyCode::Char('r') => return refresh_outcome(self.handle.refetch()),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let view = self.handle.snapshot();
    let article = view.value.clone().unwrap_or_else(|| self.summary.clone());

    let block = Block::default()
      .title(resource_title(&format!("#{}", article.id), &view, None))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(2), // Title
        Constraint::Length(6), // Metadata
        Constraint::Min(1),    // Body
      ])
      .split(inner);

    let title = Paragraph::new(article.title.clone())
      .style(Style::default().fg(Color::White).bold())
      .wrap(Wrap { trim: true });
    frame.render_widget(title, chunks[0]);

    frame.render_widget(Paragraph::new(Self::meta_lines(&article)), chunks[1]);

    let body = article
      .content
      .as_deref()
      .or(article.summary.as_deref())
      .map(str::to_string)
      .unwrap_or_else(|| match &view.error {
        Some(error) => error.user_message(self.ctx.locale),
        None => "No text available for this article.".to_string(),
      });

    let body = Paragraph::new(body)
      .wrap(Wrap { trim: false })
      .scroll((self.scroll, 0));
    frame.render_widget(body, chunks[2]);
  }

  fn breadcrumb_label(&self) -> String {
    truncate(&self.summary.title, 40)
  }

  fn is_showing_stale(&self) -> bool {
    self.handle.snapshot().is_stale
  }
}
