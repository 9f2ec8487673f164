use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use super::{empty_message, refresh_outcome, resource_title, ViewContext};
use crate::api::types::{Article, ArticlePage};
use crate::api::{ListParams, SortOrder};
use crate::resources::ResourceHandle;
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{sentiment_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::ArticleDetailView;

const PAGE_SIZE: u32 = 25;
const SORT_FIELD: &str = "published_at";

/// Latest articles or search results
#[derive(Debug, Clone, PartialEq, Eq)]
enum Listing {
  Latest { offset: u32, order: SortOrder },
  Search(String),
}

/// Paged article list with search
pub struct ArticleListView {
  ctx: ViewContext,
  listing: Listing,
  handle: ResourceHandle<ArticlePage>,
  list_state: ListState,
  search: SearchInput,
}

impl ArticleListView {
  pub fn new(ctx: ViewContext) -> Self {
    Self::with_listing(
      ctx,
      Listing::Latest {
        offset: 0,
        order: SortOrder::Desc,
      },
    )
  }

  pub fn search(ctx: ViewContext, query: String) -> Self {
    Self::with_listing(ctx, Listing::Search(query))
  }

  fn with_listing(ctx: ViewContext, listing: Listing) -> Self {
    let handle = Self::subscribe(&ctx, &listing);
    Self {
      ctx,
      listing,
      handle,
      list_state: ListState::default(),
      search: SearchInput::new(),
    }
  }

  fn subscribe(ctx: &ViewContext, listing: &Listing) -> ResourceHandle<ArticlePage> {
    match listing {
      Listing::Latest { offset, order } => {
        let params = ListParams::page(PAGE_SIZE, *offset).sorted_by(SORT_FIELD, *order);
        ctx.resources.articles(&params, true)
      }
      Listing::Search(query) => ctx.resources.search_articles(query, true),
    }
  }

  /// Switch listing; the old handle is dropped and its key left to the GC.
  fn show(&mut self, listing: Listing) {
    if listing == self.listing {
      return;
    }
    self.handle = Self::subscribe(&self.ctx, &listing);
    self.listing = listing;
    self.list_state.select(Some(0));
  }

  fn has_more(&self) -> bool {
    self
      .handle
      .snapshot()
      .value
      .and_then(|page| page.pagination.as_ref().map(|p| p.has_more))
      .unwrap_or(false)
  }

  fn next_page(&mut self) {
    if let Listing::Latest { offset, order } = self.listing {
      if self.has_more() {
        self.show(Listing::Latest {
          offset: offset + PAGE_SIZE,
          order,
        });
      }
    }
  }

  fn previous_page(&mut self) {
    if let Listing::Latest { offset, order } = self.listing {
      if offset > 0 {
        self.show(Listing::Latest {
          offset: offset.saturating_sub(PAGE_SIZE),
          order,
        });
      }
    }
  }

  fn toggle_sort(&mut self) {
    if let Listing::Latest { order, .. } = self.listing {
      self.show(Listing::Latest {
        offset: 0,
        order: order.toggled(),
      });
    }
  }

  fn selected_article(&self) -> Option<Article> {
    let idx = self.list_state.selected()?;
    let page = self.handle.snapshot().value?;
    page.articles.get(idx).cloned()
  }

  fn title_label(&self) -> String {
    match &self.listing {
      Listing::Latest { offset, order } => {
        let page = offset / PAGE_SIZE + 1;
        format!("Articles p{} {}", page, order)
      }
      Listing::Search(query) => format!("Search \"{}\"", truncate(query, 30)),
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let view = self.handle.snapshot();
    let articles: &[Article] = view.value.as_deref().map(|p| p.articles.as_slice()).unwrap_or(&[]);
    ensure_valid_selection(&mut self.list_state, articles.len());

    let total = view
      .value
      .as_ref()
      .and_then(|p| p.pagination.as_ref().map(|p| p.total as usize))
      .or(view.value.as_ref().map(|p| p.articles.len()));

    let block = Block::default()
      .title(resource_title(&self.title_label(), &view, total))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if articles.is_empty() {
      let empty = match self.listing {
        Listing::Latest { .. } => "No articles yet.",
        Listing::Search(_) => "No articles match this search.",
      };
      let paragraph = Paragraph::new(empty_message(&view, self.ctx.locale, empty))
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let title_width = area.width.saturating_sub(40) as usize;
    let items: Vec<ListItem> = articles
      .iter()
      .map(|article| {
        let published = article
          .published_at
          .map(|at| at.format("%m-%d %H:%M").to_string())
          .unwrap_or_else(|| "--".to_string());
        let sentiment = article.sentiment.map(|s| s.as_str()).unwrap_or("-");

        let line = Line::from(vec![
          Span::styled(
            format!("{:<12}", published),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(
            format!("{:<14}", truncate(&article.source, 13)),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(
            format!("{:<9}", sentiment),
            Style::default().fg(sentiment_color(article.sentiment)),
          ),
          Span::raw(truncate(&article.title, title_width.max(10))),
        ]);
        ListItem::new(line)
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for ArticleListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.search.handle_key(key) {
      KeyResult::Handled => return ViewAction::None,
      KeyResult::Event(SearchEvent::Submitted(query)) => {
        self.show(Listing::Search(query));
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Cleared) => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('n') | KeyCode::PageDown => self.next_page(),
      KeyCode::Char('p') | KeyCode::PageUp => self.previous_page(),
      KeyCode::Char('s') => self.toggle_sort(),
      KeyCode::Char('r') => return refresh_outcome(self.handle.refetch()),
      KeyCode::Enter => {
        if let Some(article) = self.selected_article() {
          return ViewAction::Push(Box::new(ArticleDetailView::new(self.ctx.clone(), article)));
        }
      }
      KeyCode::Esc if matches!(self.listing, Listing::Search(_)) => {
        // Leave search results for the latest list
        self.show(Listing::Latest {
          offset: 0,
          order: SortOrder::Desc,
        });
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.title_label()
  }

  fn is_showing_stale(&self) -> bool {
    self.handle.snapshot().is_stale
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    if self.search.is_active() {
      return vec![
        ShortcutInfo::new("Enter", "search").with_priority(10).when_active(),
        ShortcutInfo::new("Esc", "cancel").with_priority(20).when_active(),
      ];
    }

    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ];
    if matches!(self.listing, Listing::Latest { .. }) {
      shortcuts.push(ShortcutInfo::new("n/p", "page").with_priority(30));
      shortcuts.push(ShortcutInfo::new("s", "sort").with_priority(35));
    }
    shortcuts
  }
}
