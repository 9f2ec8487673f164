use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Enter pressed with a non-empty query
  Submitted(String),
  /// Escape pressed, or Enter on an empty query
  Cleared,
}

/// Search prompt opened with `/`
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.input.clear();
  }

  /// Handle a key event
  /// Call this regardless of active state - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(query) => {
        self.active = false;
        let query = query.trim().to_string();
        if query.is_empty() {
          KeyResult::Event(SearchEvent::Cleared)
        } else {
          KeyResult::Event(SearchEvent::Submitted(query))
        }
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Cleared)
      }
      // While open, the prompt swallows every key
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Render the search overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, 3.min(area.height));

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Search articles ");

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let (before, after) = self.input.split_at_cursor();
    let input_line = Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(before.to_string()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
      Span::raw(after.to_string()),
    ]);
    frame.render_widget(Paragraph::new(input_line), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_slash_activates() {
    let mut search = SearchInput::new();
    assert_eq!(search.handle_key(key(KeyCode::Char('x'))), KeyResult::NotHandled);
    assert_eq!(search.handle_key(key(KeyCode::Char('/'))), KeyResult::Handled);
    assert!(search.is_active());
  }

  #[test]
  fn test_submit_trims_query() {
    let mut search = SearchInput::new();
    search.activate();
    for c in " oil ".chars() {
      search.handle_key(key(KeyCode::Char(c)));
    }
    assert_eq!(
      search.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(SearchEvent::Submitted("oil".to_string()))
    );
    assert!(!search.is_active());
  }

  #[test]
  fn test_empty_submit_clears() {
    let mut search = SearchInput::new();
    search.activate();
    assert_eq!(
      search.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(SearchEvent::Cleared)
    );
  }

  #[test]
  fn test_active_prompt_swallows_navigation() {
    let mut search = SearchInput::new();
    search.activate();
    assert_eq!(search.handle_key(key(KeyCode::Tab)), KeyResult::Handled);
  }
}
