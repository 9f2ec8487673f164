use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Result of handling a key event in an input component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResult {
  /// Key was handled, continue input mode
  Consumed,
  /// Enter pressed, here's the submitted value
  Submitted(String),
  /// Escape pressed, input cancelled
  Cancelled,
  /// Key not handled, pass to next handler
  NotHandled,
}

/// Reusable text input component
#[derive(Debug, Clone, Default)]
pub struct TextInput {
  buffer: String,
  cursor: usize,
}

impl TextInput {
  /// Get the current input value
  pub fn value(&self) -> &str {
    &self.buffer
  }

  /// Clear the input
  pub fn clear(&mut self) {
    self.buffer.clear();
    self.cursor = 0;
  }

  /// Byte offset of the char at `cursor`
  fn byte_index(&self, cursor: usize) -> usize {
    self
      .buffer
      .char_indices()
      .nth(cursor)
      .map(|(i, _)| i)
      .unwrap_or(self.buffer.len())
  }

  fn char_len(&self) -> usize {
    self.buffer.chars().count()
  }

  /// Handle a key event, returning the result
  pub fn handle_key(&mut self, key: KeyEvent) -> InputResult {
    match key.code {
      KeyCode::Esc => InputResult::Cancelled,
      KeyCode::Enter => InputResult::Submitted(self.buffer.clone()),
      KeyCode::Backspace => {
        if self.cursor > 0 {
          self.cursor -= 1;
          let at = self.byte_index(self.cursor);
          self.buffer.remove(at);
        }
        InputResult::Consumed
      }
      KeyCode::Delete => {
        if self.cursor < self.char_len() {
          let at = self.byte_index(self.cursor);
          self.buffer.remove(at);
        }
        InputResult::Consumed
      }
      KeyCode::Left => {
        self.cursor = self.cursor.saturating_sub(1);
        InputResult::Consumed
      }
      KeyCode::Right => {
        if self.cursor < self.char_len() {
          self.cursor += 1;
        }
        InputResult::Consumed
      }
      KeyCode::Home => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::End => {
        self.cursor = self.char_len();
        InputResult::Consumed
      }
      KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char('e') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.cursor = self.char_len();
        InputResult::Consumed
      }
      KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        // Clear line before cursor
        let at = self.byte_index(self.cursor);
        self.buffer = self.buffer[at..].to_string();
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        // Delete word before cursor
        if self.cursor > 0 {
          let at = self.byte_index(self.cursor);
          let before = &self.buffer[..at];
          let cut = before.trim_end().rfind(' ').map(|i| i + 1).unwrap_or(0);
          self.cursor = self.buffer[..cut].chars().count();
          self.buffer = format!("{}{}", &self.buffer[..cut], &self.buffer[at..]);
        }
        InputResult::Consumed
      }
      KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => InputResult::NotHandled,
      KeyCode::Char(c) => {
        let at = self.byte_index(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
        InputResult::Consumed
      }
      _ => InputResult::NotHandled,
    }
  }

  /// Text before and after the cursor, for rendering a caret between them
  pub fn split_at_cursor(&self) -> (&str, &str) {
    self.buffer.split_at(self.byte_index(self.cursor))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn ctrl_key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::CONTROL)
  }

  #[test]
  fn test_basic_input() {
    let mut input = TextInput::default();
    assert!(input.value().is_empty());

    input.handle_key(key(KeyCode::Char('h')));
    input.handle_key(key(KeyCode::Char('i')));
    assert_eq!(input.value(), "hi");
  }

  #[test]
  fn test_submit() {
    let mut input = TextInput::default();
    input.handle_key(key(KeyCode::Char('t')));
    input.handle_key(key(KeyCode::Char('e')));
    input.handle_key(key(KeyCode::Char('s')));
    input.handle_key(key(KeyCode::Char('t')));

    let result = input.handle_key(key(KeyCode::Enter));
    assert_eq!(result, InputResult::Submitted("test".to_string()));
  }

  #[test]
  fn test_cancel() {
    let mut input = TextInput::default();
    input.handle_key(key(KeyCode::Char('x')));

    let result = input.handle_key(key(KeyCode::Esc));
    assert_eq!(result, InputResult::Cancelled);
  }

  #[test]
  fn test_backspace() {
    let mut input = TextInput::default();
    input.handle_key(key(KeyCode::Char('a')));
    input.handle_key(key(KeyCode::Char('b')));
    input.handle_key(key(KeyCode::Char('c')));
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "ab");
  }

  #[test]
  fn test_cursor_movement() {
    let mut input = TextInput::default();
    input.handle_key(key(KeyCode::Char('a')));
    input.handle_key(key(KeyCode::Char('c')));
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Char('b')));
    assert_eq!(input.value(), "abc");
  }

  #[test]
  fn test_ctrl_u_clear_before_cursor() {
    let mut input = TextInput::default();
    for c in "hello world".chars() {
      input.handle_key(key(KeyCode::Char(c)));
    }
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Left));
    input.handle_key(ctrl_key(KeyCode::Char('u')));
    assert_eq!(input.value(), "world");
  }

  #[test]
  fn test_multibyte_editing() {
    let mut input = TextInput::default();
    for c in "año".chars() {
      input.handle_key(key(KeyCode::Char(c)));
    }
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "ao");
    assert_eq!(input.split_at_cursor(), ("a", "o"));
  }

  #[test]
  fn test_ctrl_w_deletes_word() {
    let mut input = TextInput::default();
    for c in "fed rate cut".chars() {
      input.handle_key(key(KeyCode::Char(c)));
    }
    input.handle_key(ctrl_key(KeyCode::Char('w')));
    assert_eq!(input.value(), "fed rate ");
  }
}
