use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::cache::CacheEvent;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh
  Tick,
  /// Terminal gained (true) or lost (false) focus
  Focus(bool),
  /// A cache entry changed; redraw
  Cache(CacheEvent),
}

/// Event handler that merges terminal input, a tick timer and cache
/// notifications into one stream
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  pub fn new(tick_rate: Duration, mut cache_events: broadcast::Receiver<CacheEvent>) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Terminal reader. crossterm polling blocks, so it gets its own thread.
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
          Ok(CrosstermEvent::FocusGained) => Some(Event::Focus(true)),
          Ok(CrosstermEvent::FocusLost) => Some(Event::Focus(false)),
          Ok(CrosstermEvent::Resize(..)) => Some(Event::Tick),
          _ => None,
        }
      } else {
        Some(Event::Tick)
      };

      if let Some(event) = event {
        if input_tx.send(event).is_err() {
          break;
        }
      }
    });

    tokio::spawn(async move {
      loop {
        match cache_events.recv().await {
          Ok(event) => {
            if tx.send(Event::Cache(event)).is_err() {
              break;
            }
          }
          // Missed some; the next draw reads current state anyway.
          Err(broadcast::error::RecvError::Lagged(_)) => continue,
          Err(broadcast::error::RecvError::Closed) => break,
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
