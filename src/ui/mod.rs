pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use ratatui::prelude::*;
use ratatui::widgets::ListState;
use tokio::time::Instant;

use crate::app::App;
use renderfns::{draw_banner, draw_footer, draw_header, Banner};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let connectivity = app.connectivity_state();
  let quota = app.rate_limit_state();
  let showing_stale = app.current_view().is_some_and(|v| v.is_showing_stale());
  let banner = Banner::select(&connectivity, &quota, showing_stale, Instant::now());

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1),                                  // Header
      Constraint::Length(if banner.is_some() { 1 } else { 0 }), // Banner
      Constraint::Min(1),                                     // Main content
      Constraint::Length(1),                                  // Footer
    ])
    .split(frame.area());

  let shortcuts = app
    .current_view()
    .map(|v| v.shortcuts())
    .unwrap_or_default();

  draw_header(
    frame,
    chunks[0],
    app.title(),
    &connectivity,
    &quota,
    &shortcuts,
  );

  if let Some(banner) = banner {
    draw_banner(frame, chunks[1], banner, app.locale());
  }

  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[2]);
  }

  draw_footer(
    frame,
    chunks[3],
    &app.breadcrumb(),
    &shortcuts,
    app.notice(),
  );

  app.command_input().render_overlay(frame, chunks[2]);
}

/// Clamp a selection to `len` items, selecting the first when empty-handed
pub fn clamp_selection(selected: Option<usize>, len: usize) -> Option<usize> {
  if len == 0 {
    return None;
  }
  Some(selected.map_or(0, |i| i.min(len - 1)))
}

/// Keep a list selection valid as its data changes underneath it
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  let selected = clamp_selection(state.selected(), len);
  state.select(selected);
}
