mod article_detail;
mod articles;
mod markets;
mod status;

pub use article_detail::ArticleDetailView;
pub use articles::ArticleListView;
pub use markets::MarketsView;
pub use status::StatusView;

use ratatui::prelude::*;

use crate::api::Locale;
use crate::resources::{ResourceView, Resources};
use crate::sync::RefreshRejected;
use crate::ui::renderfns::{cache_status_color, format_age};
use crate::ui::view::ViewAction;

/// What every view needs to reach the engine
#[derive(Clone)]
pub struct ViewContext {
  pub resources: Resources,
  pub locale: Locale,
}

/// Block title for a panel backed by one resource: label, optional count,
/// then a status marker with the age of the data.
fn resource_title<R>(label: &str, view: &ResourceView<R>, count: Option<usize>) -> Line<'static> {
  let mut spans = vec![Span::styled(
    format!(" {} ", label),
    Style::default().fg(Color::White).bold(),
  )];

  if let Some(count) = count {
    spans.push(Span::styled(
      format!("({}) ", count),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let marker = if view.is_loading() {
    "loading".to_string()
  } else if view.error.is_some() {
    match view.age {
      Some(age) => format!("error, last ok {} ago", format_age(age)),
      None => "error".to_string(),
    }
  } else {
    match view.age {
      Some(age) => format!("{} ago", format_age(age)),
      None => "waiting".to_string(),
    }
  };

  spans.push(Span::styled(
    format!("· {} ", marker),
    Style::default().fg(cache_status_color(view.status, view.is_stale)),
  ));

  Line::from(spans)
}

/// Placeholder text when a panel has nothing to show yet
fn empty_message<R>(view: &ResourceView<R>, locale: Locale, empty: &str) -> String {
  match &view.error {
    Some(error) => error.user_message(locale),
    None if view.value.is_none() => match locale {
      Locale::En => "Loading...".to_string(),
      Locale::Es => "Cargando...".to_string(),
    },
    None => empty.to_string(),
  }
}

fn refresh_outcome(result: Result<(), RefreshRejected>) -> ViewAction {
  match result {
    Ok(()) => ViewAction::None,
    Err(rejected) => ViewAction::Notify(rejected.to_string()),
  }
}
