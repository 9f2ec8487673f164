use color_eyre::Result;
use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::collections::BTreeSet;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::api::Locale;
use crate::commands::{self, Action};
use crate::config::Config;
use crate::engine::Engine;
use crate::event::{Event, EventHandler};
use crate::sync::{ConnectivityState, RateLimitState, Visibility};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::extract_host;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{ArticleListView, MarketsView, StatusView, ViewContext};

const TICK_RATE: Duration = Duration::from_millis(250);
const NOTICE_TTL: Duration = Duration::from_secs(4);

/// Main application state
pub struct App {
  engine: Engine,
  ctx: ViewContext,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Command prompt opened with `:`
  command_input: CommandInput,

  /// Symbols shown on the markets view; `:quote` adds to it for the session
  watchlist: BTreeSet<String>,

  connectivity: watch::Receiver<ConnectivityState>,
  /// Header label: configured title or the API host
  title: String,
  notice: Option<(String, Instant)>,
  should_quit: bool,
}

impl App {
  /// Build the engine and the root view. Must run inside the tokio runtime.
  pub fn new(config: Config) -> Result<Self> {
    let mut engine = Engine::new(&config)?;
    engine.start();

    let ctx = ViewContext {
      resources: engine.resources().clone(),
      locale: config.locale,
    };
    let root: Box<dyn View> = Box::new(ArticleListView::new(ctx.clone()));

    // One-off health check so the log records which server we talk to
    let health = ctx.resources.health(false);
    tokio::spawn(async move {
      match health.ensure().await {
        Ok(health) => info!(
          status = %health.status,
          version = health.version.as_deref().unwrap_or("unknown"),
          "api reachable"
        ),
        Err(error) => warn!(%error, "initial health check failed"),
      }
    });

    Ok(Self {
      connectivity: engine.connectivity(),
      title: config
        .title
        .clone()
        .unwrap_or_else(|| extract_host(engine.base_url())),
      engine,
      ctx,
      view_stack: vec![root],
      command_input: CommandInput::new(),
      watchlist: config.watchlist.symbols,
      notice: None,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.main_loop(&mut terminal).await;

    // Cleanup terminal, even when the loop failed
    stdout().execute(DisableFocusChange)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    self.engine.shutdown();

    result
  }

  async fn main_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE, self.engine.cache_events());

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.expire_notice(),
      Event::Focus(focused) => {
        let visibility = if focused {
          Visibility::Visible
        } else {
          Visibility::Hidden
        };
        debug!(
          ?visibility,
          polling = self.engine.scheduler().active_count(),
          "terminal focus changed"
        );
        self.engine.set_visibility(visibility);
      }
      // Redraw happens on the next loop iteration
      Event::Cache(event) => trace!(key = %event.key(), "cache changed"),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // Command prompt first, then the current view
    match self.command_input.handle_key(key) {
      KeyResult::Handled | KeyResult::Event(CommandEvent::Cancelled) => return,
      KeyResult::Event(CommandEvent::Submitted(line)) => {
        self.execute_command(&line);
        return;
      }
      KeyResult::NotHandled => {}
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::Pop,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Notify(message) => self.notify(message),
    }
  }

  fn execute_command(&mut self, line: &str) {
    let action = match commands::parse(line) {
      Ok(action) => action,
      Err(message) => {
        self.notify(message);
        return;
      }
    };

    info!(?action, "command");
    match action {
      Action::News => self.set_root(Box::new(ArticleListView::new(self.ctx.clone()))),
      Action::Search(query) => {
        self.set_root(Box::new(ArticleListView::search(self.ctx.clone(), query)))
      }
      Action::Markets => self.show_markets(),
      Action::Quote(symbol) => {
        self.watchlist.insert(symbol);
        self.show_markets();
      }
      Action::Status => self.set_root(Box::new(StatusView::new(self.ctx.clone()))),
      Action::Refresh => match self.ctx.resources.refresh_all() {
        Ok(count) => self.notify(format!("refreshing {} cached resources", count)),
        Err(rejected) => {
          warn!(%rejected, "refresh refused");
          self.notify(rejected.to_string());
        }
      },
      Action::Quit => self.should_quit = true,
    }
  }

  fn show_markets(&mut self) {
    let view = MarketsView::new(self.ctx.clone(), &self.watchlist);
    self.set_root(Box::new(view));
  }

  /// Replace the whole stack. Dropped views release their subscriptions.
  fn set_root(&mut self, view: Box<dyn View>) {
    self.view_stack.clear();
    self.view_stack.push(view);
  }

  fn notify(&mut self, message: String) {
    self.notice = Some((message, Instant::now()));
  }

  fn expire_notice(&mut self) {
    if let Some((_, at)) = &self.notice {
      if at.elapsed() >= NOTICE_TTL {
        self.notice = None;
      }
    }
  }

  // ==========================================================================
  // Accessors for drawing
  // ==========================================================================

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.view_stack.iter().map(|v| v.breadcrumb_label()).collect()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command_input
  }

  pub fn connectivity_state(&self) -> ConnectivityState {
    *self.connectivity.borrow()
  }

  pub fn rate_limit_state(&self) -> RateLimitState {
    self.engine.rate_limit_state()
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn locale(&self) -> Locale {
    self.ctx.locale
  }

  pub fn notice(&self) -> Option<&str> {
    self.notice.as_ref().map(|(message, _)| message.as_str())
  }
}
