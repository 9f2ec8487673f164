mod api;
mod app;
mod cache;
mod commands;
mod config;
mod engine;
mod event;
mod resources;
mod sync;
mod ui;

use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "NEWSDASH_LOG";

#[derive(Parser, Debug)]
#[command(name = "newsdash")]
#[command(about = "A terminal dashboard for news, sentiment and market data")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./newsdash.yaml, then $XDG_CONFIG_HOME/newsdash/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL, e.g. http://localhost:8000/api/v1
  #[arg(short, long)]
  base_url: Option<String>,

  /// Add a ticker symbol to the watchlist (repeatable)
  #[arg(short, long = "symbol")]
  symbols: Vec<String>,

  /// Log file (default: $XDG_CACHE_HOME/newsdash/newsdash.log)
  #[arg(long)]
  log_file: Option<PathBuf>,
}

/// Route tracing to a file; the terminal belongs to the UI.
fn init_tracing(log_file: Option<&Path>) -> Result<WorkerGuard> {
  let path = match log_file {
    Some(path) => path.to_path_buf(),
    None => dirs::cache_dir()
      .map(|dir| dir.join("newsdash").join("newsdash.log"))
      .ok_or_else(|| eyre!("no cache directory; pass --log-file"))?,
  };

  let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("log file path has no file name: {}", path.display()))?;
  std::fs::create_dir_all(dir)?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_writer(writer)
    .with_ansi(false)
    .with_env_filter(filter)
    .try_init()
    .map_err(|e| eyre!("failed to install log subscriber: {}", e))?;

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_tracing(args.log_file.as_deref())?;

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Command line wins over file and environment
  if let Some(base_url) = args.base_url {
    config.api.base_url = base_url;
  }
  config.watchlist.extend(args.symbols);

  tracing::info!(base_url = %config.api.base_url, "starting newsdash");

  // Initialize and run the app
  let mut app = app::App::new(config)?;
  app.run().await?;

  Ok(())
}
