mod client;
mod config;
mod constants;
mod error;
mod pagination;
mod store;
mod thumbnail;
mod youtube;

use anyhow::{Context, Result, bail};
use clap::Parser;
use image::DynamicImage;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use client::{FetchClient, PageRequest};
use config::{Config, project_dirs};
use constants::constants;
use error::FetchError;
use pagination::{ErrorReporter, FailurePolicy, LogReporter, PaginationController};
use store::ResultStore;
use thumbnail::ImageFetcher;
use youtube::{SearchResult, share_url, video_id_from_thumbnail};

/// Environment variable holding the API credential.
const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// API key for the search endpoint (falls back to $YOUTUBE_API_KEY, then prefs.toml)
  #[arg(long)]
  api_key: Option<String>,

  /// Free-text search query
  #[arg(short, long)]
  query: Option<String>,

  /// Results per page
  #[arg(short = 'n', long)]
  page_size: Option<usize>,

  /// Stop after showing this many results
  #[arg(short, long, default_value_t = 100)]
  limit: usize,

  /// Download each result's thumbnail and report its size
  #[arg(short, long)]
  thumbnails: bool,

  /// Re-request a failed page on the next scroll trigger instead of skipping it
  #[arg(long)]
  rewind_failed: bool,

  /// Log to stderr instead of the log file
  #[arg(long)]
  log_stderr: bool,
}

/// Effective settings after layering CLI > environment > prefs > constants.
#[derive(Debug, PartialEq, Eq)]
struct Settings {
  api_key: String,
  query: Option<String>,
  page_size: NonZeroUsize,
  policy: FailurePolicy,
}

fn resolve_settings(args: &Args, config: Config, env_key: Option<String>) -> Result<Settings> {
  let Some(api_key) =
    args.api_key.clone().or(env_key).or(config.api_key).map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
  else {
    bail!("No API key. Pass --api-key, set {}, or add api_key to prefs.toml", API_KEY_ENV);
  };

  let size = args.page_size.or(config.page_size).unwrap_or(constants().page_size);
  let Some(page_size) = NonZeroUsize::new(size) else {
    bail!("Page size must be greater than zero");
  };

  let policy = if args.rewind_failed {
    FailurePolicy::Rewind
  } else {
    config.failure_policy.as_deref().map(FailurePolicy::from_config).unwrap_or_default()
  };

  let query = args.query.clone().or(config.query).filter(|q| !q.trim().is_empty());
  Ok(Settings { api_key, query, page_size, policy })
}

// --- Output ---

fn format_result(index: usize, result: &SearchResult) -> String {
  let mut out = format!("{:>4}. {}", index + 1, result.title);
  if !result.description.is_empty() {
    out.push_str(&format!("\n      {}", result.description));
  }
  match video_id_from_thumbnail(&result.thumbnail_url) {
    Some(id) => out.push_str(&format!("\n      {}", share_url(&id))),
    None => out.push_str("\n      (no video link)"),
  }
  out
}

fn format_thumbnail(thumb: Option<&DynamicImage>) -> String {
  match thumb {
    Some(image) => format!("      thumbnail {}x{}", image.width(), image.height()),
    None => "      thumbnail [placeholder]".to_string(),
  }
}

/// Logs like the default reporter and also tells the user the list stopped growing.
struct ConsoleReporter;

impl ErrorReporter for ConsoleReporter {
  fn report(&self, request: PageRequest, error: &FetchError) {
    LogReporter.report(request, error);
    eprintln!("-- page {} could not be loaded: {}", request.page, error);
  }
}

// --- Logging ---

/// Install the tracing subscriber. Logs go to a file in the cache dir unless
/// `to_stderr` is set or no cache dir is available. The returned guard must
/// live until exit so buffered lines are flushed.
fn init_tracing(to_stderr: bool) -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  if !to_stderr
    && let Some(dirs) = project_dirs()
    && std::fs::create_dir_all(dirs.cache_dir()).is_ok()
  {
    let appender = tracing_appender::rolling::never(dirs.cache_dir(), "ytpage.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry().with(fmt::layer().with_writer(writer).with_ansi(false)).with(filter).init();
    return Some(guard);
  }

  tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
  None
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = init_tracing(args.log_stderr);
  run(args).await
}

async fn run(args: Args) -> Result<()> {
  let settings = resolve_settings(&args, Config::load(), std::env::var(API_KEY_ENV).ok())?;
  info!(
    page_size = settings.page_size.get(),
    policy = settings.policy.label(),
    query = settings.query.as_deref().unwrap_or(""),
    "session: starting"
  );

  let client = FetchClient::new(settings.api_key, settings.query).context("Failed to set up search client")?;
  let images = if args.thumbnails { Some(ImageFetcher::new().context("Failed to set up image client")?) } else { None };

  let mut store = ResultStore::new();
  let mut changes = store.subscribe();
  let mut controller =
    PaginationController::new(Arc::new(client), store, settings.page_size)
      .with_reporter(Arc::new(ConsoleReporter))
      .with_failure_policy(settings.policy);

  controller.load_page();

  // Walk the list the way a scrolling view would: show each loaded row,
  // report it as visible, and pick up whatever page that brings in.
  let mut shown = 0;
  loop {
    controller.settle().await;
    while let Ok(snapshot) = changes.try_recv() {
      println!("-- {} results loaded ({} available)", snapshot.len(), controller.store().total_available());
    }

    let end = controller.store().count().min(args.limit);
    if shown >= end {
      break;
    }
    let batch = controller.store().items()[shown..end].to_vec();
    let thumbs = match images {
      Some(ref fetcher) => fetcher.fetch_batch(&batch).await,
      None => vec![None; batch.len()],
    };

    for (offset, (result, thumb)) in batch.iter().zip(&thumbs).enumerate() {
      let index = shown + offset;
      println!("{}", format_result(index, result));
      if images.is_some() {
        println!("{}", format_thumbnail(thumb.as_ref()));
      }
      controller.on_item_becomes_visible(index);
    }
    shown = end;
  }

  // Don't wait on a page nobody will scroll to, but count it if it already landed.
  controller.check_pending();
  if controller.is_loading() {
    info!(page = controller.current_page(), "session: leaving with a page still in flight");
  }

  if shown == 0 {
    println!("No results loaded.");
  } else {
    println!(
      "-- showed {} of {} loaded, {} reported by server (page {})",
      shown,
      controller.store().count(),
      controller.store().total_available(),
      controller.current_page()
    );
  }
  info!(shown, loaded = controller.store().count(), "session: finished");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(extra: &[&str]) -> Args {
    Args::parse_from(std::iter::once("ytpage").chain(extra.iter().copied()))
  }

  // --- resolve_settings ---

  #[test]
  fn settings_defaults_from_constants() {
    let settings = resolve_settings(&args(&["--api-key", "k"]), Config::default(), None).unwrap();
    assert_eq!(settings.api_key, "k");
    assert_eq!(settings.page_size.get(), constants().page_size);
    assert_eq!(settings.policy, FailurePolicy::Skip);
    assert_eq!(settings.query, None);
  }

  #[test]
  fn settings_cli_beats_env_beats_prefs() {
    let config = Config { api_key: Some("prefs".into()), page_size: Some(10), ..Config::default() };
    let s = resolve_settings(&args(&["--api-key", "cli"]), config, Some("env".into())).unwrap();
    assert_eq!(s.api_key, "cli");
    assert_eq!(s.page_size.get(), 10);

    let config = Config { api_key: Some("prefs".into()), ..Config::default() };
    let s = resolve_settings(&args(&[]), config, Some("env".into())).unwrap();
    assert_eq!(s.api_key, "env");

    let config = Config { api_key: Some("prefs".into()), ..Config::default() };
    let s = resolve_settings(&args(&["-n", "30"]), config, None).unwrap();
    assert_eq!(s.api_key, "prefs");
    assert_eq!(s.page_size.get(), 30);
  }

  #[test]
  fn settings_require_api_key() {
    assert!(resolve_settings(&args(&[]), Config::default(), None).is_err());
    assert!(resolve_settings(&args(&[]), Config::default(), Some("   ".into())).is_err());
  }

  #[test]
  fn settings_reject_zero_page_size() {
    assert!(resolve_settings(&args(&["--api-key", "k", "-n", "0"]), Config::default(), None).is_err());
  }

  #[test]
  fn settings_failure_policy() {
    let config = Config { failure_policy: Some("rewind".into()), ..Config::default() };
    let s = resolve_settings(&args(&["--api-key", "k"]), config, None).unwrap();
    assert_eq!(s.policy, FailurePolicy::Rewind);

    let s = resolve_settings(&args(&["--api-key", "k", "--rewind-failed"]), Config::default(), None).unwrap();
    assert_eq!(s.policy, FailurePolicy::Rewind);
  }

  #[test]
  fn settings_blank_query_is_none() {
    let s = resolve_settings(&args(&["--api-key", "k", "-q", "  "]), Config::default(), None).unwrap();
    assert_eq!(s.query, None);
    let s = resolve_settings(&args(&["--api-key", "k", "-q", "rust"]), Config::default(), None).unwrap();
    assert_eq!(s.query.as_deref(), Some("rust"));
  }

  // --- output ---

  #[test]
  fn format_result_with_video_link() {
    let result = SearchResult {
      thumbnail_url: "https://i.ytimg.com/vi/lJxqVf6IP6E/hqdefault.jpg".into(),
      title: "Lo-fi".into(),
      description: "Beats".into(),
    };
    assert_eq!(format_result(0, &result), "   1. Lo-fi\n      Beats\n      https://youtu.be/lJxqVf6IP6E");
  }

  #[test]
  fn format_result_without_link_or_description() {
    let result =
      SearchResult { thumbnail_url: "https://example.com/x.jpg".into(), title: "X".into(), description: String::new() };
    assert_eq!(format_result(41, &result), "  42. X\n      (no video link)");
  }

  #[test]
  fn format_missing_thumbnail_as_placeholder() {
    assert_eq!(format_thumbnail(None), "      thumbnail [placeholder]");
  }
}
