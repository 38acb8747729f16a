use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::client::{FetchOutcome, PageRequest, PageSource};
use crate::constants::constants;
use crate::error::FetchError;
use crate::store::ResultStore;

/// What to do with the page counter when a page fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
  /// Keep the advanced counter. The failed page becomes a permanent gap.
  #[default]
  Skip,
  /// Step the counter back so the next matching trigger asks for the same page again.
  Rewind,
}

impl FailurePolicy {
  pub fn label(self) -> &'static str {
    match self {
      FailurePolicy::Skip => "skip",
      FailurePolicy::Rewind => "rewind",
    }
  }

  /// Parse a prefs value. Unrecognised values fall back to `Skip` with a warning.
  pub fn from_config(s: &str) -> Self {
    match s.trim().to_lowercase().as_str() {
      "skip" => FailurePolicy::Skip,
      "rewind" | "retry" => FailurePolicy::Rewind,
      other => {
        warn!(value = other, "config: unknown failure_policy, using skip");
        FailurePolicy::Skip
      }
    }
  }
}

/// Receives every failed page fetch.
pub trait ErrorReporter: Send + Sync {
  fn report(&self, request: PageRequest, error: &FetchError);
}

/// Default reporter: log and move on.
pub struct LogReporter;

impl ErrorReporter for LogReporter {
  fn report(&self, request: PageRequest, error: &FetchError) {
    warn!(page = request.page, kind = error.kind(), err = %error, "pagination: page fetch failed");
  }
}

/// Prefetch trigger: true when `visible_index` sits exactly `prefetch_window`
/// items before the end of the most recently requested page, and is still
/// inside the server-reported total.
pub fn should_trigger(
  visible_index: usize,
  total_available: usize,
  page_size: NonZeroUsize,
  current_page: usize,
  prefetch_window: usize,
) -> bool {
  let page_size = page_size.get();
  if visible_index >= total_available {
    return false;
  }
  // A window as large as the page never lands on a row.
  let Some(trigger_offset) = page_size.checked_sub(prefetch_window) else { return false };
  let Some(last_page_index) = current_page.checked_sub(1) else { return false };
  visible_index % page_size == trigger_offset && visible_index / page_size == last_page_index
}

/// A page request whose result has not been applied yet.
struct InFlight {
  request: PageRequest,
  rx: oneshot::Receiver<FetchOutcome>,
}

/// Drives page fetches from scroll position and feeds results into the store.
///
/// At most one page fetch is in flight. Triggers that arrive while a page is
/// pending are rejected without touching the page counter.
pub struct PaginationController {
  source: Arc<dyn PageSource>,
  store: ResultStore,
  reporter: Arc<dyn ErrorReporter>,
  policy: FailurePolicy,
  page_size: NonZeroUsize,
  prefetch_window: usize,
  current_page: usize,
  in_flight: Option<InFlight>,
}

impl PaginationController {
  pub fn new(source: Arc<dyn PageSource>, store: ResultStore, page_size: NonZeroUsize) -> Self {
    Self {
      source,
      store,
      reporter: Arc::new(LogReporter),
      policy: FailurePolicy::default(),
      page_size,
      prefetch_window: constants().prefetch_window,
      current_page: 0,
      in_flight: None,
    }
  }

  pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
    self.reporter = reporter;
    self
  }

  pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn store(&self) -> &ResultStore {
    &self.store
  }

  pub fn current_page(&self) -> usize {
    self.current_page
  }

  pub fn is_loading(&self) -> bool {
    self.in_flight.is_some()
  }

  /// Advance to the next page and fetch it in the background.
  /// Returns `false` (and changes nothing) if a page is already in flight.
  pub fn load_page(&mut self) -> bool {
    if let Some(ref pending) = self.in_flight {
      debug!(pending = pending.request.page, "pagination: load rejected, page in flight");
      return false;
    }
    self.current_page += 1;
    let request = PageRequest { page: self.current_page, page_size: self.page_size.get() };
    info!(page = request.page, page_size = request.page_size, "pagination: requesting page");

    let source = Arc::clone(&self.source);
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(source.fetch(request).await);
    });
    self.in_flight = Some(InFlight { request, rx });
    true
  }

  /// Report that the item at `visible_index` was shown. Returns whether a
  /// next-page fetch was started.
  pub fn on_item_becomes_visible(&mut self, visible_index: usize) -> bool {
    if !should_trigger(
      visible_index,
      self.store.total_available(),
      self.page_size,
      self.current_page,
      self.prefetch_window,
    ) {
      return false;
    }
    debug!(visible_index, current_page = self.current_page, "pagination: prefetch window reached");
    self.load_page()
  }

  /// Apply the in-flight page if it has completed. Never blocks.
  /// Returns `true` if a result (success or failure) was applied.
  pub fn check_pending(&mut self) -> bool {
    let Some(mut pending) = self.in_flight.take() else { return false };
    match pending.rx.try_recv() {
      Ok(outcome) => {
        self.apply(pending.request, outcome);
        true
      }
      Err(oneshot::error::TryRecvError::Empty) => {
        self.in_flight = Some(pending);
        false
      }
      Err(oneshot::error::TryRecvError::Closed) => {
        self.apply(pending.request, Err(task_lost()));
        true
      }
    }
  }

  /// Wait for the in-flight page, if any, and apply it.
  pub async fn settle(&mut self) {
    let Some(pending) = self.in_flight.take() else { return };
    let outcome = pending.rx.await.unwrap_or_else(|_| Err(task_lost()));
    self.apply(pending.request, outcome);
  }

  fn apply(&mut self, request: PageRequest, outcome: FetchOutcome) {
    match outcome {
      Ok(page) => {
        info!(
          page = request.page,
          results = page.results.len(),
          total = page.total_available,
          "pagination: page loaded"
        );
        self.store.append(page.results, page.total_available);
      }
      Err(err) => {
        self.reporter.report(request, &err);
        if self.policy == FailurePolicy::Rewind && self.current_page == request.page {
          self.current_page -= 1;
          debug!(current_page = self.current_page, "pagination: rewound after failure");
        }
      }
    }
  }
}

fn task_lost() -> FetchError {
  error!("pagination: fetch task ended without a result");
  FetchError::Data("fetch task ended without a result".to_string())
}
