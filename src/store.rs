use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::youtube::SearchResult;

/// Snapshot of the full result list, published after every append.
pub type Snapshot = Arc<[SearchResult]>;

/// Accumulated search results for one browsing session.
///
/// `append` is the only mutation. Each call publishes exactly one snapshot to
/// every live subscriber, including appends of an empty page.
#[derive(Default)]
pub struct ResultStore {
  items: Vec<SearchResult>,
  total_available: usize,
  subscribers: Vec<mpsc::UnboundedSender<Snapshot>>,
}

impl ResultStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register for change notifications. Dropping the receiver unsubscribes.
  pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Snapshot> {
    let (tx, rx) = mpsc::unbounded_channel();
    self.subscribers.push(tx);
    rx
  }

  /// Append a page in order and record the server's latest total.
  pub fn append(&mut self, results: Vec<SearchResult>, total_available: usize) {
    let added = results.len();
    self.items.extend(results);
    self.total_available = total_available;

    let snapshot: Snapshot = self.items.clone().into();
    self.subscribers.retain(|tx| tx.send(Arc::clone(&snapshot)).is_ok());
    debug!(added, count = self.items.len(), total = total_available, "store: appended");
  }

  pub fn count(&self) -> usize {
    self.items.len()
  }

  /// Last server-reported total; 0 until the first successful page.
  pub fn total_available(&self) -> usize {
    self.total_available
  }

  pub fn items(&self) -> &[SearchResult] {
    &self.items
  }
}
