//! Endpoint, paging and HTTP constants from `constants.ron`.
//!
//! The file is compiled in with `include_str!` and parsed on first use.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Search API
  pub search_endpoint: String,
  pub http_timeout_secs: u64,
  pub user_agent: String,

  // Pagination
  pub page_size: usize,
  /// How many items before a page boundary the next page is requested.
  pub prefetch_window: usize,

  // Presentation helpers
  pub share_url_prefix: String,
  pub thumbnail_concurrency: usize,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Embedded file; `embedded_constants_parse` catches a malformed edit before it ships.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.page_size, 20);
    assert_eq!(c.prefetch_window, 5);
    assert!(c.search_endpoint.starts_with("https://"));
    assert!(c.thumbnail_concurrency > 0);
  }
}
