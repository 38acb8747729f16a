use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::constants::constants;
use crate::error::FetchError;

/// A single entry from a search listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
  /// High-resolution thumbnail URL, kept exactly as the API returned it.
  /// The video ID is recovered from this URL later, so it must not be rewritten.
  pub thumbnail_url: String,
  pub title: String,
  pub description: String,
}

/// One decoded response page: the results in server order plus the
/// server-reported total for the whole query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
  pub results: Vec<SearchResult>,
  pub total_available: usize,
}

// --- Wire format ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
  page_info: PageInfo,
  items: Vec<Item>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
  total_results: usize,
}

#[derive(Deserialize)]
struct Item {
  snippet: Snippet,
}

#[derive(Deserialize)]
struct Snippet {
  title: String,
  description: String,
  thumbnails: Thumbnails,
}

#[derive(Deserialize)]
struct Thumbnails {
  high: Thumbnail,
}

#[derive(Deserialize)]
struct Thumbnail {
  url: String,
}

/// Decode a search response body into a page of results.
///
/// All-or-nothing: a single malformed item fails the whole page.
pub fn decode(payload: &[u8]) -> Result<Page, FetchError> {
  let response: SearchResponse = serde_json::from_slice(payload).map_err(|e| FetchError::Parse(e.to_string()))?;
  let results = response
    .items
    .into_iter()
    .map(|item| SearchResult {
      thumbnail_url: item.snippet.thumbnails.high.url,
      title: item.snippet.title,
      description: item.snippet.description,
    })
    .collect();
  Ok(Page { results, total_available: response.page_info.total_results })
}

// --- Video links ---

static VIDEO_ID_PATTERN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"/vi/([A-Za-z0-9_-]+)/").expect("video ID pattern is a valid regex"));

/// Extract the video ID embedded in a thumbnail URL.
/// e.g. `https://i.ytimg.com/vi/lJxqVf6IP6E/hqdefault.jpg` → `lJxqVf6IP6E`
pub fn video_id_from_thumbnail(url: &str) -> Option<String> {
  VIDEO_ID_PATTERN.captures(url).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
}

/// Short share link for a video ID.
pub fn share_url(video_id: &str) -> String {
  format!("{}{}", constants().share_url_prefix, video_id)
}
