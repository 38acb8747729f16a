use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::constants::constants;
use crate::error::FetchError;
use crate::youtube::{Page, decode};

/// What a single page fetch resolves to.
pub type FetchOutcome = Result<Page, FetchError>;

/// Page coordinates for one fetch. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
  pub page: usize,
  pub page_size: usize,
}

/// Anything that can produce a page of search results.
#[async_trait]
pub trait PageSource: Send + Sync {
  async fn fetch(&self, request: PageRequest) -> FetchOutcome;
}

/// Map an HTTP status onto the error taxonomy. `None` means the status is a
/// success and the body should be decoded.
pub fn classify_status(status: u16) -> Option<FetchError> {
  match status {
    200..300 => None,
    400..500 => Some(FetchError::InvalidRequest(status)),
    500..600 => Some(FetchError::ServerError(status)),
    _ => Some(FetchError::Unknown(status)),
  }
}

/// HTTP client for the video search endpoint.
pub struct FetchClient {
  http: Client,
  endpoint: String,
  api_key: String,
  query: Option<String>,
}

impl FetchClient {
  /// Build a client against the configured endpoint.
  pub fn new(api_key: impl Into<String>, query: Option<String>) -> Result<Self, FetchError> {
    Self::with_endpoint(constants().search_endpoint.clone(), api_key, query)
  }

  pub fn with_endpoint(
    endpoint: impl Into<String>,
    api_key: impl Into<String>,
    query: Option<String>,
  ) -> Result<Self, FetchError> {
    let c = constants();
    let http = Client::builder()
      .timeout(Duration::from_secs(c.http_timeout_secs))
      .user_agent(c.user_agent.as_str())
      .build()
      .map_err(|e| FetchError::Networking(format!("failed to build HTTP client: {}", e)))?;
    Ok(Self { http, endpoint: endpoint.into(), api_key: api_key.into(), query })
  }

  /// Assemble the request URL. Page values go through unchanged; the server
  /// is the one to reject out-of-range sizes.
  pub fn request_url(&self, request: PageRequest) -> Result<Url, FetchError> {
    let mut url = Url::parse(&self.endpoint).map_err(|e| FetchError::Networking(format!("{}: {}", self.endpoint, e)))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
      return Err(FetchError::Networking(format!("not an HTTP endpoint: {}", self.endpoint)));
    }
    {
      let mut pairs = url.query_pairs_mut();
      pairs
        .append_pair("part", "snippet")
        .append_pair("type", "video")
        .append_pair("key", &self.api_key)
        .append_pair("page", &request.page.to_string())
        .append_pair("maxResults", &request.page_size.to_string());
      if let Some(ref q) = self.query {
        pairs.append_pair("q", q);
      }
    }
    Ok(url)
  }
}

#[async_trait]
impl PageSource for FetchClient {
  async fn fetch(&self, request: PageRequest) -> FetchOutcome {
    let url = self.request_url(request)?;
    debug!(page = request.page, page_size = request.page_size, "fetch: sending search request");

    // reqwest errors carry the request URL, which holds the API key.
    let response = self.http.get(url).send().await.map_err(|e| {
      let e = e.without_url();
      if e.is_builder() {
        return FetchError::Networking(e.to_string());
      }
      warn!(page = request.page, err = %e, "fetch: transport failure");
      FetchError::Data(e.to_string())
    })?;

    let status = response.status();
    if let Some(err) = classify_status(status.as_u16()) {
      warn!(page = request.page, status = status.as_u16(), "fetch: unsuccessful status");
      return Err(err);
    }

    let body = response.bytes().await.map_err(|e| {
      let e = e.without_url();
      warn!(page = request.page, err = %e, "fetch: unreadable response body");
      FetchError::Data(format!("failed to read response body: {}", e))
    })?;
    let page = decode(&body)?;
    debug!(page = request.page, results = page.results.len(), total = page.total_available, "fetch: page decoded");
    Ok(page)
  }
}
