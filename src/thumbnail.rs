use futures::stream::{self, StreamExt};
use image::DynamicImage;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::constants;
use crate::error::FetchError;
use crate::youtube::SearchResult;

/// Downloads and decodes result thumbnails.
///
/// Every call goes to the network: there is no cache, and two calls for the
/// same URL issue two requests.
#[derive(Clone)]
pub struct ImageFetcher {
  http: Client,
}

impl ImageFetcher {
  pub fn new() -> Result<Self, FetchError> {
    let c = constants();
    let http = Client::builder()
      .timeout(Duration::from_secs(c.http_timeout_secs))
      .user_agent(c.user_agent.as_str())
      .build()
      .map_err(|e| FetchError::Networking(format!("failed to build HTTP client: {}", e)))?;
    Ok(Self { http })
  }

  /// Fetch and decode a single image. Any failure along the way is a
  /// networking error; callers show a placeholder instead.
  pub async fn fetch_image(&self, url: &str) -> Result<DynamicImage, FetchError> {
    let response = self.http.get(url).send().await.map_err(|e| FetchError::Networking(e.to_string()))?;
    if !response.status().is_success() {
      return Err(FetchError::Networking(format!("HTTP {} for {}", response.status().as_u16(), url)));
    }
    let bytes = response
      .bytes()
      .await
      .map_err(|e| FetchError::Networking(format!("failed to read image bytes from {}: {}", url, e)))?;
    image::load_from_memory(&bytes)
      .map_err(|e| FetchError::Networking(format!("failed to decode image from {}: {}", url, e)))
  }

  /// Thumbnail for the result at `index`, or `None` if the index is out of
  /// range or the image could not be loaded.
  pub async fn fetch_for(&self, items: &[SearchResult], index: usize) -> Option<DynamicImage> {
    let Some(result) = items.get(index) else {
      debug!(index, count = items.len(), "thumbnail: index out of range");
      return None;
    };
    match self.fetch_image(&result.thumbnail_url).await {
      Ok(image) => Some(image),
      Err(e) => {
        warn!(index, url = %result.thumbnail_url, err = %e, "thumbnail: fetch failed");
        None
      }
    }
  }

  /// Fetch thumbnails for a run of results, a few at a time.
  /// Output order matches `items`.
  pub async fn fetch_batch(&self, items: &[SearchResult]) -> Vec<Option<DynamicImage>> {
    stream::iter(0..items.len())
      .map(|index| self.fetch_for(items, index))
      .buffered(constants().thumbnail_concurrency)
      .collect()
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{ImageFormat, RgbImage};
  use mockito::Server;
  use std::io::Cursor;

  fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
  }

  fn result_for(url: &str) -> SearchResult {
    SearchResult { thumbnail_url: url.to_string(), title: "t".into(), description: "d".into() }
  }

  #[tokio::test]
  async fn fetch_image_decodes_png() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/vi/abc123/hqdefault.jpg")
      .with_status(200)
      .with_header("content-type", "image/png")
      .with_body(png_bytes(4, 3))
      .create_async()
      .await;
    let url = format!("{}/vi/abc123/hqdefault.jpg", server.url());

    let image = ImageFetcher::new().unwrap().fetch_image(&url).await.unwrap();
    assert_eq!((image.width(), image.height()), (4, 3));
  }

  #[tokio::test]
  async fn fetch_image_rejects_non_image_body() {
    let mut server = Server::new_async().await;
    server.mock("GET", "/vi/abc123/hqdefault.jpg").with_status(200).with_body("not an image").create_async().await;
    let url = format!("{}/vi/abc123/hqdefault.jpg", server.url());

    let err = ImageFetcher::new().unwrap().fetch_image(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Networking(_)));
  }

  #[tokio::test]
  async fn fetch_image_http_error_is_networking_error() {
    let mut server = Server::new_async().await;
    server.mock("GET", "/vi/abc123/hqdefault.jpg").with_status(404).create_async().await;
    let url = format!("{}/vi/abc123/hqdefault.jpg", server.url());

    let err = ImageFetcher::new().unwrap().fetch_image(&url).await.unwrap_err();
    assert!(matches!(err, FetchError::Networking(_)));
  }

  #[tokio::test]
  async fn fetch_image_invalid_url() {
    let err = ImageFetcher::new().unwrap().fetch_image("not a url").await.unwrap_err();
    assert!(matches!(err, FetchError::Networking(_)));
  }

  #[tokio::test]
  async fn repeated_fetches_are_not_deduplicated() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/vi/abc123/hqdefault.jpg")
      .with_status(200)
      .with_body(png_bytes(2, 2))
      .expect(2)
      .create_async()
      .await;
    let url = format!("{}/vi/abc123/hqdefault.jpg", server.url());

    let fetcher = ImageFetcher::new().unwrap();
    let (a, b) = tokio::join!(fetcher.fetch_image(&url), fetcher.fetch_image(&url));

    assert!(a.is_ok() && b.is_ok());
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn fetch_for_out_of_range_is_none() {
    let fetcher = ImageFetcher::new().unwrap();
    assert!(fetcher.fetch_for(&[], 0).await.is_none());
  }

  #[tokio::test]
  async fn fetch_batch_keeps_order_and_tolerates_failures() {
    let mut server = Server::new_async().await;
    server.mock("GET", "/vi/good/hqdefault.jpg").with_status(200).with_body(png_bytes(5, 5)).create_async().await;
    server.mock("GET", "/vi/bad/hqdefault.jpg").with_status(500).create_async().await;
    let good = format!("{}/vi/good/hqdefault.jpg", server.url());
    let bad = format!("{}/vi/bad/hqdefault.jpg", server.url());
    let items = vec![result_for(&good), result_for(&bad), result_for(&good)];

    let thumbs = ImageFetcher::new().unwrap().fetch_batch(&items).await;

    assert_eq!(thumbs.len(), 3);
    assert!(thumbs[0].is_some());
    assert!(thumbs[1].is_none());
    assert_eq!(thumbs[2].as_ref().map(|i| i.width()), Some(5));
  }
}
