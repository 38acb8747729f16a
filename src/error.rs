use thiserror::Error;

/// Why a page or thumbnail fetch failed.
///
/// Every failure of the fetch path is returned as one of these; nothing past
/// `FetchClient` or the decoder panics on bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// The request could not be built (bad URL, client construction).
  #[error("networking error: {0}")]
  Networking(String),

  /// The transport failed or the response envelope was unreadable.
  #[error("data error: {0}")]
  Data(String),

  /// A success response whose body did not match the expected shape.
  #[error("parse error: {0}")]
  Parse(String),

  /// HTTP 4xx.
  #[error("invalid request (HTTP {0})")]
  InvalidRequest(u16),

  /// HTTP 5xx.
  #[error("server error (HTTP {0})")]
  ServerError(u16),

  /// Any other HTTP status.
  #[error("unknown error (HTTP {0})")]
  Unknown(u16),
}

impl FetchError {
  /// Short stable label, used as a structured log field.
  pub fn kind(&self) -> &'static str {
    match self {
      FetchError::Networking(_) => "networking",
      FetchError::Data(_) => "data",
      FetchError::Parse(_) => "parse",
      FetchError::InvalidRequest(_) => "invalid_request",
      FetchError::ServerError(_) => "server",
      FetchError::Unknown(_) => "unknown",
    }
  }
}
