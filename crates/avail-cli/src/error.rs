//! Error type for the HTTP client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The server answered with an unexpected status.
  #[error("{status}: {message}")]
  Status { status: u16, message: String },

  #[error("token file: {0}")]
  TokenFile(#[from] std::io::Error),

  #[error("token file is not valid JSON: {0}")]
  TokenJson(#[from] serde_json::Error),
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
