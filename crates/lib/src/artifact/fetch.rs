//! Artifact transport.
//!
//! The pipeline only needs `fetch(url) -> bytes`. Remote URLs go through a
//! blocking HTTP client; `file://` URLs read from a local mirror directory.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while fetching an artifact.
#[derive(Debug, Error)]
pub enum FetchError {
  /// The HTTP client could not be constructed.
  #[error("failed to initialize HTTP client: {0}")]
  Client(String),

  /// The request failed before a response was received.
  #[error("fetch failed for {url}: {message}")]
  Transport { url: String, message: String },

  /// The server answered with a non-success status.
  #[error("fetch failed for {url}: HTTP {status}")]
  Status { url: String, status: u16 },

  /// A `file://` URL pointed at something unreadable.
  #[error("fetch failed for {url}: {source}")]
  Local {
    url: String,
    #[source]
    source: std::io::Error,
  },
}

/// Retrieves the raw bytes behind a URL.
pub trait Fetcher {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP(S) fetcher.
pub struct HttpFetcher {
  client: reqwest::blocking::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self, FetchError> {
    let client = reqwest::blocking::Client::builder()
      .user_agent(concat!("driverstamp/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| FetchError::Client(e.to_string()))?;
    Ok(Self { client })
  }
}

impl Fetcher for HttpFetcher {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    info!(url = %url, "fetching URL");

    let response = self.client.get(url).send().map_err(|e| FetchError::Transport {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    if !response.status().is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: response.status().as_u16(),
      });
    }

    let bytes = response.bytes().map_err(|e| FetchError::Transport {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    info!(url = %url, size = bytes.len(), "download complete");
    Ok(bytes.to_vec())
  }
}

/// Reads `file://` URLs from the local filesystem.
pub struct FileFetcher;

impl Fetcher for FileFetcher {
  fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
    let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
    debug!(path = %path.display(), "reading local artifact");
    std::fs::read(&path).map_err(|source| FetchError::Local {
      url: url.to_string(),
      source,
    })
  }
}

/// Pick the fetcher matching the scheme of `base_url`.
pub fn fetcher_for(base_url: &str) -> Result<Box<dyn Fetcher>, FetchError> {
  if base_url.starts_with("file://") {
    Ok(Box::new(FileFetcher))
  } else {
    Ok(Box::new(HttpFetcher::new()?))
  }
}
