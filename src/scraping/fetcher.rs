//! Fetch results handed over by the HTTP layer
//!
//! The core performs no network I/O itself. It receives a `FetchResult`,
//! decides whether the page is usable and otherwise skips it.

use thiserror::Error;

/// Reasons a fetched page is not processed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Unexpected HTTP status {0}")]
    BadStatus(u16),
    #[error("Empty response body")]
    EmptyBody,
    #[error("Content too large: {0} bytes")]
    ContentTooLarge(usize),
}

/// Response of one fetch, as delivered by the HTTP layer
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// The URL that was requested
    pub requested_url: String,
    /// The fetched URL (may differ from request due to redirects)
    pub final_url: String,
    /// HTTP status code
    pub status_code: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
}

impl FetchResult {
    /// A 200 response without headers
    pub fn ok(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        let url = url.into();
        Self {
            requested_url: url.clone(),
            final_url: url,
            status_code: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Record a redirect target
    pub fn with_final_url(mut self, final_url: impl Into<String>) -> Self {
        self.final_url = final_url.into();
        self
    }

    /// Add a response header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Get a header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Declared Content-Length; `None` when absent or malformed
    pub fn content_length(&self) -> Option<usize> {
        self.header("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
    }

    /// Check that the page can be processed.
    ///
    /// The size check only trusts the Content-Length header; a missing or
    /// malformed header counts as small enough.
    pub fn check_usable(&self, max_page_size: usize) -> Result<(), FetchError> {
        if self.status_code != 200 {
            return Err(FetchError::BadStatus(self.status_code));
        }
        if self.body.is_empty() {
            return Err(FetchError::EmptyBody);
        }
        if let Some(len) = self.content_length() {
            if len > max_page_size {
                return Err(FetchError::ContentTooLarge(len));
            }
        }
        Ok(())
    }
}
