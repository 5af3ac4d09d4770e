//! HTTP downloads of supporting files.

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::{ExecError, Result};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Downloads files referenced by the configuration.
#[derive(Debug, Clone)]
pub struct Fetcher {
    /// HTTP client.
    client: Client,
}

impl Fetcher {
    /// Creates a fetcher with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a fetcher with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExecError::Fetch {
                url: String::new(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// Downloads `url`.
    ///
    /// # Errors
    ///
    /// Returns `ExecError::Fetch` on a transport error or a non-success
    /// status.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Fetching {url}");

        let fetch_error = |message: String| ExecError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {status}")).into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        Ok(body.to_vec())
    }
}
