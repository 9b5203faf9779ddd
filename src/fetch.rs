//! Upstream feed download.

use bytes::Bytes;
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("calfix/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Upstream request failed")]
    Request(#[from] reqwest::Error),
}

/// Fetches the upstream feed. One GET per call, no retries.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    url: Url,
}

impl Fetcher {
    pub fn new(url: Url) -> Result<Self, FetchError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Fetcher { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Download the full feed body.
    ///
    /// Non-2xx responses count as failures.
    pub async fn fetch(&self) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?;

        let body = response.bytes().await?;
        debug!(url = %self.url, bytes = body.len(), "Fetched upstream feed");

        Ok(body)
    }
}
