use std::sync::Arc;

use calfix_core::{Config, Pipeline};

use crate::fetch::{FetchError, Fetcher};

/// Shared application state
///
/// Read-only after startup; every request fetches and patches its own copy
/// of the feed.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Fetcher,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        Ok(AppState {
            fetcher: Fetcher::new(config.upstream_url.clone())?,
            pipeline: Arc::new(Pipeline::standard()),
        })
    }
}
