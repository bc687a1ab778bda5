//! Shared HTTP client construction
//!
//! One place to set the user agent and timeouts so playlist fetches and
//! preset downloads behave the same everywhere.

use crate::config::network::{
    CONNECT_TIMEOUT_SECS, PLAYLIST_FETCH_TIMEOUT_SECS, READ_TIMEOUT_SECS, USER_AGENT,
};
use crate::error::Result;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Blocking HTTP client with the application defaults applied
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::blocking::Client,
}

impl HttpClient {
    /// General-purpose client for JSON endpoints
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
    }

    /// Client for playlist fetches, which must fail fast so resolution can
    /// move on to the next stream.
    pub fn for_playlists() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(PLAYLIST_FETCH_TIMEOUT_SECS))
    }

    fn with_timeout(total: Duration) -> Result<Self> {
        let inner = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(total)
            .build()?;
        Ok(Self { inner })
    }

    /// GET a URL and deserialize the JSON response
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.inner.get(url).send()?.error_for_status()?;
        Ok(response.json()?)
    }

    pub fn inner(&self) -> &reqwest::blocking::Client {
        &self.inner
    }
}
