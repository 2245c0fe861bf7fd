//! Mock network for testing
//!
//! Serves canned responses by URL and can simulate going offline, so the
//! worker's fallback paths can be exercised without sockets.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{Network, Request, Response};
use crate::error::FetchError;

/// Mock network.
///
/// # Example
/// ```ignore
/// let net = MockNetwork::new()
///     .with_response("https://app.test/", Response::new(200, "<html>"))
///     .await;
/// net.set_offline(true).await;
/// ```
#[derive(Default)]
pub struct MockNetwork {
    /// Canned responses keyed by absolute URL
    responses: Arc<Mutex<HashMap<String, Response>>>,
    /// When set, every fetch fails
    offline: Arc<Mutex<bool>>,
    /// Every request seen, in order
    captured: Arc<Mutex<Vec<Request>>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for `url`. Unknown URLs get a 404.
    pub async fn with_response(self, url: &str, response: Response) -> Self {
        self.responses.lock().await.insert(url.to_string(), response);
        self
    }

    /// Replace the response for `url` after construction
    pub async fn set_response(&self, url: &str, response: Response) {
        self.responses.lock().await.insert(url.to_string(), response);
    }

    pub async fn set_offline(&self, offline: bool) {
        *self.offline.lock().await = offline;
    }

    /// Number of fetches issued for `url`
    pub async fn calls(&self, url: &str) -> usize {
        self.captured
            .lock()
            .await
            .iter()
            .filter(|r| r.url.as_str() == url)
            .count()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.captured.lock().await.push(request.clone());

        let url = request.url.to_string();
        if *self.offline.lock().await {
            return Err(FetchError::Offline(url));
        }

        Ok(self
            .responses
            .lock()
            .await
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Response::new(404, "Not Found")))
    }
}
