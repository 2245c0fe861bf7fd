//! reqwest-backed network transport

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::{Network, Request, Response, ResponseSource};
use crate::error::FetchError;

/// Real network access.
///
/// No request timeout is set here; the worker never gives up on a fetch by
/// itself.
pub struct HttpNetwork {
    http: HttpClient,
}

impl HttpNetwork {
    pub fn new() -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .user_agent(concat!("learnhub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Offline(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(FetchError::from)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await.map_err(FetchError::from)?.to_vec();

        log::debug!("{} {} -> {}", request.method, request.url, status);

        Ok(Response {
            status,
            headers,
            body,
            source: ResponseSource::Network,
        })
    }
}
