//! Network abstraction and the reqwest-backed default implementation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::http::{FetchRequest, FetchResponse, Method};

/// Abstraction over the host's HTTP fetch.
///
/// Implementations must resolve non-2xx responses as `Ok` (platform fetch
/// semantics); `Err` means the fetch itself failed — connection refused,
/// DNS failure, offline.
#[async_trait]
pub trait Network: Send + Sync {
    /// Performs an HTTP fetch for the given request descriptor.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

#[async_trait]
impl<N: Network + ?Sized> Network for Arc<N> {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        (**self).fetch(request).await
    }
}

/// Default network backend over a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestNetwork {
    client: reqwest::Client,
}

impl ReqwestNetwork {
    /// Creates a backend with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend reusing an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Patch => reqwest::Method::PATCH,
    }
}

#[async_trait]
impl Network for ReqwestNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let response = self
            .client
            .request(to_reqwest_method(request.method), request.url.clone())
            .send()
            .await?;

        let status = response.status().as_u16();
        let url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(FetchResponse {
            status,
            headers,
            body,
            url,
        })
    }
}
