//! Network access for the proxy.
//!
//! `Network` is the seam the router and bootstrapper fetch through;
//! `HttpNetwork` is the reqwest implementation used by the CLI.

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use crate::error::{ProxyError, ProxyResult};
use crate::http::{Request, Response, ResponseHead};

#[async_trait]
pub trait Network: Send + Sync {
    /// Issue a request. Any HTTP status is an `Ok` response; `Err` means
    /// no response could be obtained at all.
    async fn fetch(&self, request: &Request) -> ProxyResult<Response>;
}

/// HTTP client for the proxy.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
///
/// No request timeout is configured: a hung fetch only stalls the one
/// request waiting on it.
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new() -> ProxyResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProxyError::network("<client builder>", e))?;
        Ok(Self { client })
    }

    fn request_headers(request: &Request) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        for (name, value) in &request.headers {
            match (
                header::HeaderName::from_bytes(name.as_bytes()),
                header::HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => debug!(header = %name, "Dropping malformed request header"),
            }
        }
        headers
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> ProxyResult<Response> {
        let url = request.url.as_str();
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(Self::request_headers(request))
            .send()
            .await
            .map_err(|e| ProxyError::network(url, e))?;

        let status = response.status();
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

        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::network(url, e))?;

        debug!(url = url, status = status.as_u16(), bytes = body.len(), "Network response");

        Ok(Response::from_parts(
            ResponseHead {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                headers,
            },
            body.to_vec(),
        ))
    }
}
