//! Request and response records passed between the host, the router,
//! the network and the cache store.

use std::fmt;

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, ProxyResult};

/// How the page issued the request. Only `Navigate` changes routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Full-page navigation (top-level document load)
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            mode: RequestMode::default(),
            headers: Vec::new(),
        }
    }

    /// Build a GET request from an absolute URL string
    pub fn get(url: &str) -> ProxyResult<Self> {
        let url = Url::parse(url).map_err(|e| ProxyError::InvalidUrl(format!("{}: {}", url, e)))?;
        Ok(Self::new(Method::GET, url))
    }

    /// Build a top-level navigation request
    pub fn navigate(url: &str) -> ProxyResult<Self> {
        Ok(Self::get(url)?.with_mode(RequestMode::Navigate))
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Cache key: method plus URL, ignoring any fragment
    pub fn identity(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        format!("{} {}", self.method, url)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Status line and headers of a response, without the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHead {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
}

/// A response owns its body and can be handed out once.
///
/// It is deliberately not `Clone`: anything that needs to both return a
/// response and keep a copy must split it with [`Response::tee`] first.
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    head: ResponseHead,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            head: ResponseHead {
                status,
                status_text: default_status_text(status).to_string(),
                headers: Vec::new(),
            },
            body: body.into(),
        }
    }

    pub fn from_parts(head: ResponseHead, body: Vec<u8>) -> Self {
        Self { head, body }
    }

    /// The synthesized reply for a non-navigation request that failed on
    /// both cache and network.
    pub fn offline() -> Self {
        Self::new(503, "Offline").with_header("content-type", "text/plain")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.head.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn status(&self) -> u16 {
        self.head.status
    }

    pub fn status_text(&self) -> &str {
        &self.head.status_text
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.head.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// 2xx, the "ok" range
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.head.status)
    }

    /// Copy head and body into a second, independent response
    pub fn duplicate(&self) -> Self {
        Self {
            head: self.head.clone(),
            body: self.body.clone(),
        }
    }

    /// Split into two independently consumable copies
    pub fn tee(self) -> (Self, Self) {
        let copy = self.duplicate();
        (self, copy)
    }

    pub fn into_parts(self) -> (ResponseHead, Vec<u8>) {
        (self.head, self.body)
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

fn default_status_text(status: u16) -> &'static str {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_fragment() {
        let a = Request::get("https://app.example/index.html#top").unwrap();
        let b = Request::get("https://app.example/index.html").unwrap();
        assert_eq!(a.identity(), b.identity());
        assert_eq!(a.identity(), "GET https://app.example/index.html");
    }

    #[test]
    fn test_identity_distinguishes_method() {
        let get = Request::get("https://app.example/api").unwrap();
        let post = get.clone().with_method(Method::POST);
        assert_ne!(get.identity(), post.identity());
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(
            Request::get("/relative/path"),
            Err(ProxyError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_offline_response_contract() {
        let resp = Response::offline();
        assert_eq!(resp.status(), 503);
        assert_eq!(resp.status_text(), "Service Unavailable");
        assert_eq!(resp.header("Content-Type"), Some("text/plain"));
        assert_eq!(resp.body(), b"Offline");
        assert!(!resp.is_ok());
    }

    #[test]
    fn test_tee_yields_equal_independent_copies() {
        let (a, b) = Response::new(200, "X").with_header("etag", "1").tee();
        assert_eq!(a, b);
        assert_eq!(a.into_body(), b"X".to_vec());
        assert_eq!(b.header("etag"), Some("1"));
    }

    #[test]
    fn test_ok_range() {
        assert!(Response::new(200, "").is_ok());
        assert!(Response::new(204, "").is_ok());
        assert!(!Response::new(304, "").is_ok());
        assert!(!Response::new(404, "").is_ok());
    }
}
