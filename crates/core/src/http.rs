//! Request and response values handed between the host, the cache store
//! and the network.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Error;

/// Ordered header list. Names are kept as received; lookups are
/// case-insensitive.
pub type Headers = Vec<(String, String)>;

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Headers,
    pub body: Option<Bytes>,
}

impl Request {
    /// A plain GET for `url`.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, headers: Vec::new(), body: None }
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Look up a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A response from the network or the cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Only complete `200 OK` responses are eligible for the cache store.
    /// Redirects, partial content and errors are never stored.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Source of live responses.
///
/// A fetch resolves with whatever status the server sent; only transport
/// failures (connection refused, timeout, oversize body) are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
