//! Host-agnostic HTTP request and response model.
//!
//! The worker never talks to a socket itself; it receives request
//! descriptors from the host and hands back captured responses. Bodies are
//! [`Bytes`], so keeping a copy for the cache while returning the original
//! to the caller is cheap.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::{Origin, Url};

/// HTTP request methods understood by the interception policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Patch,
}

impl Method {
    /// Returns the canonical upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a request was initiated, mirroring the platform request modes.
///
/// The interception policy only distinguishes [`Navigate`](Self::Navigate);
/// the other modes are carried for fidelity to the host's request shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestMode {
    /// A page navigation (address bar, link click, reload).
    Navigate,
    SameOrigin,
    Cors,
    NoCors,
}

/// An outgoing resource request from a controlled page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// How the request was initiated.
    pub mode: RequestMode,
}

impl FetchRequest {
    /// Creates a plain GET subresource request.
    #[must_use]
    pub const fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            mode: RequestMode::NoCors,
        }
    }

    /// Creates a page navigation request.
    #[must_use]
    pub const fn navigate(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            mode: RequestMode::Navigate,
        }
    }

    /// Creates a subresource request with an explicit method.
    #[must_use]
    pub const fn with_method(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            mode: RequestMode::NoCors,
        }
    }

    /// Request identity used as the cache key: method + URL.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    /// Returns the origin of the request URL.
    #[must_use]
    pub fn origin(&self) -> Origin {
        self.url.origin()
    }

    /// True for page navigations.
    #[must_use]
    pub const fn is_navigation(&self) -> bool {
        matches!(self.mode, RequestMode::Navigate)
    }
}

/// A captured HTTP response: status, headers, body, final URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercase.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Bytes,
    /// Final URL the response was served from.
    pub url: Url,
}

impl FetchResponse {
    /// Creates an empty response with the given status.
    #[must_use]
    pub fn new(url: Url, status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
            url,
        }
    }

    /// Sets the response body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a header, normalizing the name to lowercase.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// True for 2xx-class statuses, matching the platform's `Response.ok`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns a header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns the origin of the response URL.
    #[must_use]
    pub fn origin(&self) -> Origin {
        self.url.origin()
    }
}
