//! Request and response snapshots exchanged between the host, the
//! cache store and the network.
//!
//! A `Response` owns its body. Handing a response to a consumer moves it;
//! a second consumer needs its own `clone()`, which is a deep, independent
//! snapshot.
//!
//! URLs are resolved with the `url` crate. A same-origin request is keyed
//! by its path and query, with escapes of unreserved characters decoded so
//! `/~a` and `/%7Ea` share a cache entry. Cross-origin requests keep their
//! full serialized URL.

use crate::error::{SwError, SwResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Base for requests built without an origin
const LOCAL_BASE: &str = "http://swcache.invalid/";

/// Origin classification of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response
    Basic,
    /// Cross-origin response with readable content
    Cors,
    /// Cross-origin response without readable content
    Opaque,
    /// Network error placeholder
    Error,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Cors => write!(f, "cors"),
            Self::Opaque => write!(f, "opaque"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// An outgoing request
///
/// `url` is path-absolute (`/app/style.css`) for same-origin requests and
/// a full URL for cross-origin ones. The fragment is always dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// Build a GET request for a URL that is already relative to the origin
    pub fn get(url: &str) -> SwResult<Self> {
        Self::new("GET", url)
    }

    /// Build a request with no origin attached
    ///
    /// Relative URLs become path keys; absolute URLs stay cross-origin.
    pub fn new(method: &str, url: &str) -> SwResult<Self> {
        let base = Url::parse(LOCAL_BASE).map_err(|e| SwError::Internal(e.to_string()))?;
        Self::resolve(&base, method, url)
    }

    fn resolve(base: &Url, method: &str, url: &str) -> SwResult<Self> {
        let method = method.trim().to_ascii_uppercase();
        if method.is_empty() {
            return Err(SwError::InvalidUrl(format!("empty method for {}", url)));
        }

        let mut target = base
            .join(url.trim())
            .map_err(|e| SwError::InvalidUrl(format!("{}: {}", url, e)))?;
        target.set_fragment(None);

        let url = if target.origin() == base.origin() {
            let mut key = normalize_escapes(target.path());
            if let Some(query) = target.query() {
                key.push('?');
                key.push_str(&normalize_escapes(query));
            }
            key
        } else {
            target.to_string()
        };

        Ok(Self {
            method,
            url,
            headers: vec![],
        })
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// The key used to store and match this request
    pub fn key(&self) -> &str {
        &self.url
    }

    /// Only GET requests are stored or matched
    pub fn is_cacheable(&self) -> bool {
        self.method == "GET"
    }

    /// Whether the request targets the host's own origin
    pub fn is_same_origin(&self) -> bool {
        self.url.starts_with('/')
    }

    /// Path component without the query string
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }
}

/// A response snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// URL the response was produced for
    pub url: String,
}

impl Response {
    /// Create a response with an empty header list
    pub fn new(url: &str, status: u16, kind: ResponseKind, body: Vec<u8>) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
            kind,
            headers: vec![],
            body,
            url: url.to_string(),
        }
    }

    /// Status is in the 200-299 range
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Look up a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Consume the response, yielding its body
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

/// The origin requests are resolved against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    base: Url,
    serialized: String,
}

impl Origin {
    /// Parse an origin such as `https://example.com:8443`
    ///
    /// Default ports are dropped, so `http://host:80` equals `http://host`.
    pub fn parse(url: &str) -> SwResult<Self> {
        let base = Url::parse(url.trim())
            .map_err(|e| SwError::InvalidUrl(format!("{}: {}", url, e)))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(SwError::InvalidUrl(format!(
                "origin must be http(s): {}",
                url
            )));
        }
        if base.path() != "/"
            || base.query().is_some()
            || base.fragment().is_some()
            || !base.username().is_empty()
            || base.password().is_some()
        {
            return Err(SwError::InvalidUrl(format!(
                "origin must be scheme, host and port only: {}",
                url
            )));
        }

        let serialized = base.origin().ascii_serialization();
        Ok(Self { base, serialized })
    }

    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Build a request, folding same-origin absolute URLs into paths
    pub fn request(&self, method: &str, url: &str) -> SwResult<Request> {
        Request::resolve(&self.base, method, url)
    }

    /// Full URL for a request
    pub fn resolve(&self, request: &Request) -> String {
        if request.is_same_origin() {
            format!("{}{}", self.serialized, request.url)
        } else {
            request.url.clone()
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialized)
    }
}

/// Scope granted to a worker script: the directory containing it
///
/// `/sw.toml` -> `/`, `/app/sw.toml` -> `/app/`
pub fn scope_of(script_path: &str) -> String {
    let path = script_path.split('?').next().unwrap_or(script_path);
    match path.rfind('/') {
        Some(idx) => path[..=idx].to_string(),
        None => "/".to_string(),
    }
}

/// Whether a path-absolute URL falls under a scope
pub fn in_scope(url: &str, scope: &str) -> bool {
    url.starts_with(scope)
}

/// Decode escapes of unreserved characters and uppercase the rest
///
/// Input is a serialized URL component, so it is ASCII.
fn normalize_escapes(component: &str) -> String {
    let bytes = component.as_bytes();
    let mut out = String::with_capacity(component.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit();
        if !escaped {
            out.push(bytes[i] as char);
            i += 1;
            continue;
        }

        let hex = &component[i + 1..i + 3];
        match u8::from_str_radix(hex, 16) {
            Ok(value)
                if value.is_ascii_alphanumeric() || matches!(value, b'-' | b'.' | b'_' | b'~') =>
            {
                out.push(value as char)
            }
            _ => {
                out.push('%');
                out.push_str(&hex.to_ascii_uppercase());
            }
        }
        i += 3;
    }
    out
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}
