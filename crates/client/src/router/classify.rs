//! Request classification.
//!
//! Every request lands in exactly one strategy. The checks run in order:
//!
//! 1. URL contains an API marker, the mode is `navigate`, or the destination
//!    is `document` → [`Strategy::NetworkOnly`]
//! 2. Method other than `GET` → [`Strategy::Passthrough`]
//! 3. Anything else is a static asset → [`Strategy::CacheFirst`]

use reqwest::{Method, header::HeaderMap};
use url::Url;

use crate::fetch::FetchRequest;

/// Request mode, as carried by the `Sec-Fetch-Mode` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
    Websocket,
    #[default]
    Unknown,
}

impl RequestMode {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigate" => RequestMode::Navigate,
            "same-origin" => RequestMode::SameOrigin,
            "no-cors" => RequestMode::NoCors,
            "cors" => RequestMode::Cors,
            "websocket" => RequestMode::Websocket,
            _ => RequestMode::Unknown,
        }
    }
}

/// Request destination, as carried by the `Sec-Fetch-Dest` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    /// `fetch()`/XHR calls report an empty destination.
    Empty,
    #[default]
    Other,
}

impl Destination {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "script" => Destination::Script,
            "style" => Destination::Style,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "manifest" => Destination::Manifest,
            "empty" => Destination::Empty,
            _ => Destination::Other,
        }
    }
}

/// Caching strategy chosen for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Always the network; the offline fallback replaces transport failures.
    NetworkOnly,
    /// Stored snapshot if present, otherwise network with lazy caching.
    CacheFirst,
    /// Network with no cache access and no fallback (non-GET assets).
    Passthrough,
}

/// A request plus the metadata classification needs.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub fetch: FetchRequest,
    pub mode: RequestMode,
    pub destination: Destination,
}

impl RouteRequest {
    /// A `GET` with unknown mode and destination, as issued by scripts.
    pub fn get(url: Url) -> Self {
        Self { fetch: FetchRequest::get(url), mode: RequestMode::Unknown, destination: Destination::Other }
    }

    /// A top-level page navigation.
    pub fn navigate(url: Url) -> Self {
        Self { fetch: FetchRequest::get(url), mode: RequestMode::Navigate, destination: Destination::Document }
    }

    /// Build from a relayed request, reading mode and destination from the
    /// browser's `Sec-Fetch-*` headers when present.
    ///
    /// Clients that send no `Sec-Fetch-Mode` but accept `text/html` are
    /// treated as navigations, so pages are never cached.
    pub fn from_parts(method: Method, url: Url, headers: HeaderMap, body: Option<bytes::Bytes>) -> Self {
        let mode = match headers.get("sec-fetch-mode").and_then(|v| v.to_str().ok()) {
            Some(value) => RequestMode::parse(value),
            None if accepts_html(&headers) => RequestMode::Navigate,
            None => RequestMode::Unknown,
        };
        let destination = headers
            .get("sec-fetch-dest")
            .and_then(|v| v.to_str().ok())
            .map(Destination::parse)
            .unwrap_or_default();
        Self { fetch: FetchRequest { method, url, headers, body }, mode, destination }
    }

    pub fn url(&self) -> &Url {
        &self.fetch.url
    }
}

fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get(reqwest::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// Choose the strategy for a request.
pub fn classify(request: &RouteRequest, api_markers: &[String]) -> Strategy {
    let url = request.url().as_str();
    let is_api = api_markers.iter().any(|marker| url.contains(marker.as_str()));

    if is_api || request.mode == RequestMode::Navigate || request.destination == Destination::Document {
        return Strategy::NetworkOnly;
    }

    if request.fetch.method != Method::GET {
        return Strategy::Passthrough;
    }

    Strategy::CacheFirst
}
