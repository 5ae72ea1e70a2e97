//! Responses handed back to the page, and their stored snapshot form.

use bytes::Bytes;
use celi_core::{CachedResponse, ResponseType};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::fetch::{FetchResponse, same_origin};

/// Where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    /// Synthesized because the network was unreachable.
    Offline,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Offline => "offline",
        }
    }
}

/// Response produced by the router for one request.
#[derive(Debug, Clone)]
pub struct RoutedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub response_type: ResponseType,
    pub source: ResponseSource,
}

impl RoutedResponse {
    pub fn from_network(response: FetchResponse, response_type: ResponseType) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.bytes,
            response_type,
            source: ResponseSource::Network,
        }
    }

    /// Rebuild a stored snapshot verbatim. Header pairs that no longer parse
    /// are dropped rather than failing the whole response.
    pub fn from_cache(entry: CachedResponse) -> Self {
        let mut headers = HeaderMap::with_capacity(entry.headers.len());
        for (name, value) in &entry.headers {
            if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                headers.append(name, value);
            }
        }

        Self {
            status: StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK),
            headers,
            body: Bytes::from(entry.body),
            response_type: entry.response_type,
            source: ResponseSource::Cache,
        }
    }

    /// The plain-text fallback for API and navigation requests.
    pub fn offline(message: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            headers,
            body: Bytes::copy_from_slice(message.as_bytes()),
            response_type: ResponseType::Basic,
            source: ResponseSource::Offline,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

/// Classify a response by whether it was served from the app origin.
pub fn response_type_for(final_url: &Url, origin: &Url) -> ResponseType {
    if same_origin(final_url, origin) { ResponseType::Basic } else { ResponseType::Cors }
}

/// Snapshot a network response for storage under `request_url`.
pub fn snapshot(request_url: &Url, response: &FetchResponse, response_type: ResponseType) -> CachedResponse {
    let headers = response
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();

    CachedResponse {
        url: request_url.to_string(),
        final_url: response.final_url.to_string(),
        status: response.status.as_u16(),
        status_text: response.status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body: response.bytes.to_vec(),
        response_type,
        stored_at: chrono::Utc::now().to_rfc3339(),
    }
}
