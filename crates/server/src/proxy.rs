//! HTTP front for the cache router.
//!
//! Every request, whatever its path, is mapped onto the configured origin and
//! handed to the router. The response is relayed back with connection-scoped
//! headers removed and an `x-celi-source` header naming where it came from.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;
use celi_client::RouteRequest;
use celi_client::fetch::is_hop_by_hop;
use celi_client::{CacheRouter, RoutedResponse};

use crate::error::ProxyError;

/// Header naming the response source: `cache`, `network`, or `offline`.
pub const SOURCE_HEADER: &str = "x-celi-source";

#[derive(Clone)]
pub struct ProxyState {
    pub router: CacheRouter,
    /// Largest request body relayed upstream.
    pub body_limit: usize,
}

/// Build the proxy app. All paths go to one fallback handler.
pub fn app(state: ProxyState) -> Router {
    Router::new().fallback(relay).with_state(state)
}

async fn relay(State(state): State<ProxyState>, request: Request) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let target = parts.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = state
        .router
        .config()
        .origin
        .join(target)
        .map_err(|e| ProxyError::InvalidTarget(format!("{target}: {e}")))?;

    let body = to_bytes(body, state.body_limit)
        .await
        .map_err(|e| ProxyError::BadRequest(format!("request body: {e}")))?;
    let body = if body.is_empty() { None } else { Some(body) };

    let request = RouteRequest::from_parts(parts.method, url, strip_hop_by_hop(&parts.headers), body);
    let routed = state.router.handle(request).await?;

    Ok(into_response(routed))
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(name.as_str()) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

fn into_response(routed: RoutedResponse) -> Response {
    let mut response = Response::new(Body::from(routed.body));
    *response.status_mut() = routed.status;
    *response.headers_mut() = strip_hop_by_hop(&routed.headers);
    response
        .headers_mut()
        .insert(HeaderName::from_static(SOURCE_HEADER), HeaderValue::from_static(routed.source.as_str()));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode, header};
    use celi_client::{FetchClient, FetchConfig, RouterConfig};
    use celi_core::CacheDb;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use url::Url;
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn proxy_for(origin: &str, manifest: &[&str]) -> (Router, CacheRouter) {
        let config = RouterConfig {
            manifest: manifest.iter().map(|s| s.to_string()).collect(),
            ..RouterConfig::new("celi-cache-test", Url::parse(origin).unwrap())
        };
        let fetch = FetchClient::new(FetchConfig { timeout: Duration::from_secs(2), ..Default::default() }).unwrap();
        let db = CacheDb::open_in_memory().await.unwrap();
        let router = CacheRouter::new(config, db, Arc::new(fetch));
        let app = app(ProxyState { router: router.clone(), body_limit: 1024 });
        (app, router)
    }

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_manifest_asset_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/static/js/core.js"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("console.log(1)", "application/javascript"))
            .expect(1)
            .mount(&server)
            .await;

        let (app, router) = proxy_for(&server.uri(), &["/static/js/core.js"]).await;
        router.start().await.unwrap();

        let response = app.oneshot(get("/static/js/core.js")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SOURCE_HEADER], "cache");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/javascript");
        assert_eq!(body_text(response).await, "console.log(1)");
    }

    #[tokio::test]
    async fn test_navigation_offline_gets_fallback() {
        let (app, router) = proxy_for("http://127.0.0.1:9", &["/static/js/core.js"]).await;
        // Install fails against a dead origin; the proxy keeps serving.
        assert!(router.start().await.is_err());

        let request = Request::builder()
            .uri("/dashboard")
            .header("sec-fetch-mode", "navigate")
            .header("sec-fetch-dest", "document")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[SOURCE_HEADER], "offline");
        assert!(response.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
        assert_eq!(body_text(response).await, router.config().offline_message);
    }

    #[tokio::test]
    async fn test_uncached_asset_offline_is_bad_gateway() {
        let (app, _router) = proxy_for("http://127.0.0.1:9", &[]).await;

        let response = app.oneshot(get("/static/img/new.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_api_request_relayed_with_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user_data"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"username":"ada"}"#, "application/json"))
            .mount(&server)
            .await;

        let (app, router) = proxy_for(&server.uri(), &[]).await;
        router.start().await.unwrap();

        let response = app.oneshot(get("/api/user_data?fresh=1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SOURCE_HEADER], "network");
        assert_eq!(body_text(response).await, r#"{"username":"ada"}"#);
        assert!(router.db().list_entries("celi-cache-test").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_post_body_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/update_profile"))
            .and(body_string("bio=hi"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"status":"success"}"#, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let (app, _router) = proxy_for(&server.uri(), &[]).await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/update_profile")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("bio=hi"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let (app, _router) = proxy_for("http://127.0.0.1:9", &[]).await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .body(Body::from(vec![b'a'; 4096]))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8080"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=abc"));

        let stripped = strip_hop_by_hop(&headers);
        assert_eq!(stripped.len(), 1);
        assert_eq!(stripped[header::COOKIE], "session=abc");
    }
}
