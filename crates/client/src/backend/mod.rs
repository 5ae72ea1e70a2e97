//! App backend client.
//!
//! Speaks the small JSON contract the dashboard pages rely on.
//!
//! ### Endpoints
//!
//! - `GET /api/user_data`: user/session snapshot.
//! - `POST /api/update_profile`: profile edit as form or JSON, answered with
//!   `{status: success|error|guest, message}`.
//!
//! A `guest` reply, or a redirect on a data request, means the session is not
//! logged in and the caller should go to the login route.

pub mod error;
pub mod types;

pub use error::BackendError;
pub use types::{ContractReply, DashboardSnapshot, Encoding, ProfileOutcome, ProfileUpdate, ReplyStatus};

use std::time::{Duration, Instant};

use celi_core::AppConfig;
use reqwest::header;
use url::Url;

const DASHBOARD_PATH: &str = "/api/user_data";
const PROFILE_PATH: &str = "/api/update_profile";

/// Backend client configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// App origin the endpoints live under.
    pub base_url: Url,
    /// Login route guests are sent to (default: /login).
    pub login_path: String,
    pub timeout: Duration,
    pub user_agent: String,
    /// Raw `Cookie` header value forwarded on every call.
    pub session_cookie: Option<String>,
}

impl BackendConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, BackendError> {
        let base_url = config.origin_url().map_err(|e| BackendError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            base_url,
            login_path: config.login_path.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            session_cookie: None,
        })
    }

    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }
}

/// Client for the app backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: BackendConfig,
}

impl BackendClient {
    /// Redirects are not followed: a redirect to the login page has to be
    /// seen, not silently fetched as HTML.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Absolute URL of the login route.
    pub fn login_url(&self) -> Result<Url, BackendError> {
        self.join(&self.config.login_path)
    }

    /// Fetch the user/session snapshot.
    pub async fn dashboard(&self) -> Result<DashboardSnapshot, BackendError> {
        let start = Instant::now();
        let url = self.join(DASHBOARD_PATH)?;

        let response = self
            .with_session(self.http.get(url))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "dashboard response");

        if status.is_redirection() {
            let location = self.redirect_target(&response)?;
            return Err(BackendError::LoginRequired(location.to_string()));
        }

        if !status.is_success() {
            return Err(BackendError::HttpError { status: status.as_u16() });
        }

        let bytes = response.bytes().await?;
        let snapshot: DashboardSnapshot =
            serde_json::from_slice(&bytes).map_err(|e| BackendError::Parse(e.to_string()))?;

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            history = snapshot.history.len(),
            "dashboard snapshot loaded"
        );

        Ok(snapshot)
    }

    /// Submit a profile edit.
    ///
    /// Contract replies with an error status still come back as `Ok`
    /// ([`ProfileOutcome::Rejected`]); only transport failures and
    /// unreadable responses are `Err`.
    pub async fn update_profile(
        &self, update: &ProfileUpdate, encoding: Encoding,
    ) -> Result<ProfileOutcome, BackendError> {
        update.validate()?;

        let url = self.join(PROFILE_PATH)?;
        let request = self
            .with_session(self.http.post(url))
            .header(header::ACCEPT, "application/json");
        let request = match encoding {
            Encoding::Form => request.form(update),
            Encoding::Json => request.json(update),
        };

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(status = status.as_u16(), ?encoding, "profile update response");

        if status.is_redirection() {
            let location = self.redirect_target(&response)?;
            return Ok(ProfileOutcome::RedirectToLogin(location.to_string()));
        }

        let bytes = response.bytes().await?;
        let reply: ContractReply = match serde_json::from_slice(&bytes) {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => return Err(BackendError::HttpError { status: status.as_u16() }),
            Err(e) => return Err(BackendError::Parse(e.to_string())),
        };

        let outcome = match reply.status {
            ReplyStatus::Success => ProfileOutcome::Updated(reply.text()),
            ReplyStatus::Error => ProfileOutcome::Rejected(reply.text()),
            ReplyStatus::Guest => ProfileOutcome::RedirectToLogin(self.login_url()?.to_string()),
        };

        tracing::info!(?outcome, "profile update finished");
        Ok(outcome)
    }

    fn with_session(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.session_cookie {
            Some(cookie) => request.header(header::COOKIE, cookie),
            None => request,
        }
    }

    fn join(&self, path: &str) -> Result<Url, BackendError> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| BackendError::InvalidUrl(format!("{path}: {e}")))
    }

    /// Resolve the `Location` of a redirect, falling back to the login route.
    fn redirect_target(&self, response: &reqwest::Response) -> Result<Url, BackendError> {
        match response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()) {
            Some(location) => response
                .url()
                .join(location)
                .map_err(|e| BackendError::InvalidUrl(format!("{location}: {e}"))),
            None => self.login_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_string_contains, header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BackendClient {
        let config = BackendConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            login_path: "/login".into(),
            timeout: Duration::from_secs(5),
            user_agent: "celi-test".into(),
            session_cookie: None,
        };
        BackendClient::new(config).unwrap()
    }

    fn bio_update() -> ProfileUpdate {
        ProfileUpdate { bio: Some("stargazer".into()), ..Default::default() }
    }

    #[test]
    fn test_config_from_app_config() {
        let config = BackendConfig::from_app_config(&AppConfig::default()).unwrap();
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:5000/");
        assert_eq!(config.login_path, "/login");
        assert!(config.session_cookie.is_none());

        let config = config.with_session_cookie("session=abc");
        assert_eq!(config.session_cookie.as_deref(), Some("session=abc"));
    }

    #[tokio::test]
    async fn test_dashboard_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user_data"))
            .and(header_is("cookie", "session=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"username":"ada","level":2,"history":{"e1":{"mood":"calm"}}}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        client.config = client.config.clone().with_session_cookie("session=abc");

        let snapshot = client.dashboard().await.unwrap();
        assert_eq!(snapshot.username.as_deref(), Some("ada"));
        assert_eq!(snapshot.level, Some(2));
        assert!(snapshot.history.contains_key("e1"));
    }

    #[tokio::test]
    async fn test_dashboard_redirect_means_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user_data"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/login"))
            .mount(&server)
            .await;

        let result = client_for(&server).dashboard().await;
        assert!(matches!(result, Err(BackendError::LoginRequired(ref url)) if url.ends_with("/login")));
    }

    #[tokio::test]
    async fn test_dashboard_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user_data"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server).dashboard().await;
        assert!(matches!(result, Err(BackendError::HttpError { status: 500 })));
    }

    #[tokio::test]
    async fn test_update_profile_form_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/update_profile"))
            .and(header_is("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("bio=stargazer"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"status":"success","message":"Profile updated"}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let outcome = client_for(&server).update_profile(&bio_update(), Encoding::Form).await.unwrap();
        assert_eq!(outcome, ProfileOutcome::Updated("Profile updated".into()));
    }

    #[tokio::test]
    async fn test_update_profile_json_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/update_profile"))
            .and(body_json(serde_json::json!({"bio": "stargazer"})))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_raw(r#"{"status":"error","message":"Bio too long"}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let outcome = client_for(&server).update_profile(&bio_update(), Encoding::Json).await.unwrap();
        assert_eq!(outcome, ProfileOutcome::Rejected("Bio too long".into()));
    }

    #[tokio::test]
    async fn test_update_profile_guest_redirects_to_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/update_profile"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"status":"guest","message":"Log in first"}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let outcome = client_for(&server).update_profile(&bio_update(), Encoding::Form).await.unwrap();
        assert_eq!(outcome, ProfileOutcome::RedirectToLogin(format!("{}/login", server.uri())));
    }

    #[tokio::test]
    async fn test_update_profile_invalid_input_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let result = client_for(&server).update_profile(&ProfileUpdate::default(), Encoding::Form).await;
        assert!(matches!(result, Err(BackendError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_update_profile_unreadable_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/update_profile"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let result = client_for(&server).update_profile(&bio_update(), Encoding::Form).await;
        assert!(matches!(result, Err(BackendError::HttpError { status: 502 })));
    }
}
