//! The configured request/response pipeline every resource call goes through.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use contentdesk_auth::TokenProvider;
use serde::Deserialize;
use url::Url;

use crate::error::Error;
use crate::executor::{HttpExecutor, ReqwestExecutor};
use crate::payload::RequestBody;
use crate::types::{HttpRequest, HttpResponse};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

/// Transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    pub base_url: Url,

    /// Headers sent with every request. `Accept: application/json` is always
    /// present unless overridden here or on the request.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,

    /// Timeout applied to requests that do not set their own.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl TransportConfig {
    pub fn new(base_url: &str) -> Result<Self, Error> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            default_headers: BTreeMap::new(),
            timeout_ms: default_timeout_ms(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The base URL with a trailing slash, so relative joins append to it.
    fn base(&self) -> Result<Url, Error> {
        if self.base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                message: format!("{} cannot be used as a base URL", self.base_url),
            });
        }
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base)
    }
}

/// HTTP transport with credential injection and auth-failure detection.
///
/// Outgoing requests get the base URL, default headers, a timeout and, when a
/// valid credential is stored, `Authorization: Bearer <token>`. Requests
/// marked [`authenticated`](HttpRequest::authenticated) fail before touching
/// the network when there is no valid credential.
///
/// A 401 or 403 response clears the stored credential and surfaces as
/// [`Error::Unauthenticated`], except for [`sign_in`](HttpRequest::sign_in)
/// requests. Every other response, success or not, is
/// returned to the caller unchanged.
pub struct Transport {
    config: TransportConfig,
    executor: Arc<dyn HttpExecutor>,
    tokens: Arc<TokenProvider>,
}

impl Transport {
    /// Create a transport backed by reqwest.
    pub fn new(config: TransportConfig, tokens: Arc<TokenProvider>) -> Result<Self, Error> {
        let executor = ReqwestExecutor::new()?;
        Ok(Self::with_executor(config, Arc::new(executor), tokens))
    }

    pub fn with_executor(
        config: TransportConfig,
        executor: Arc<dyn HttpExecutor>,
        tokens: Arc<TokenProvider>,
    ) -> Self {
        Self {
            config,
            executor,
            tokens,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenProvider> {
        &self.tokens
    }

    /// Resolve a request path against the base URL.
    ///
    /// Absolute `http(s)://` URLs pass through untouched.
    pub fn resolve_url(&self, path: &str) -> Result<Url, Error> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        Ok(self.config.base()?.join(path.trim_start_matches('/'))?)
    }

    /// Send a request through the interceptors.
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let request = self.prepare(request)?;
        let sign_in = request.sign_in;
        let method = request.method;
        let url = request.path.clone();

        tracing::debug!(%method, %url, "sending request");
        let response = self.executor.execute(request).await.inspect_err(|e| {
            tracing::debug!(%method, %url, error = %e, "request failed");
        })?;
        tracing::debug!(%method, %url, status = response.status, "received response");

        if sign_in {
            return Ok(response);
        }
        self.intercept_response(response)
    }

    fn prepare(&self, mut request: HttpRequest) -> Result<HttpRequest, Error> {
        request.path = self.resolve_url(&request.path)?.to_string();

        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        for (name, value) in &self.config.default_headers {
            headers.retain(|key: &String, _| !key.eq_ignore_ascii_case(name));
            headers.insert(name.clone(), value.clone());
        }
        for (name, value) in std::mem::take(&mut request.headers) {
            headers.retain(|key: &String, _| !key.eq_ignore_ascii_case(&name));
            headers.insert(name, value);
        }
        request.headers = headers;

        match &request.body {
            RequestBody::Json(_) => {
                request.remove_header("Content-Type");
                request
                    .headers
                    .insert("Content-Type".to_string(), "application/json".to_string());
            }
            // The multipart boundary is chosen by the executor.
            RequestBody::Multipart(_) => request.remove_header("Content-Type"),
            RequestBody::Empty => {}
        }

        if request.timeout.is_none() {
            request.timeout = Some(self.config.timeout());
        }

        let credential = if request.sign_in {
            None
        } else if request.authenticated {
            Some(self.tokens.preflight()?)
        } else {
            self.tokens.valid_credential()
        };
        if let Some(credential) = credential {
            if !request.has_header("Authorization") {
                request
                    .headers
                    .insert("Authorization".to_string(), credential.bearer());
            }
        }

        Ok(request)
    }

    fn intercept_response(&self, response: HttpResponse) -> Result<HttpResponse, Error> {
        if response.status == 401 || response.status == 403 {
            tracing::warn!(status = response.status, "credential rejected, ending session");
            if let Err(e) = self.tokens.clear_credential() {
                tracing::warn!(error = %e, "failed to clear rejected credential");
            }
            let message = response
                .message()
                .unwrap_or_else(|| format!("{} {}", response.status, response.status_text));
            return Err(Error::Unauthenticated { message });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::MockExecutor;
    use crate::payload::{Attachment, Payload};
    use crate::types::Method;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use contentdesk_auth::{Clock, Credential, FixedClock};
    use contentdesk_storage::InMemoryStore;
    use serde_json::json;

    struct Fixture {
        clock: Arc<FixedClock>,
        tokens: Arc<TokenProvider>,
        executor: MockExecutor,
        transport: Transport,
    }

    fn fixture(base: &str) -> Fixture {
        let clock = Arc::new(FixedClock::new(
            Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        ));
        let tokens = Arc::new(TokenProvider::with_clock(
            Arc::new(InMemoryStore::new()),
            clock.clone(),
        ));
        let executor = MockExecutor::new();
        let transport = Transport::with_executor(
            TransportConfig::new(base).unwrap(),
            Arc::new(executor.clone()),
            tokens.clone(),
        );
        Fixture {
            clock,
            tokens,
            executor,
            transport,
        }
    }

    fn log_in(f: &Fixture) {
        let cred = Credential::expiring_in("tok", f.clock.now(), ChronoDuration::hours(1));
        f.tokens.set_credential(&cred, &json!({"name": "Admin"})).unwrap();
    }

    #[test]
    fn resolve_url_appends_to_base_path() {
        let f = fixture("http://api.test/api");
        assert_eq!(
            f.transport.resolve_url("workshops").unwrap().as_str(),
            "http://api.test/api/workshops"
        );
        assert_eq!(
            f.transport.resolve_url("/workshops/5").unwrap().as_str(),
            "http://api.test/api/workshops/5"
        );
        assert_eq!(
            f.transport.resolve_url("https://cdn.test/x").unwrap().as_str(),
            "https://cdn.test/x"
        );
    }

    #[tokio::test]
    async fn defaults_are_applied() {
        let f = fixture("http://api.test/");
        f.executor.push_response(Method::GET, "/ping", HttpResponse::from_json(200, json!({})));

        f.transport.send(HttpRequest::get("ping")).await.unwrap();

        let sent = f.executor.last_request().unwrap();
        assert_eq!(sent.path, "http://api.test/ping");
        assert_eq!(sent.header("Accept"), Some("application/json"));
        assert_eq!(sent.timeout, Some(DEFAULT_TIMEOUT));
        assert!(!sent.has_header("Authorization"));
    }

    #[tokio::test]
    async fn per_call_timeout_wins() {
        let f = fixture("http://api.test/");
        f.transport
            .send(HttpRequest::get("slow").with_timeout(Duration::from_secs(120)))
            .await
            .unwrap();
        assert_eq!(
            f.executor.last_request().unwrap().timeout,
            Some(Duration::from_secs(120))
        );
    }

    #[tokio::test]
    async fn bearer_attached_when_credential_valid() {
        let f = fixture("http://api.test/");
        log_in(&f);

        f.transport.send(HttpRequest::get("public")).await.unwrap();
        assert_eq!(
            f.executor.last_request().unwrap().header("Authorization"),
            Some("Bearer tok")
        );
    }

    #[tokio::test]
    async fn expired_credential_not_attached_to_public_calls() {
        let f = fixture("http://api.test/");
        log_in(&f);
        f.clock.advance(ChronoDuration::hours(2));

        f.transport.send(HttpRequest::get("public")).await.unwrap();
        assert!(!f.executor.last_request().unwrap().has_header("Authorization"));
    }

    #[tokio::test]
    async fn protected_call_without_credential_never_hits_network() {
        let f = fixture("http://api.test/");

        let result = f
            .transport
            .send(HttpRequest::get("workshops").authenticated(true))
            .await;
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
        assert!(f.executor.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn protected_call_with_expired_credential_reports_session_expired() {
        let f = fixture("http://api.test/");
        log_in(&f);
        f.clock.advance(ChronoDuration::hours(1));

        let result = f
            .transport
            .send(HttpRequest::get("workshops").authenticated(true))
            .await;
        assert!(matches!(result, Err(Error::SessionExpired)));
        assert!(f.tokens.get_credential().is_none());
    }

    #[tokio::test]
    async fn unauthorized_response_clears_credential() {
        let f = fixture("http://api.test/");
        log_in(&f);
        f.executor.push_response(
            Method::GET,
            "/workshops",
            HttpResponse::from_json(401, json!({"message": "Token revoked"})),
        );

        let result = f
            .transport
            .send(HttpRequest::get("workshops").authenticated(true))
            .await;
        match result {
            Err(Error::Unauthenticated { message }) => assert_eq!(message, "Token revoked"),
            other => panic!("expected unauthenticated, got {:?}", other),
        }
        assert!(f.tokens.get_credential().is_none());

        // Without logging in again the next protected call fails up front.
        let again = f
            .transport
            .send(HttpRequest::get("workshops").authenticated(true))
            .await;
        assert!(matches!(again, Err(Error::Unauthenticated { .. })));
        assert_eq!(f.executor.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn forbidden_response_clears_credential() {
        let f = fixture("http://api.test/");
        log_in(&f);
        f.executor
            .push_response(Method::DELETE, "/blogs/1", HttpResponse::from_json(403, json!(null)));

        let result = f.transport.send(HttpRequest::delete("blogs/1")).await;
        match result {
            Err(Error::Unauthenticated { message }) => assert_eq!(message, "403 Forbidden"),
            other => panic!("expected unauthenticated, got {:?}", other),
        }
        assert!(f.tokens.get_credential().is_none());
    }

    #[tokio::test]
    async fn rejected_sign_in_keeps_current_session() {
        let f = fixture("http://api.test/");
        log_in(&f);
        f.executor.push_response(
            Method::POST,
            "/auth/login",
            HttpResponse::from_json(401, json!({"message": "Invalid credentials"})),
        );

        let response = f
            .transport
            .send(HttpRequest::post("auth/login").sign_in())
            .await
            .unwrap();

        assert_eq!(response.status, 401);
        assert!(f.tokens.get_credential().is_some());
        assert!(!f.executor.last_request().unwrap().has_header("Authorization"));
    }

    #[tokio::test]
    async fn non_auth_errors_pass_through() {
        let f = fixture("http://api.test/");
        f.executor.push_response(
            Method::GET,
            "/missing",
            HttpResponse::from_json(404, json!({"message": "nope"})),
        );
        let response = f.transport.send(HttpRequest::get("missing")).await.unwrap();
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn transport_failures_carry_message() {
        let f = fixture("http://api.test/");
        f.executor.set_failure(Some("connection refused".to_string()));

        let result = f.transport.send(HttpRequest::get("workshops")).await;
        assert!(matches!(result, Err(Error::Transport { .. })));
    }

    #[tokio::test]
    async fn json_body_gets_content_type() {
        let f = fixture("http://api.test/");
        let request = HttpRequest::post("workshops")
            .with_header("content-type", "text/plain")
            .with_payload(Payload::new().with_field("title", "Y"));
        f.transport.send(request).await.unwrap();

        let sent = f.executor.last_request().unwrap();
        assert_eq!(sent.header("Content-Type"), Some("application/json"));
        assert_eq!(sent.headers.len(), 2);
    }

    #[tokio::test]
    async fn multipart_body_leaves_content_type_to_executor() {
        let f = fixture("http://api.test/");
        let request = HttpRequest::post("workshops")
            .with_header("Content-Type", "application/json")
            .with_payload(
                Payload::new()
                    .with_field("title", "Y")
                    .with_file("image", Attachment::new("a.png", "image/png", vec![1u8])),
            );
        f.transport.send(request).await.unwrap();

        let sent = f.executor.last_request().unwrap();
        assert!(sent.body.is_multipart());
        assert!(!sent.has_header("Content-Type"));
    }

    #[tokio::test]
    async fn request_headers_override_defaults() {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let tokens = Arc::new(TokenProvider::with_clock(Arc::new(InMemoryStore::new()), clock));
        let executor = MockExecutor::new();
        let config = TransportConfig::new("http://api.test/")
            .unwrap()
            .with_default_header("X-Client", "contentdesk")
            .with_default_header("accept", "application/vnd.api+json");
        let transport = Transport::with_executor(config, Arc::new(executor.clone()), tokens);

        transport
            .send(HttpRequest::get("a").with_header("X-Client", "tests"))
            .await
            .unwrap();

        let sent = executor.last_request().unwrap();
        assert_eq!(sent.header("X-Client"), Some("tests"));
        assert_eq!(sent.header("Accept"), Some("application/vnd.api+json"));
        assert_eq!(sent.headers.len(), 2);
    }
}
