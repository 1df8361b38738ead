use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::payload::{Payload, RequestBody};

/// HTTP method for requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::PATCH => "PATCH",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::PUT => http::Method::PUT,
            Method::DELETE => http::Method::DELETE,
            Method::PATCH => http::Method::PATCH,
        }
    }
}

/// A full HTTP request specification.
///
/// `path` is relative to the transport's base URL unless it is already an
/// absolute `http(s)://` URL. By the time an [`HttpExecutor`](crate::HttpExecutor)
/// sees the request the transport has resolved it to an absolute URL.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: Method,

    pub path: String,

    pub query: BTreeMap<String, String>,

    pub headers: BTreeMap<String, String>,

    pub body: RequestBody,

    /// Per-call timeout. The transport fills in its default when unset.
    pub timeout: Option<Duration>,

    /// Protected requests fail before any network I/O when no valid
    /// credential is stored.
    pub authenticated: bool,

    /// A credential exchange such as a login. No bearer is attached, and a
    /// 401/403 answer comes back as a plain response instead of ending the
    /// current session.
    pub sign_in: bool,

    pub cancel: Option<CancellationToken>,
}

impl HttpRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json_body(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    /// Encode `payload` as JSON or multipart depending on whether it carries
    /// attachments.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.body = payload.encode();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    pub fn sign_in(mut self) -> Self {
        self.sign_in = true;
        self.authenticated = false;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    pub(crate) fn remove_header(&mut self, name: &str) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
    }
}

/// HTTP response from a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,

    /// Status text (e.g., "OK", "Not Found")
    pub status_text: String,

    /// Response headers
    pub headers: BTreeMap<String, String>,

    /// Response body as JSON value
    /// Will be null if body was empty or not valid JSON
    pub body: serde_json::Value,

    /// Raw body as string (useful when body isn't JSON)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
}

impl HttpResponse {
    /// Build a response from a status and JSON body.
    pub fn from_json(status: u16, body: serde_json::Value) -> Self {
        let status_text = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown")
            .to_string();
        let body_text = if body.is_null() {
            String::new()
        } else {
            body.to_string()
        };
        Self {
            status,
            status_text,
            headers: BTreeMap::new(),
            body,
            body_text: Some(body_text),
        }
    }

    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// The server-provided error message: `body.message`, then `body.error`.
    pub fn message(&self) -> Option<String> {
        ["message", "error"].iter().find_map(|key| {
            match self.body.get(*key)? {
                serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builders_set_method_and_path() {
        assert_eq!(HttpRequest::get("a").method, Method::GET);
        assert_eq!(HttpRequest::post("a").method, Method::POST);
        assert_eq!(HttpRequest::put("a").method, Method::PUT);
        assert_eq!(HttpRequest::patch("a").method, Method::PATCH);
        let req = HttpRequest::delete("workshops/1");
        assert_eq!(req.method, Method::DELETE);
        assert_eq!(req.path, "workshops/1");
        assert!(!req.authenticated);
        assert!(req.body.is_empty());
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest::get("a").with_header("authorization", "Bearer x");
        assert_eq!(req.header("Authorization"), Some("Bearer x"));
        assert!(req.has_header("AUTHORIZATION"));
        assert!(!req.has_header("Accept"));
    }

    #[test]
    fn remove_header_ignores_case() {
        let mut req = HttpRequest::get("a").with_header("Content-Type", "text/plain");
        req.remove_header("content-type");
        assert!(req.headers.is_empty());
    }

    #[test]
    fn response_status_helpers() {
        assert!(HttpResponse::from_json(204, json!(null)).is_success());
        assert!(HttpResponse::from_json(422, json!({})).is_client_error());
        assert!(HttpResponse::from_json(503, json!({})).is_server_error());
        assert_eq!(HttpResponse::from_json(404, json!({})).status_text, "Not Found");
    }

    #[test]
    fn message_prefers_message_then_error() {
        let both = HttpResponse::from_json(400, json!({"message": "m", "error": "e"}));
        assert_eq!(both.message(), Some("m".to_string()));

        let error_only = HttpResponse::from_json(400, json!({"error": "e"}));
        assert_eq!(error_only.message(), Some("e".to_string()));

        let blank = HttpResponse::from_json(400, json!({"message": "  ", "error": {"x": 1}}));
        assert_eq!(blank.message(), None);

        let not_object = HttpResponse::from_json(500, json!("oops"));
        assert_eq!(not_object.message(), None);
    }

    #[test]
    fn method_display() {
        assert_eq!(Method::PATCH.to_string(), "PATCH");
        assert_eq!(http::Method::from(Method::DELETE), http::Method::DELETE);
    }
}
