//! HTTP execution abstraction for testing.
//!
//! This module provides a trait for HTTP execution that can be mocked in tests,
//! avoiding the need for actual network calls.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::error::Error;
use crate::payload::{MultipartValue, RequestBody};
use crate::types::{HttpRequest, HttpResponse};

/// Trait for executing HTTP requests.
///
/// Implementations can use real HTTP clients or mock responses for testing.
/// Any response that arrives, whatever its status, is `Ok`; `Err` is reserved
/// for requests that never produced a response.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error>;
}

/// Production HTTP executor using reqwest.
#[derive(Clone)]
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    pub fn new() -> Result<Self, Error> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build(&self, request: HttpRequest) -> Result<reqwest::RequestBuilder, Error> {
        let method: http::Method = request.method.into();

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = HeaderName::try_from(name.as_str())?;
            let header_value = HeaderValue::try_from(value.as_str())?;
            headers.insert(header_name, header_value);
        }

        let mut req_builder = self.client.request(method, &request.path);
        req_builder = req_builder.headers(headers);

        if !request.query.is_empty() {
            req_builder = req_builder.query(&request.query);
        }

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        req_builder = match request.body {
            RequestBody::Empty => req_builder,
            RequestBody::Json(body) => req_builder.json(&body),
            RequestBody::Multipart(fields) => {
                let mut form = Form::new();
                for field in fields {
                    form = match field.value {
                        MultipartValue::Text(text) => form.text(field.name, text),
                        MultipartValue::File(file) => {
                            let part = Part::bytes(file.bytes.to_vec())
                                .file_name(file.file_name)
                                .mime_str(&file.content_type)?;
                            form.part(field.name, part)
                        }
                    };
                }
                req_builder.multipart(form)
            }
        };

        Ok(req_builder)
    }
}

async fn read_response(response: reqwest::Response) -> Result<HttpResponse, Error> {
    let status = response.status().as_u16();
    let status_text = response
        .status()
        .canonical_reason()
        .unwrap_or("Unknown")
        .to_string();

    let mut headers = BTreeMap::new();
    for (name, value) in response.headers() {
        if let Ok(v) = value.to_str() {
            headers.insert(name.to_string(), v.to_string());
        }
    }

    let body_text = response.text().await?;
    let body = serde_json::from_str(&body_text).unwrap_or(serde_json::Value::Null);

    Ok(HttpResponse {
        status,
        status_text,
        headers,
        body,
        body_text: Some(body_text),
    })
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let cancel = request.cancel.clone();
        let builder = self.build(request)?;

        let exchange = async {
            let response = builder.send().await?;
            read_response(response).await
        };

        match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(Error::Cancelled),
                result = exchange => result,
            },
            None => exchange.await,
        }
    }
}

/// Mock HTTP executor for testing.
///
/// Returns predefined responses based on request matching.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use crate::types::Method;

    type RouteKey = (Method, String);

    /// A mock HTTP executor that returns predefined responses.
    ///
    /// Responses are keyed by method and URL path (`/workshops/5`). Several
    /// responses queued for one route are served in order; the last one keeps
    /// being served once the queue is down to it.
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        responses: Arc<Mutex<HashMap<RouteKey, VecDeque<HttpResponse>>>>,
        recorded_requests: Arc<Mutex<Vec<HttpRequest>>>,
        failure: Arc<Mutex<Option<String>>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response for `method` on `path`.
        pub fn with_response(self, method: Method, path: &str, response: HttpResponse) -> Self {
            self.push_response(method, path, response);
            self
        }

        pub fn with_json(self, method: Method, path: &str, status: u16, body: serde_json::Value) -> Self {
            self.with_response(method, path, HttpResponse::from_json(status, body))
        }

        /// Queue a response after construction, e.g. between two calls.
        pub fn push_response(&self, method: Method, path: &str, response: HttpResponse) {
            if let Ok(mut responses) = self.responses.lock() {
                responses
                    .entry((method, normalize(path)))
                    .or_default()
                    .push_back(response);
            }
        }

        /// Configure to fail all requests with a transport error.
        pub fn fail_with(self, message: impl Into<String>) -> Self {
            self.set_failure(Some(message.into()));
            self
        }

        pub fn set_failure(&self, message: Option<String>) {
            if let Ok(mut failure) = self.failure.lock() {
                *failure = message;
            }
        }

        pub fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.recorded_requests
                .lock()
                .map(|recorded| recorded.clone())
                .unwrap_or_default()
        }

        pub fn last_request(&self) -> Option<HttpRequest> {
            self.recorded_requests().pop()
        }

        pub fn clear_recorded(&self) {
            if let Ok(mut recorded) = self.recorded_requests.lock() {
                recorded.clear();
            }
        }
    }

    fn normalize(path: &str) -> String {
        let path = url::Url::parse(path)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| path.to_string());
        if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        }
    }

    #[async_trait]
    impl HttpExecutor for MockExecutor {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
            if let Ok(mut recorded) = self.recorded_requests.lock() {
                recorded.push(request.clone());
            }

            if let Some(token) = &request.cancel {
                if token.is_cancelled() {
                    return Err(Error::Cancelled);
                }
            }

            let failure = self.failure.lock().ok().and_then(|f| f.clone());
            if let Some(message) = failure {
                return Err(Error::transport(message));
            }

            let key = (request.method, normalize(&request.path));
            let mut responses = self
                .responses
                .lock()
                .map_err(|_| Error::transport("mock lock poisoned"))?;
            let response = match responses.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            };

            Ok(response.unwrap_or_else(|| {
                HttpResponse::from_json(404, serde_json::json!({"message": "Not Found"}))
            }))
        }
    }
}
