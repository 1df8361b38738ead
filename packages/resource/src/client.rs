//! Generic CRUD client for one remote collection.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use contentdesk_http::{
    CancellationToken, FieldValue, HttpRequest, HttpResponse, Method, Payload, Transport,
};
use serde_json::Value as JsonValue;

use crate::envelope::{normalize_item, normalize_list, ResourceEnvelope};
use crate::error::Error;
use crate::identity::{Entity, EntityId, IDENTITY_FIELDS};
use crate::params::ListParams;

/// Form field carrying the real method when an update goes out as a POST.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

/// How an update carrying attachments is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultipartUpdate {
    /// `PATCH /<resource>/:id` with a multipart body.
    Patch,
    /// `POST /<resource>/:id` with `_method=PATCH` in the form. Most form
    /// parsers only read multipart bodies on POST.
    #[default]
    PostWithOverride,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Send requests without requiring a stored credential.
    pub public: bool,
    /// Treat a 404 on delete as success: the record is gone either way.
    pub idempotent_delete: bool,
    pub multipart_update: MultipartUpdate,
    /// Overrides the transport's default timeout for this resource.
    pub timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            public: false,
            idempotent_delete: true,
            multipart_update: MultipartUpdate::default(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::List | Operation::Get => "fetch",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// CRUD operations against `/<resource>` and `/<resource>/:id`.
///
/// # Example
///
/// ```ignore
/// let workshops: ResourceClient<Workshop> = ResourceClient::new(transport, "workshops");
///
/// let page = workshops.list(&ListParams::new().page(1)).await?;
/// let created = workshops
///     .create(Payload::new().with_field("title", "Y").with_file("image", cover))
///     .await?;
/// workshops.remove(&EntityId::from(99)).await?;
/// ```
pub struct ResourceClient<T> {
    transport: Arc<Transport>,
    resource: String,
    options: ClientOptions,
    cancel: Option<CancellationToken>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            resource: self.resource.clone(),
            options: self.options.clone(),
            cancel: self.cancel.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity> ResourceClient<T> {
    pub fn new(transport: Arc<Transport>, resource: impl Into<String>) -> Self {
        Self {
            transport,
            resource: resource.into().trim_matches('/').to_string(),
            options: ClientOptions::default(),
            cancel: None,
            _marker: PhantomData,
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// A copy of this client whose requests abort when `token` is cancelled.
    pub fn cancellable(&self, token: CancellationToken) -> Self {
        let mut client = self.clone();
        client.cancel = Some(token);
        client
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    /// `GET /<resource>`, normalized into an envelope.
    pub async fn list(&self, params: &ListParams) -> Result<ResourceEnvelope<T>, Error> {
        let mut request = self.request(Method::GET, self.resource.clone());
        for (name, value) in params.iter() {
            request = request.with_query(name, value);
        }
        let response = self.send(request, Operation::List, None).await?;
        Ok(normalize_list(response.body).decode())
    }

    /// `GET /<resource>/:id`. A 404 is [`Error::NotFound`]; a 2xx without a
    /// recognizable record is `Ok(None)`.
    pub async fn get(&self, id: &EntityId) -> Result<Option<T>, Error> {
        let path = self.item_path(id, Operation::Get)?;
        let request = self.request(Method::GET, path);
        let response = self.send(request, Operation::Get, Some(id)).await?;
        Ok(normalize_item(response.body).decode().item)
    }

    /// `POST /<resource>`.
    pub async fn create(&self, body: Payload) -> Result<T, Error> {
        let request = self
            .request(Method::POST, self.resource.clone())
            .with_payload(body);
        let response = self.send(request, Operation::Create, None).await?;
        self.expect_record(response, Operation::Create)
    }

    /// `PATCH /<resource>/:id`.
    ///
    /// `Ok(None)` when the server acknowledged the update without sending the
    /// record back, e.g. `{"success": true, "message": "Updated"}`.
    ///
    /// With attachments and [`MultipartUpdate::PostWithOverride`] the request
    /// goes out as a POST carrying `_method=PATCH`.
    pub async fn update(&self, id: &EntityId, mut body: Payload) -> Result<Option<T>, Error> {
        let path = self.item_path(id, Operation::Update)?;

        let method = if body.has_attachments()
            && self.options.multipart_update == MultipartUpdate::PostWithOverride
        {
            body.set(METHOD_OVERRIDE_FIELD, FieldValue::Json(JsonValue::from("PATCH")));
            Method::POST
        } else {
            Method::PATCH
        };

        let request = self.request(method, path).with_payload(body);
        let response = self.send(request, Operation::Update, Some(id)).await?;
        Ok(identified_record(response))
    }

    /// Update from a single object that carries its own identifier.
    ///
    /// Kept for callers that pass a whole record around. The identifier is
    /// taken out of the body before it is sent.
    pub async fn update_merged(&self, body: Payload) -> Result<Option<T>, Error> {
        let (id, body) = split_identity(body)?;
        self.update(&id, body).await
    }

    /// `DELETE /<resource>/:id`.
    pub async fn remove(&self, id: &EntityId) -> Result<(), Error> {
        let path = self.item_path(id, Operation::Delete)?;
        let request = self.request(Method::DELETE, path);
        match self.send(request, Operation::Delete, Some(id)).await {
            Ok(_) => Ok(()),
            Err(Error::NotFound { .. }) if self.options.idempotent_delete => {
                tracing::debug!(resource = %self.resource, %id, "already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn request(&self, method: Method, path: String) -> HttpRequest {
        let mut request = HttpRequest::new(method, path).authenticated(!self.options.public);
        if let Some(timeout) = self.options.timeout {
            request = request.with_timeout(timeout);
        }
        if let Some(token) = &self.cancel {
            request = request.with_cancellation(token.clone());
        }
        request
    }

    fn item_path(&self, id: &EntityId, operation: Operation) -> Result<String, Error> {
        if id.is_blank() {
            return Err(Error::configuration(format!(
                "cannot {} {} without an id",
                operation.verb(),
                self.resource
            )));
        }
        let mut url = self.transport.resolve_url(&self.resource)?;
        url.path_segments_mut()
            .map_err(|()| Error::configuration(format!("{} cannot hold an item path", self.resource)))?
            .pop_if_empty()
            .push(&id.to_string());
        Ok(url.to_string())
    }

    fn fallback_message(&self, operation: Operation) -> String {
        format!("Failed to {} {}", operation.verb(), self.resource)
    }

    async fn send(
        &self,
        request: HttpRequest,
        operation: Operation,
        id: Option<&EntityId>,
    ) -> Result<HttpResponse, Error> {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e @ contentdesk_http::Error::Transport { .. }) => {
                tracing::warn!(resource = %self.resource, error = %e, "request failed");
                return Err(Error::Transport {
                    message: self.fallback_message(operation),
                    source: Some(Box::new(e)),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if response.is_success() {
            return Ok(response);
        }

        Err(self.status_error(&response, operation, id))
    }

    fn status_error(
        &self,
        response: &HttpResponse,
        operation: Operation,
        id: Option<&EntityId>,
    ) -> Error {
        let message = response
            .message()
            .unwrap_or_else(|| self.fallback_message(operation));

        match response.status {
            404 => Error::NotFound {
                resource: self.resource.clone(),
                id: id.cloned(),
                message,
            },
            status if response.is_client_error() => Error::Validation {
                status,
                message,
                fields: field_errors(&response.body),
            },
            status => Error::Server { status, message },
        }
    }

    fn expect_record(&self, response: HttpResponse, operation: Operation) -> Result<T, Error> {
        identified_record(response).ok_or_else(|| Error::MalformedResponse {
                message: format!(
                    "{}: response did not contain a record",
                    self.fallback_message(operation)
                ),
            })
    }
}

/// The record in a mutation reply. Anything without an identifier is a
/// status message, not a record.
fn identified_record<T: Entity>(response: HttpResponse) -> Option<T> {
    normalize_item(response.body)
        .decode::<T>()
        .item
        .filter(|item| item.identity().is_some())
}

/// Pull the identifier out of a merged object, returning it and the rest.
pub fn split_identity(mut body: Payload) -> Result<(EntityId, Payload), Error> {
    let mut found = None;
    for field in IDENTITY_FIELDS {
        if let Some(FieldValue::Json(value)) = body.remove(field) {
            if found.is_none() {
                found = EntityId::from_json(&value);
            }
        }
    }
    match found {
        Some(id) => Ok((id, body)),
        None => Err(Error::configuration(
            "update requires an id, _id or uuid field",
        )),
    }
}

/// Per-field messages from `{errors: {field: [..]}}` or
/// `{errors: [{field|param|path, message|msg}]}`.
fn field_errors(body: &JsonValue) -> BTreeMap<String, Vec<String>> {
    let mut fields = BTreeMap::new();
    match body.get("errors") {
        Some(JsonValue::Object(map)) => {
            for (field, messages) in map {
                let messages = match messages {
                    JsonValue::String(s) => vec![s.clone()],
                    JsonValue::Array(items) => items
                        .iter()
                        .filter_map(|m| m.as_str().map(str::to_string))
                        .collect(),
                    _ => Vec::new(),
                };
                if !messages.is_empty() {
                    fields.insert(field.clone(), messages);
                }
            }
        }
        Some(JsonValue::Array(items)) => {
            for item in items {
                let field = ["field", "param", "path"]
                    .iter()
                    .find_map(|key| item.get(*key).and_then(JsonValue::as_str));
                let message = ["message", "msg"]
                    .iter()
                    .find_map(|key| item.get(*key).and_then(JsonValue::as_str));
                if let (Some(field), Some(message)) = (field, message) {
                    fields
                        .entry(field.to_string())
                        .or_insert_with(Vec::new)
                        .push(message.to_string());
                }
            }
        }
        _ => {}
    }
    fields
}
