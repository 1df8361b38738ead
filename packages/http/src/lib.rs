//! # contentdesk-http
//!
//! HTTP transport for contentdesk resource clients.
//!
//! ## Pieces
//!
//! - [`HttpRequest`] / [`HttpResponse`]: plain request and response values.
//! - [`Payload`]: named request fields. Attachments anywhere in a payload switch
//!   the encoding from JSON to `multipart/form-data`, decided once per call.
//! - [`HttpExecutor`]: the seam that actually performs I/O. [`ReqwestExecutor`]
//!   is the production implementation; `MockExecutor` (feature `test-utils`)
//!   serves canned responses in tests.
//! - [`Transport`]: base URL, default headers, timeout policy, bearer
//!   injection and 401/403 session teardown.
//!
//! ```ignore
//! use std::sync::Arc;
//! use contentdesk_http::{HttpRequest, Transport, TransportConfig};
//!
//! let transport = Transport::new(TransportConfig::new("https://api.example.com/")?, tokens)?;
//! let response = transport.send(HttpRequest::get("workshops").authenticated(true)).await?;
//! ```

pub mod error;
pub mod executor;
pub mod payload;
pub mod transport;
pub mod types;

pub use error::Error;
pub use executor::{HttpExecutor, ReqwestExecutor};
pub use payload::{Attachment, FieldValue, MultipartField, MultipartValue, Payload, RequestBody};
pub use transport::{Transport, TransportConfig, DEFAULT_TIMEOUT};
pub use types::{HttpRequest, HttpResponse, Method};

pub use tokio_util::sync::CancellationToken;

#[cfg(any(test, feature = "test-utils"))]
pub use executor::mock::MockExecutor;
