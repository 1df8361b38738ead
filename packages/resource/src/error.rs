use std::collections::BTreeMap;

use crate::identity::EntityId;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by resource clients and stores.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// No valid credential, or the server rejected it (401/403).
    #[error("{message}")]
    Unauthenticated { message: String },

    #[error("Your session has expired. Please log in again.")]
    SessionExpired,

    #[error("{message}")]
    NotFound {
        resource: String,
        id: Option<EntityId>,
        message: String,
    },

    /// The server rejected a payload. `fields` holds per-field messages when
    /// the server sent any.
    #[error("{message}")]
    Validation {
        status: u16,
        message: String,
        fields: BTreeMap<String, Vec<String>>,
    },

    /// Any other non-2xx response.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Network failure, timeout or a response that could not be understood.
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A 2xx response that did not contain what the operation returns.
    #[error("{message}")]
    MalformedResponse { message: String },

    #[error("Request cancelled")]
    Cancelled,

    /// The call was made without what it needs, e.g. an update without an
    /// identifier. Never sent over the network.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Error::Unauthenticated { .. } | Error::SessionExpired)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Field-level validation messages, if any.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Error::Validation { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        }
    }
}

impl From<contentdesk_http::Error> for Error {
    fn from(error: contentdesk_http::Error) -> Self {
        use contentdesk_http::Error as HttpError;

        match error {
            HttpError::Unauthenticated { message } => Error::Unauthenticated { message },
            HttpError::SessionExpired => Error::SessionExpired,
            HttpError::Cancelled => Error::Cancelled,
            HttpError::Transport { message, source } => Error::Transport { message, source },
            HttpError::InvalidUrl { message } | HttpError::InvalidPayload { message } => {
                Error::Configuration { message }
            }
            other @ (HttpError::UrlParse(_)
            | HttpError::InvalidHeaderName(_)
            | HttpError::InvalidHeaderValue(_)) => Error::Configuration {
                message: other.to_string(),
            },
            HttpError::Json(e) => Error::Transport {
                message: "malformed JSON".to_string(),
                source: Some(Box::new(e)),
            },
        }
    }
}
