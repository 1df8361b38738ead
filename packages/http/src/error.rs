type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The server rejected the credential (401/403) or none was available
    /// for a protected request.
    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    #[error("Session expired")]
    SessionExpired,

    /// Network failure, timeout or unreadable response.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// True for both a rejected and an expired session.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Error::Unauthenticated { .. } | Error::SessionExpired)
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        let message = if error.is_timeout() {
            "request timed out".to_string()
        } else if error.is_connect() {
            "connection failed".to_string()
        } else if error.is_decode() || error.is_body() {
            "malformed response body".to_string()
        } else {
            error.to_string()
        };
        Error::Transport {
            message,
            source: Some(Box::new(error)),
        }
    }
}

impl From<contentdesk_auth::Error> for Error {
    fn from(error: contentdesk_auth::Error) -> Self {
        match error {
            contentdesk_auth::Error::SessionExpired => Error::SessionExpired,
            other => Error::Unauthenticated {
                message: other.to_string(),
            },
        }
    }
}
