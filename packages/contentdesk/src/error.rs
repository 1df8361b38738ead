#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] contentdesk_storage::Error),

    #[error(transparent)]
    Auth(#[from] contentdesk_auth::Error),

    #[error(transparent)]
    Http(#[from] contentdesk_http::Error),

    #[error(transparent)]
    Resource(#[from] contentdesk_resource::Error),

    /// The login endpoint answered with something other than a session.
    #[error("{message}")]
    LoginFailed { status: u16, message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        match self {
            Error::Auth(e) => matches!(
                e,
                contentdesk_auth::Error::Unauthenticated | contentdesk_auth::Error::SessionExpired
            ),
            Error::Http(e) => e.is_unauthenticated(),
            Error::Resource(e) => e.is_unauthenticated(),
            _ => false,
        }
    }
}
