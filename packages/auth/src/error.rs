#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session storage error: {0}")]
    Storage(#[from] contentdesk_storage::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
