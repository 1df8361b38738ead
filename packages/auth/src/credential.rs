use chrono::{DateTime, TimeZone, Utc};

/// A bearer token and the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// A credential that expires `ttl` after `now`.
    pub fn expiring_in(token: impl Into<String>, now: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self::new(token, now + ttl)
    }

    /// True iff `now` is strictly before the expiry instant.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.token.is_empty() && now < self.expires_at
    }

    /// Value of the `Authorization` header for this credential.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub(crate) fn expiry_millis(&self) -> String {
        self.expires_at.timestamp_millis().to_string()
    }

    pub(crate) fn parse_expiry_millis(raw: &str) -> Option<DateTime<Utc>> {
        let millis: i64 = raw.trim().parse().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}
