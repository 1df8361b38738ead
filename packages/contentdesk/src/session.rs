//! Login response parsing.
//!
//! Login endpoints disagree on where they put things. The token may be
//! `access_token` or `token`, at the top level or under `data`. Expiry may
//! be relative (`expires_in`, seconds) or absolute (`expiry_time` or
//! `expires_at`, epoch milliseconds). The profile may be `admin` or `user`.

use chrono::{DateTime, TimeZone, Utc};
use contentdesk_auth::Credential;
use serde_json::Value as JsonValue;

/// Session length assumed when the server does not say.
pub const DEFAULT_SESSION_MINUTES: i64 = 60;

const TOKEN_KEYS: [&str; 2] = ["access_token", "token"];
const PROFILE_KEYS: [&str; 2] = ["admin", "user"];
const ABSOLUTE_EXPIRY_KEYS: [&str; 2] = ["expiry_time", "expires_at"];

#[derive(Debug, Clone, PartialEq)]
pub struct LoginSession {
    pub credential: Credential,
    pub profile: JsonValue,
}

/// Extract a session from a login response body. `None` when there is no token.
pub fn parse_login_response(body: &JsonValue, now: DateTime<Utc>) -> Option<LoginSession> {
    let mut scopes = vec![body];
    if let Some(data) = body.get("data").filter(|d| d.is_object()) {
        scopes.push(data);
    }

    let token = scopes.iter().find_map(|scope| {
        TOKEN_KEYS.iter().find_map(|key| {
            scope
                .get(*key)
                .and_then(JsonValue::as_str)
                .filter(|t| !t.trim().is_empty())
        })
    })?;

    let expires_at = scopes
        .iter()
        .find_map(|scope| expiry(scope, now))
        .unwrap_or_else(|| now + chrono::Duration::minutes(DEFAULT_SESSION_MINUTES));

    let profile = scopes
        .iter()
        .find_map(|scope| {
            PROFILE_KEYS
                .iter()
                .find_map(|key| scope.get(*key).filter(|p| p.is_object()))
        })
        .cloned()
        .unwrap_or_else(|| JsonValue::Object(Default::default()));

    Some(LoginSession {
        credential: Credential::new(token, expires_at),
        profile,
    })
}

fn expiry(scope: &JsonValue, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(seconds) = scope.get("expires_in").and_then(as_i64) {
        return Some(now + chrono::Duration::seconds(seconds));
    }
    ABSOLUTE_EXPIRY_KEYS.iter().find_map(|key| {
        let millis = scope.get(*key).and_then(as_i64)?;
        Utc.timestamp_millis_opt(millis).single()
    })
}

fn as_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
