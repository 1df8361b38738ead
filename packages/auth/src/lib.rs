//! # contentdesk-auth
//!
//! Resolves the admin session credential from durable storage and tears the
//! session down when it expires or the server rejects it.
//!
//! The [`TokenProvider`] owns three storage keys (`access_token`, `admin`,
//! `expiry_time`) and always writes or clears them together. Anything that
//! caches per-session data can register as a [`SessionObserver`] and is told
//! synchronously whenever the credential is cleared.

pub mod clock;
pub mod credential;
pub mod error;
pub mod provider;

pub use clock::{Clock, SystemClock};
pub use credential::Credential;
pub use error::Error;
pub use provider::{SessionObserver, TokenProvider, ACCESS_TOKEN_KEY, EXPIRY_KEY, PROFILE_KEY};

#[cfg(any(test, feature = "test-utils"))]
pub use clock::FixedClock;
