//! Token provider: the single owner of persisted session state.

use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use contentdesk_storage::KeyValueStore;
use serde_json::Value as JsonValue;

use crate::clock::{Clock, SystemClock};
use crate::credential::Credential;
use crate::error::Error;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const PROFILE_KEY: &str = "admin";
pub const EXPIRY_KEY: &str = "expiry_time";

const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, PROFILE_KEY, EXPIRY_KEY];

/// Something holding per-session state that must be dropped on logout.
pub trait SessionObserver: Send + Sync {
    /// Called synchronously after the credential has been cleared.
    fn session_cleared(&self);
}

/// Reads, writes and validates the persisted admin credential.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use contentdesk_auth::{Credential, TokenProvider};
/// use contentdesk_storage::InMemoryStore;
///
/// let tokens = TokenProvider::new(Arc::new(InMemoryStore::new()));
/// let credential = Credential::expiring_in("abc", tokens.now(), chrono::Duration::hours(1));
/// tokens.set_credential(&credential, &serde_json::json!({"name": "Admin"})).unwrap();
///
/// assert!(tokens.valid_credential().is_some());
/// tokens.clear_credential().unwrap();
/// assert!(tokens.get_credential().is_none());
/// ```
pub struct TokenProvider {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    observers: Mutex<Vec<Weak<dyn SessionObserver>>>,
}

impl TokenProvider {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    pub fn with_clock(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Read the stored credential.
    ///
    /// Returns `None` when nothing is stored or the stored fields cannot be
    /// parsed. Storage failures are logged, never returned.
    pub fn get_credential(&self) -> Option<Credential> {
        let token = match self.storage.get(ACCESS_TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored access token");
                return None;
            }
        };

        let raw_expiry = match self.storage.get(EXPIRY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::warn!("stored access token has no expiry");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored token expiry");
                return None;
            }
        };

        match Credential::parse_expiry_millis(&raw_expiry) {
            Some(expires_at) => Some(Credential::new(token, expires_at)),
            None => {
                tracing::warn!(expiry = %raw_expiry, "stored token expiry is not epoch millis");
                None
            }
        }
    }

    /// True iff a credential is present and has not expired yet.
    pub fn is_valid(&self, credential: Option<&Credential>) -> bool {
        credential.is_some_and(|c| c.is_valid_at(self.now()))
    }

    /// The stored credential, if it is still valid. Does not clear anything.
    pub fn valid_credential(&self) -> Option<Credential> {
        self.get_credential()
            .filter(|credential| credential.is_valid_at(self.now()))
    }

    /// Persist a new credential together with the admin profile.
    ///
    /// All three session keys are written in one batch.
    pub fn set_credential(&self, credential: &Credential, profile: &JsonValue) -> Result<(), Error> {
        let profile = serde_json::to_string(profile)?;
        self.storage.set_many(&[
            (ACCESS_TOKEN_KEY, credential.token.clone()),
            (PROFILE_KEY, profile),
            (EXPIRY_KEY, credential.expiry_millis()),
        ])?;
        tracing::debug!(expires_at = %credential.expires_at, "stored credential");
        Ok(())
    }

    /// The admin profile stored alongside the credential.
    pub fn profile(&self) -> Option<JsonValue> {
        let raw = match self.storage.get(PROFILE_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored profile");
                return None;
            }
        };
        serde_json::from_str(&raw).ok()
    }

    /// Remove every session key and notify observers.
    ///
    /// Observers are notified even when the storage removal fails, so cached
    /// data from the old session never outlives it in memory.
    pub fn clear_credential(&self) -> Result<(), Error> {
        let removed = self.storage.remove_many(&SESSION_KEYS);
        self.notify_cleared();
        removed?;
        tracing::debug!("cleared credential");
        Ok(())
    }

    /// Check that a protected call may proceed.
    ///
    /// An expired credential is cleared on the spot and reported as
    /// [`Error::SessionExpired`]; a missing one as [`Error::Unauthenticated`].
    pub fn preflight(&self) -> Result<Credential, Error> {
        match self.get_credential() {
            Some(credential) if credential.is_valid_at(self.now()) => Ok(credential),
            Some(credential) => {
                tracing::warn!(expired_at = %credential.expires_at, "session expired");
                if let Err(e) = self.clear_credential() {
                    tracing::warn!(error = %e, "failed to clear expired credential");
                }
                Err(Error::SessionExpired)
            }
            None => Err(Error::Unauthenticated),
        }
    }

    /// Register an observer. Only a weak reference is kept.
    pub fn subscribe(&self, observer: Weak<dyn SessionObserver>) {
        if let Ok(mut observers) = self.observers.lock() {
            observers.retain(|o| o.strong_count() > 0);
            observers.push(observer);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .map(|observers| observers.iter().filter(|o| o.strong_count() > 0).count())
            .unwrap_or(0)
    }

    fn notify_cleared(&self) {
        // Callbacks run outside the lock so observers may subscribe again.
        let live: Vec<Arc<dyn SessionObserver>> = match self.observers.lock() {
            Ok(mut observers) => {
                observers.retain(|o| o.strong_count() > 0);
                observers.iter().filter_map(Weak::upgrade).collect()
            }
            Err(_) => Vec::new(),
        };
        for observer in live {
            observer.session_cleared();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, TimeZone};
    use contentdesk_storage::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fixture() -> (Arc<InMemoryStore>, Arc<FixedClock>, TokenProvider) {
        let storage = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        ));
        let provider = TokenProvider::with_clock(storage.clone(), clock.clone());
        (storage, clock, provider)
    }

    #[derive(Default)]
    struct CountingObserver {
        cleared: AtomicUsize,
    }

    impl SessionObserver for CountingObserver {
        fn session_cleared(&self) {
            self.cleared.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn empty_storage_has_no_credential() {
        let (_, _, provider) = fixture();
        assert!(provider.get_credential().is_none());
        assert!(!provider.is_valid(None));
        assert!(matches!(provider.preflight(), Err(Error::Unauthenticated)));
    }

    #[test]
    fn set_credential_writes_all_keys() {
        let (storage, clock, provider) = fixture();
        let cred = Credential::expiring_in("tok", clock.now(), Duration::hours(1));
        provider
            .set_credential(&cred, &serde_json::json!({"name": "Admin"}))
            .unwrap();

        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), Some("tok".to_string()));
        assert_eq!(
            storage.get(EXPIRY_KEY).unwrap(),
            Some("1700003600000".to_string())
        );
        assert_eq!(provider.profile(), Some(serde_json::json!({"name": "Admin"})));
        assert_eq!(provider.get_credential(), Some(cred));
    }

    #[test]
    fn unparseable_expiry_reads_as_absent() {
        let (storage, _, provider) = fixture();
        storage
            .set_many(&[
                (ACCESS_TOKEN_KEY, "tok".to_string()),
                (EXPIRY_KEY, "tomorrow".to_string()),
            ])
            .unwrap();
        assert!(provider.get_credential().is_none());
    }

    #[test]
    fn token_without_expiry_reads_as_absent() {
        let (storage, _, provider) = fixture();
        storage
            .set_many(&[(ACCESS_TOKEN_KEY, "tok".to_string())])
            .unwrap();
        assert!(provider.get_credential().is_none());
    }

    #[test]
    fn clear_removes_every_key() {
        let (storage, clock, provider) = fixture();
        let cred = Credential::expiring_in("tok", clock.now(), Duration::hours(1));
        provider.set_credential(&cred, &serde_json::json!({})).unwrap();

        provider.clear_credential().unwrap();
        assert!(storage.is_empty());
        assert!(provider.profile().is_none());
    }

    #[test]
    fn expired_preflight_clears_and_reports_session_expired() {
        let (storage, clock, provider) = fixture();
        let cred = Credential::expiring_in("tok", clock.now(), Duration::minutes(5));
        provider.set_credential(&cred, &serde_json::json!({})).unwrap();
        assert!(provider.preflight().is_ok());

        clock.advance(Duration::minutes(5));
        assert!(matches!(provider.preflight(), Err(Error::SessionExpired)));
        assert!(storage.is_empty());
        // Nothing left to expire: the next call is plainly unauthenticated.
        assert!(matches!(provider.preflight(), Err(Error::Unauthenticated)));
    }

    #[test]
    fn valid_credential_does_not_clear() {
        let (storage, clock, provider) = fixture();
        let cred = Credential::expiring_in("tok", clock.now(), Duration::minutes(1));
        provider.set_credential(&cred, &serde_json::json!({})).unwrap();
        clock.advance(Duration::minutes(2));

        assert!(provider.valid_credential().is_none());
        assert!(!storage.is_empty());
    }

    #[test]
    fn observers_are_notified_on_clear() {
        let (_, _, provider) = fixture();
        let observer = Arc::new(CountingObserver::default());
        let weak: Weak<dyn SessionObserver> = Arc::downgrade(&observer) as Weak<dyn SessionObserver>;
        provider.subscribe(weak);

        provider.clear_credential().unwrap();
        provider.clear_credential().unwrap();
        assert_eq!(observer.cleared.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropped_observers_are_pruned() {
        let (_, _, provider) = fixture();
        {
            let observer: Arc<dyn SessionObserver> = Arc::new(CountingObserver::default());
            provider.subscribe(Arc::downgrade(&observer));
            assert_eq!(provider.observer_count(), 1);
        }
        assert_eq!(provider.observer_count(), 0);
        provider.clear_credential().unwrap();
    }
}
