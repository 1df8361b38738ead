use std::sync::Arc;

use contentdesk_auth::TokenProvider;
use contentdesk_http::{HttpExecutor, HttpRequest, ReqwestExecutor, Transport};
use contentdesk_resource::{Entity, ResourceClient, ResourceStore};
use contentdesk_storage::{KeyValueStore, LocalDiskStore};
use serde_json::{json, Value as JsonValue};

use crate::config::DashboardConfig;
use crate::error::Error;
use crate::models::{AdminProfile, Blog, Service, Settings, Subscriber, Workshop};
use crate::session::parse_login_response;

pub const LOGIN_PATH: &str = "auth/login";

/// One admin session and a store per managed resource.
///
/// Every store shares the same transport and token provider, and is reset
/// when the session ends, whether by [`Dashboard::logout`], expiry or a
/// rejected token.
pub struct Dashboard {
    config: DashboardConfig,
    tokens: Arc<TokenProvider>,
    transport: Arc<Transport>,
    workshops: Arc<ResourceStore<Workshop>>,
    services: Arc<ResourceStore<Service>>,
    blogs: Arc<ResourceStore<Blog>>,
    subscribers: Arc<ResourceStore<Subscriber>>,
    settings: Arc<ResourceStore<Settings>>,
}

impl Dashboard {
    /// Session on disk, requests over reqwest.
    pub fn new(config: DashboardConfig) -> Result<Self, Error> {
        let storage: Arc<dyn KeyValueStore> = match &config.storage_path {
            Some(path) => Arc::new(LocalDiskStore::new(path.clone())?),
            None => Arc::new(LocalDiskStore::in_default_location()?),
        };
        let executor = ReqwestExecutor::new()?;
        Self::from_parts(config, storage, Arc::new(executor))
    }

    pub fn from_parts(
        config: DashboardConfig,
        storage: Arc<dyn KeyValueStore>,
        executor: Arc<dyn HttpExecutor>,
    ) -> Result<Self, Error> {
        Self::with_tokens(config, Arc::new(TokenProvider::new(storage)), executor)
    }

    pub fn with_tokens(
        config: DashboardConfig,
        tokens: Arc<TokenProvider>,
        executor: Arc<dyn HttpExecutor>,
    ) -> Result<Self, Error> {
        let transport = Arc::new(Transport::with_executor(
            config.transport_config()?,
            executor,
            tokens.clone(),
        ));

        Ok(Self {
            workshops: store(&transport, "workshops"),
            services: store(&transport, "services"),
            blogs: store(&transport, "blogs"),
            subscribers: store(&transport, "subscribers"),
            settings: store(&transport, "settings"),
            config,
            tokens,
            transport,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenProvider> {
        &self.tokens
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn workshops(&self) -> &Arc<ResourceStore<Workshop>> {
        &self.workshops
    }

    pub fn services(&self) -> &Arc<ResourceStore<Service>> {
        &self.services
    }

    pub fn blogs(&self) -> &Arc<ResourceStore<Blog>> {
        &self.blogs
    }

    pub fn subscribers(&self) -> &Arc<ResourceStore<Subscriber>> {
        &self.subscribers
    }

    pub fn settings(&self) -> &Arc<ResourceStore<Settings>> {
        &self.settings
    }

    /// Exchange credentials for a session and persist it.
    ///
    /// A rejected login leaves any current session in place. On success the
    /// stores are reset first so nothing cached under a previous account is
    /// visible to the new one.
    pub async fn login(&self, email: &str, password: &str) -> Result<AdminProfile, Error> {
        let request = HttpRequest::post(LOGIN_PATH)
            .sign_in()
            .with_json_body(json!({"email": email, "password": password}));
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            tracing::warn!(status = response.status, "login failed");
            return Err(Error::LoginFailed {
                status: response.status,
                message: response
                    .message()
                    .unwrap_or_else(|| "Login failed".to_string()),
            });
        }

        let session = parse_login_response(&response.body, self.tokens.now()).ok_or_else(|| {
            Error::LoginFailed {
                status: response.status,
                message: "Login response did not include a token".to_string(),
            }
        })?;

        self.reset_stores();
        self.tokens
            .set_credential(&session.credential, &session.profile)?;
        tracing::info!(expires_at = %session.credential.expires_at, "logged in");

        Ok(decode_profile(session.profile))
    }

    /// Clear the stored session. Every store resets as a consequence.
    pub fn logout(&self) -> Result<(), Error> {
        self.tokens.clear_credential()?;
        tracing::info!("logged out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.valid_credential().is_some()
    }

    /// The stored admin profile, while the session is valid.
    pub fn profile(&self) -> Option<AdminProfile> {
        if !self.is_authenticated() {
            return None;
        }
        self.tokens.profile().map(decode_profile)
    }

    pub fn reset_stores(&self) {
        self.workshops.reset();
        self.services.reset();
        self.blogs.reset();
        self.subscribers.reset();
        self.settings.reset();
    }
}

fn store<T: Entity>(transport: &Arc<Transport>, resource: &str) -> Arc<ResourceStore<T>> {
    ResourceStore::observing(
        ResourceClient::new(transport.clone(), resource),
        transport.tokens(),
    )
}

fn decode_profile(profile: JsonValue) -> AdminProfile {
    serde_json::from_value(profile).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "stored profile is not an object");
        AdminProfile::default()
    })
}
