//! # contentdesk
//!
//! Client side of the contentdesk admin dashboard: one authenticated session
//! and an observable store for each resource the dashboard manages
//! (workshops, services, blogs, subscribers, settings).
//!
//! The layers underneath are usable on their own:
//!
//! - [`contentdesk_storage`]: durable key/value storage for the session;
//! - [`contentdesk_auth`]: the token provider and session teardown;
//! - [`contentdesk_http`]: the transport, payload encoding and executors;
//! - [`contentdesk_resource`]: generic resource clients and stores.
//!
//! ```ignore
//! use contentdesk::{observability, Dashboard, DashboardConfig, ListParams};
//!
//! observability::init_tracing();
//! let dashboard = Dashboard::new(DashboardConfig::from_env()?)?;
//!
//! if !dashboard.is_authenticated() {
//!     dashboard.login("admin@example.com", "password").await?;
//! }
//! dashboard.workshops().fetch_all(ListParams::new().page(1)).await?;
//! for workshop in &dashboard.workshops().snapshot().collection {
//!     println!("{}", workshop.title);
//! }
//! dashboard.logout()?;
//! ```

pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod observability;
pub mod session;

pub use config::DashboardConfig;
pub use dashboard::Dashboard;
pub use error::Error;
pub use models::{AdminProfile, Blog, Service, Settings, Subscriber, Workshop};
pub use session::{parse_login_response, LoginSession};

pub use contentdesk_auth as auth;
pub use contentdesk_http as http;
pub use contentdesk_resource as resource;
pub use contentdesk_storage as storage;

pub use contentdesk_http::{Attachment, CancellationToken, Payload};
pub use contentdesk_resource::{EntityId, ListParams, ResourceState, ResourceStore};
