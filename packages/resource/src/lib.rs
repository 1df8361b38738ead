//! # contentdesk-resource
//!
//! Generic CRUD over a remote collection, in two layers:
//!
//! - [`ResourceClient`] maps `list`/`get`/`create`/`update`/`remove` onto
//!   `/<resource>` and `/<resource>/:id`, normalizes whatever envelope the
//!   server answers with, and turns failures into one [`Error`] taxonomy.
//! - [`ResourceStore`] caches what the client returns and publishes loading,
//!   error and data changes to any number of subscribers.
//!
//! ```ignore
//! let workshops = ResourceStore::observing(
//!     ResourceClient::<serde_json::Value>::new(transport.clone(), "workshops"),
//!     transport.tokens(),
//! );
//!
//! let mut changes = workshops.subscribe();
//! workshops.fetch_all(ListParams::new().page(1)).await?;
//! println!("{} workshops", changes.borrow_and_update().collection.len());
//! ```

pub mod client;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod params;
pub mod store;

pub use client::{
    split_identity, ClientOptions, MultipartUpdate, Operation, ResourceClient,
    METHOD_OVERRIDE_FIELD,
};
pub use envelope::{normalize_item, normalize_list, PageMeta, ResourceEnvelope};
pub use error::Error;
pub use identity::{identity_of, Entity, EntityId, IdentityFields, IDENTITY_FIELDS};
pub use params::ListParams;
pub use store::{ResourceState, ResourceStore};
