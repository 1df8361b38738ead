//! Observable cache over a [`ResourceClient`].
//!
//! A [`ResourceStore`] holds the last fetched collection, the current
//! selection and loading/error flags, and publishes every change through a
//! [`tokio::sync::watch`] channel. Each operation clears `error` and raises
//! `loading` when it starts. Failures are recorded and then returned to the
//! caller unchanged.
//!
//! Cache maintenance after a successful mutation:
//!
//! - create refetches the collection with the last used [`ListParams`];
//! - update replaces the matching record in place (and the selection),
//!   merging the sent fields when the server returns no record;
//! - delete removes the matching record (and clears the selection).

use std::sync::{Arc, Mutex};

use contentdesk_auth::{SessionObserver, TokenProvider};
use contentdesk_http::Payload;
use tokio::sync::watch;

use crate::client::{split_identity, ResourceClient};
use crate::envelope::PageMeta;
use crate::error::Error;
use crate::identity::{Entity, EntityId};
use crate::params::ListParams;

/// Snapshot of a store.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    /// Server order from the last successful fetch.
    pub collection: Vec<T>,
    pub selected: Option<T>,
    pub meta: Option<PageMeta>,
    /// Last write wins when operations overlap.
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self {
            collection: Vec::new(),
            selected: None,
            meta: None,
            loading: false,
            error: None,
        }
    }
}

pub struct ResourceStore<T: Entity> {
    client: ResourceClient<T>,
    state: watch::Sender<ResourceState<T>>,
    last_params: Mutex<ListParams>,
}

impl<T: Entity> ResourceStore<T> {
    pub fn new(client: ResourceClient<T>) -> Self {
        let (state, _) = watch::channel(ResourceState::default());
        Self {
            client,
            state,
            last_params: Mutex::new(ListParams::default()),
        }
    }

    /// Create a shared store that resets itself whenever the session held by
    /// `tokens` is cleared.
    pub fn observing(client: ResourceClient<T>, tokens: &TokenProvider) -> Arc<Self> {
        let store = Arc::new(Self::new(client));
        store.observe_session(tokens);
        store
    }

    pub fn observe_session(self: &Arc<Self>, tokens: &TokenProvider) {
        let observer: Arc<dyn SessionObserver> = self.clone();
        tokens.subscribe(Arc::downgrade(&observer));
    }

    pub fn client(&self) -> &ResourceClient<T> {
        &self.client
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ResourceState<T> {
        self.state.borrow().clone()
    }

    /// Load the collection. On failure the previous collection stays visible.
    pub async fn fetch_all(&self, params: ListParams) -> Result<Vec<T>, Error> {
        self.begin();
        if let Ok(mut last) = self.last_params.lock() {
            *last = params.clone();
        }

        match self.client.list(&params).await {
            Ok(envelope) => {
                let items = envelope.items().to_vec();
                self.state.send_modify(|state| {
                    state.collection = envelope.items.unwrap_or_default();
                    state.meta = envelope.meta;
                    state.loading = false;
                });
                Ok(items)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Load one record into `selected`.
    pub async fn fetch_one(&self, id: &EntityId) -> Result<Option<T>, Error> {
        self.begin();
        match self.client.get(id).await {
            Ok(item) => {
                self.state.send_modify(|state| {
                    state.selected = item.clone();
                    state.loading = false;
                });
                Ok(item)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Create a record, then refetch the collection.
    ///
    /// If the refetch fails the created record is appended locally instead,
    /// and the refetch error stays recorded.
    pub async fn create_one(&self, body: Payload) -> Result<T, Error> {
        self.begin();
        let created = match self.client.create(body).await {
            Ok(created) => created,
            Err(e) => return Err(self.fail(e)),
        };

        let params = self
            .last_params
            .lock()
            .map(|params| params.clone())
            .unwrap_or_default();
        if let Err(e) = self.fetch_all(params).await {
            tracing::warn!(resource = %self.client.resource(), error = %e, "refresh after create failed");
            let record = created.clone();
            self.state.send_modify(|state| upsert(&mut state.collection, record));
        }

        Ok(created)
    }

    /// Update a record and patch it into the cache by identity.
    ///
    /// When the server only acknowledges the update, the sent fields are
    /// merged into the cached record instead. A record that is not cached is
    /// fetched.
    pub async fn update_one(&self, id: &EntityId, body: Payload) -> Result<T, Error> {
        self.begin();
        let sent = body.clone();
        let updated = match self.client.update(id, body).await {
            Ok(Some(updated)) => updated,
            Ok(None) => match self.merged_with_cache(id, &sent) {
                Some(merged) => merged,
                None => match self.client.get(id).await {
                    Ok(Some(fresh)) => fresh,
                    Ok(None) => {
                        return Err(self.fail(Error::MalformedResponse {
                            message: format!(
                                "Failed to update {}: record {} could not be reloaded",
                                self.client.resource(),
                                id
                            ),
                        }))
                    }
                    Err(e) => return Err(self.fail(e)),
                },
            },
            Err(e) => return Err(self.fail(e)),
        };

        self.state.send_modify(|state| {
            for item in state.collection.iter_mut() {
                if item.has_identity(id) {
                    *item = updated.clone();
                }
            }
            if state.selected.as_ref().is_some_and(|s| s.has_identity(id)) {
                state.selected = Some(updated.clone());
            }
            state.loading = false;
        });
        Ok(updated)
    }

    /// [`ResourceStore::update_one`] for a body carrying its own identifier.
    pub async fn update_one_merged(&self, body: Payload) -> Result<T, Error> {
        match split_identity(body) {
            Ok((id, body)) => self.update_one(&id, body).await,
            Err(e) => {
                self.begin();
                Err(self.fail(e))
            }
        }
    }

    /// Delete a record and drop it from the cache.
    pub async fn delete_one(&self, id: &EntityId) -> Result<(), Error> {
        self.begin();
        match self.client.remove(id).await {
            Ok(()) => {
                self.state.send_modify(|state| {
                    state.collection.retain(|item| !item.has_identity(id));
                    if state.selected.as_ref().is_some_and(|s| s.has_identity(id)) {
                        state.selected = None;
                    }
                    state.loading = false;
                });
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Forget everything cached, including the last list parameters.
    pub fn reset(&self) {
        if let Ok(mut last) = self.last_params.lock() {
            *last = ListParams::default();
        }
        self.state.send_replace(ResourceState::default());
    }

    fn merged_with_cache(&self, id: &EntityId, sent: &Payload) -> Option<T> {
        let state = self.state.borrow();
        let cached = state
            .collection
            .iter()
            .chain(state.selected.iter())
            .find(|item| item.has_identity(id))?;
        merge_fields(cached, sent).filter(|merged| merged.has_identity(id))
    }

    fn begin(&self) {
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
    }

    fn fail(&self, error: Error) -> Error {
        tracing::debug!(resource = %self.client.resource(), error = %error, "store operation failed");
        let message = error.to_string();
        self.state.send_modify(|state| {
            state.loading = false;
            state.error = Some(message);
        });
        error
    }
}

impl<T: Entity> SessionObserver for ResourceStore<T> {
    fn session_cleared(&self) {
        tracing::debug!(resource = %self.client.resource(), "session cleared, resetting store");
        self.reset();
    }
}

/// `record` with every JSON field of `fields` written over it.
fn merge_fields<T: Entity>(record: &T, fields: &Payload) -> Option<T> {
    let mut value = serde_json::to_value(record).ok()?;
    let object = value.as_object_mut()?;
    for (name, field) in fields.fields() {
        if let Some(json) = field.as_json() {
            object.insert(name.to_string(), json.clone());
        }
    }
    serde_json::from_value(value).ok()
}

fn upsert<T: Entity>(collection: &mut Vec<T>, record: T) {
    let existing = record
        .identity()
        .and_then(|id| collection.iter().position(|item| item.has_identity(&id)));
    match existing {
        Some(index) => collection[index] = record,
        None => collection.push(record),
    }
}
