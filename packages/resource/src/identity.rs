//! Entity identity.
//!
//! Records coming back from the API are loosely shaped. The only field every
//! one of them is guaranteed to carry is an identifier, looked up in order
//! under `id`, `_id` and `uuid`.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Field names probed for an identifier, in priority order.
pub const IDENTITY_FIELDS: [&str; 3] = ["id", "_id", "uuid"];

/// An entity identifier: numeric or textual.
///
/// `5` and `"5"` name the same entity; equality and hashing go through the
/// textual form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Text(String),
}

impl EntityId {
    /// Read an identifier out of a JSON value. Empty strings, `null`,
    /// non-integral numbers and compound values are not identifiers.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n.as_i64().map(EntityId::Int).or_else(|| {
                n.as_u64().map(|u| EntityId::Text(u.to_string()))
            }),
            JsonValue::String(s) if !s.trim().is_empty() => Some(EntityId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            EntityId::Int(i) => JsonValue::from(*i),
            EntityId::Text(s) => JsonValue::from(s.as_str()),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            EntityId::Int(_) => false,
            EntityId::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(i) => write!(f, "{}", i),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EntityId::Int(a), EntityId::Int(b)) => a == b,
            (EntityId::Text(a), EntityId::Text(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Int(id)
    }
}

impl From<i32> for EntityId {
    fn from(id: i32) -> Self {
        EntityId::Int(id.into())
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        EntityId::Int(id.into())
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Text(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        EntityId::Text(id)
    }
}

impl From<&EntityId> for EntityId {
    fn from(id: &EntityId) -> Self {
        id.clone()
    }
}

/// The identity lookup over a JSON object.
pub fn identity_of(value: &JsonValue) -> Option<EntityId> {
    IDENTITY_FIELDS
        .iter()
        .find_map(|field| value.get(*field).and_then(EntityId::from_json))
}

/// A record managed by a resource client.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn identity(&self) -> Option<EntityId>;

    fn has_identity(&self, id: &EntityId) -> bool {
        self.identity().is_some_and(|own| own == *id)
    }
}

impl Entity for JsonValue {
    fn identity(&self) -> Option<EntityId> {
        identity_of(self)
    }
}

/// The three identity fields as they appear on typed records.
///
/// Flatten this into a record struct to get [`Entity::identity`] for free
/// through [`IdentityFields::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityFields {
    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,

    #[serde(
        rename = "_id",
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub mongo_id: Option<EntityId>,

    #[serde(default, deserialize_with = "lenient_id", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<EntityId>,
}

// Anything that is not a usable identifier reads as absent instead of failing
// the whole record.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<EntityId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    Ok(EntityId::from_json(&value))
}

impl IdentityFields {
    pub fn resolve(&self) -> Option<EntityId> {
        [&self.id, &self.mongo_id, &self.uuid]
            .into_iter()
            .flatten()
            .find(|id| !id.is_blank())
            .cloned()
    }
}
