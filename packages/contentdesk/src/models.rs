//! Records managed by the dashboard.
//!
//! The API guarantees nothing beyond an identifier, so every field defaults
//! when missing and tolerates the usual type drift (numbers sent as strings,
//! booleans sent as `0`/`1`). Fields the models do not name are kept in
//! `extra` and sent back untouched.

use contentdesk_resource::{Entity, EntityId, IdentityFields};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

macro_rules! impl_entity {
    ($($model:ty),+ $(,)?) => {
        $(
            impl Entity for $model {
                fn identity(&self) -> Option<EntityId> {
                    self.ids.resolve()
                }
            }
        )+
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workshop {
    #[serde(flatten)]
    pub ids: IdentityFields,
    #[serde(default, deserialize_with = "text")]
    pub title: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
    #[serde(default, deserialize_with = "number")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "optional_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub location: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(flatten)]
    pub ids: IdentityFields,
    #[serde(default, deserialize_with = "text")]
    pub title: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
    #[serde(default, deserialize_with = "number")]
    pub price: Option<f64>,
    /// Minutes.
    #[serde(default, deserialize_with = "number")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "optional_text")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blog {
    #[serde(flatten)]
    pub ids: IdentityFields,
    #[serde(default, deserialize_with = "text")]
    pub title: String,
    #[serde(default, deserialize_with = "text")]
    pub slug: String,
    #[serde(default, deserialize_with = "text")]
    pub content: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub excerpt: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub published: bool,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    #[serde(flatten)]
    pub ids: IdentityFields,
    #[serde(default, deserialize_with = "text")]
    pub email: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Site-wide settings. Usually a single record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub ids: IdentityFields,
    #[serde(default, deserialize_with = "optional_text")]
    pub site_name: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub contact_email: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub address: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// The signed-in administrator, as stored with the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminProfile {
    #[serde(flatten)]
    pub ids: IdentityFields,
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub email: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl_entity!(Workshop, Service, Blog, Subscriber, Settings, AdminProfile);

fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => Some(s),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_text(deserializer)?.unwrap_or_default())
}

fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Bool(b) => b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        JsonValue::String(s) => matches!(s.trim(), "1" | "true" | "yes" | "published"),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn workshop_tolerates_loose_fields() {
        let workshop: Workshop = serde_json::from_value(json!({
            "_id": "65f0",
            "title": "Clay basics",
            "price": "45.50",
            "location": null,
            "capacity": 12
        }))
        .unwrap();

        assert_eq!(workshop.identity(), Some(EntityId::from("65f0")));
        assert_eq!(workshop.title, "Clay basics");
        assert_eq!(workshop.price, Some(45.5));
        assert_eq!(workshop.location, "");
        assert_eq!(workshop.description, "");
        assert_eq!(workshop.extra.get("capacity"), Some(&json!(12)));
        assert!(!workshop.extra.contains_key("_id"));
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = json!({"id": 3, "title": "Post", "slug": "post", "content": "", "published": 1, "tags": ["a"]});
        let blog: Blog = serde_json::from_value(raw).unwrap();
        assert!(blog.published);

        let back = serde_json::to_value(&blog).unwrap();
        assert_eq!(back["id"], json!(3));
        assert_eq!(back["tags"], json!(["a"]));
        assert_eq!(back["published"], json!(true));
    }

    #[test]
    fn record_without_identity_still_decodes() {
        let subscriber: Subscriber = serde_json::from_value(json!({"email": "a@b.c"})).unwrap();
        assert_eq!(subscriber.identity(), None);
        assert_eq!(subscriber.email, "a@b.c");
    }

    #[test]
    fn profile_from_uuid() {
        let admin: AdminProfile =
            serde_json::from_value(json!({"uuid": "u-1", "name": "Ada", "email": "ada@example.com"}))
                .unwrap();
        assert!(admin.has_identity(&EntityId::from("u-1")));
        assert_eq!(admin.role, None);
    }
}
