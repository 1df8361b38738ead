//! Response shape normalization.
//!
//! Endpoints wrap their payloads differently: a bare array, `{data: [...]}`,
//! `{items: [...]}`, `{result: [...]}`, a Laravel-style paginator nested under
//! `data`, or a bare object. Everything is reduced to a [`ResourceEnvelope`]
//! here. Shapes that are not recognized become an empty collection or a
//! missing item; normalization itself never fails.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::identity::identity_of;

const WRAPPER_KEYS: [&str; 3] = ["data", "items", "result"];
const ITEM_WRAPPER_KEYS: [&str; 3] = ["data", "item", "result"];
const META_KEYS: [&str; 2] = ["meta", "pagination"];

const PAGE_KEYS: [&str; 3] = ["page", "current_page", "currentPage"];
const TOTAL_PAGES_KEYS: [&str; 4] = ["total_pages", "totalPages", "last_page", "lastPage"];
const TOTAL_KEYS: [&str; 3] = ["total", "totalItems", "count"];
const PER_PAGE_KEYS: [&str; 4] = ["per_page", "perPage", "limit", "pageSize"];

/// Pagination metadata, when the server sends any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub page: Option<u64>,
    pub total_pages: Option<u64>,
    pub total: Option<u64>,
    pub per_page: Option<u64>,
    /// The raw `meta`/`pagination` object, when there was one.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, JsonValue>,
}

impl PageMeta {
    fn from_fields(map: &Map<String, JsonValue>) -> Option<Self> {
        let meta = PageMeta {
            page: first_number(map, &PAGE_KEYS),
            total_pages: first_number(map, &TOTAL_PAGES_KEYS),
            total: first_number(map, &TOTAL_KEYS),
            per_page: first_number(map, &PER_PAGE_KEYS),
            extra: Map::new(),
        };
        if meta.is_blank() {
            None
        } else {
            Some(meta)
        }
    }

    fn is_blank(&self) -> bool {
        self.page.is_none()
            && self.total_pages.is_none()
            && self.total.is_none()
            && self.per_page.is_none()
            && self.extra.is_empty()
    }

    pub fn has_next_page(&self) -> bool {
        match (self.page, self.total_pages) {
            (Some(page), Some(total)) => page < total,
            _ => false,
        }
    }
}

fn first_number(map: &Map<String, JsonValue>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| match map.get(*key)? {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn extract_meta(map: &Map<String, JsonValue>) -> Option<PageMeta> {
    for key in META_KEYS {
        if let Some(JsonValue::Object(meta)) = map.get(key) {
            let mut parsed = PageMeta::from_fields(meta).unwrap_or_default();
            parsed.extra = meta.clone();
            return Some(parsed);
        }
    }
    PageMeta::from_fields(map)
}

/// The normalized shape of any server response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEnvelope<T> {
    pub item: Option<T>,
    pub items: Option<Vec<T>>,
    pub meta: Option<PageMeta>,
}

impl<T> Default for ResourceEnvelope<T> {
    fn default() -> Self {
        Self {
            item: None,
            items: None,
            meta: None,
        }
    }
}

impl<T> ResourceEnvelope<T> {
    /// The collection, or an empty slice.
    pub fn items(&self) -> &[T] {
        self.items.as_deref().unwrap_or(&[])
    }

    pub fn into_items(self) -> Vec<T> {
        self.items.unwrap_or_default()
    }
}

impl ResourceEnvelope<JsonValue> {
    /// Deserialize every record into `T`.
    ///
    /// Records that do not deserialize are dropped with a warning rather
    /// than failing the whole response.
    pub fn decode<T: DeserializeOwned>(self) -> ResourceEnvelope<T> {
        ResourceEnvelope {
            item: self.item.and_then(decode_record),
            items: self
                .items
                .map(|items| items.into_iter().filter_map(decode_record).collect()),
            meta: self.meta,
        }
    }
}

fn decode_record<T: DeserializeOwned>(value: JsonValue) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(error = %e, "dropping record that does not match the expected shape");
            None
        }
    }
}

/// Normalize a collection response.
///
/// `items` is always present (possibly empty). A bare non-wrapper object is
/// not promoted into the collection; it is exposed as `item` only.
pub fn normalize_list(body: JsonValue) -> ResourceEnvelope<JsonValue> {
    match body {
        JsonValue::Array(items) => ResourceEnvelope {
            item: None,
            items: Some(items),
            meta: None,
        },
        JsonValue::Object(map) => {
            let meta = extract_meta(&map);
            for key in WRAPPER_KEYS {
                match map.get(key) {
                    Some(JsonValue::Array(items)) => {
                        return ResourceEnvelope {
                            item: None,
                            items: Some(items.clone()),
                            meta,
                        };
                    }
                    // A paginator nested one level down, e.g. {data: {data: [...], last_page}}.
                    Some(JsonValue::Object(inner)) if has_wrapped_array(inner) => {
                        let nested = normalize_list(JsonValue::Object(inner.clone()));
                        return ResourceEnvelope {
                            item: None,
                            items: nested.items,
                            meta: meta.or(nested.meta),
                        };
                    }
                    _ => {}
                }
            }

            if map.is_empty() {
                tracing::warn!("empty object where a collection was expected");
                return ResourceEnvelope {
                    item: None,
                    items: Some(Vec::new()),
                    meta,
                };
            }

            ResourceEnvelope {
                item: Some(JsonValue::Object(map)),
                items: Some(Vec::new()),
                meta,
            }
        }
        other => {
            if !other.is_null() {
                tracing::warn!(body = %other, "unrecognized collection response shape");
            }
            ResourceEnvelope {
                item: None,
                items: Some(Vec::new()),
                meta: None,
            }
        }
    }
}

fn has_wrapped_array(map: &Map<String, JsonValue>) -> bool {
    WRAPPER_KEYS
        .iter()
        .any(|key| matches!(map.get(*key), Some(JsonValue::Array(_))))
}

/// Normalize a single-record response.
///
/// The record ends up in `item`, and also as the sole element of `items`.
pub fn normalize_item(body: JsonValue) -> ResourceEnvelope<JsonValue> {
    let item = unwrap_item(body, 2);
    ResourceEnvelope {
        items: Some(item.iter().cloned().collect()),
        item,
        meta: None,
    }
}

fn unwrap_item(body: JsonValue, depth: u8) -> Option<JsonValue> {
    match body {
        JsonValue::Object(mut map) => {
            // A record that carries its own identity is never treated as a wrapper.
            if depth > 0 && identity_of(&JsonValue::Object(map.clone())).is_none() {
                for key in ITEM_WRAPPER_KEYS {
                    if matches!(map.get(key), Some(JsonValue::Object(_) | JsonValue::Array(_))) {
                        if let Some(inner) = map.remove(key) {
                            return unwrap_item(inner, depth - 1);
                        }
                    }
                }
            }
            if map.is_empty() {
                None
            } else {
                Some(JsonValue::Object(map))
            }
        }
        JsonValue::Array(items) => items.into_iter().find(JsonValue::is_object),
        _ => None,
    }
}
