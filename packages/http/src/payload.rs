//! Request payloads and the JSON-vs-multipart encoding decision.
//!
//! A [`Payload`] is an ordered list of named fields. Fields hold either a JSON
//! value or one or more file attachments. [`Payload::encode`] looks at the
//! fields once and picks the wire format:
//!
//! - no attachments: a JSON object (`Content-Type: application/json`);
//! - any attachment: `multipart/form-data`, one part per field, with array
//!   fields sent as repeated `field[]` parts.

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;

/// A file-like value uploaded as a multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Json(JsonValue),
    File(Attachment),
    Files(Vec<Attachment>),
}

impl FieldValue {
    pub fn is_attachment(&self) -> bool {
        match self {
            FieldValue::Json(_) => false,
            FieldValue::File(_) => true,
            FieldValue::Files(files) => !files.is_empty(),
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            FieldValue::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// An ordered set of named request fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Vec<(String, FieldValue)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a payload from anything that serializes to a JSON object.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        match serde_json::to_value(value)? {
            JsonValue::Object(map) => Ok(Self::from(map)),
            JsonValue::Null => Ok(Self::new()),
            other => Err(Error::InvalidPayload {
                message: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.set(name, FieldValue::Json(value.into()));
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, file: Attachment) -> Self {
        self.set(name, FieldValue::File(file));
        self
    }

    pub fn with_files(mut self, name: impl Into<String>, files: Vec<Attachment>) -> Self {
        self.set(name, FieldValue::Files(files));
        self
    }

    /// Insert or replace a field. A replaced field keeps its position.
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(key, _)| key == name)?;
        Some(self.fields.remove(index).1)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_attachments(&self) -> bool {
        self.fields.iter().any(|(_, value)| value.is_attachment())
    }

    /// Pick the wire format from the payload's shape.
    pub fn encode(self) -> RequestBody {
        if self.has_attachments() {
            RequestBody::Multipart(self.into_multipart())
        } else {
            RequestBody::Json(JsonValue::Object(self.into_json_map()))
        }
    }

    fn into_json_map(self) -> Map<String, JsonValue> {
        self.fields
            .into_iter()
            .filter_map(|(key, value)| match value {
                FieldValue::Json(json) => Some((key, json)),
                // An empty attachment list has no JSON form.
                FieldValue::Files(_) | FieldValue::File(_) => None,
            })
            .collect()
    }

    fn into_multipart(self) -> Vec<MultipartField> {
        let mut parts = Vec::new();
        for (name, value) in self.fields {
            match value {
                FieldValue::Json(JsonValue::Array(items)) => {
                    let array_name = format!("{}[]", name);
                    for item in items {
                        if let Some(text) = multipart_text(item) {
                            parts.push(MultipartField::text(array_name.clone(), text));
                        }
                    }
                }
                FieldValue::Json(json) => {
                    if let Some(text) = multipart_text(json) {
                        parts.push(MultipartField::text(name, text));
                    }
                }
                FieldValue::File(file) => parts.push(MultipartField::file(name, file)),
                FieldValue::Files(files) => {
                    let array_name = format!("{}[]", name);
                    for file in files {
                        parts.push(MultipartField::file(array_name.clone(), file));
                    }
                }
            }
        }
        parts
    }
}

impl From<Map<String, JsonValue>> for Payload {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self {
            fields: map
                .into_iter()
                .map(|(key, value)| (key, FieldValue::Json(value)))
                .collect(),
        }
    }
}

impl TryFrom<JsonValue> for Payload {
    type Error = Error;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        Self::from_serialize(&value)
    }
}

fn multipart_text(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => Some(nested.to_string()),
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// The encoded body of a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(JsonValue),
    Multipart(Vec<MultipartField>),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// All text parts named `name`, in order.
    pub fn text_fields(&self, name: &str) -> Vec<&str> {
        match self {
            RequestBody::Multipart(parts) => parts
                .iter()
                .filter(|part| part.name == name)
                .filter_map(|part| match &part.value {
                    MultipartValue::Text(text) => Some(text.as_str()),
                    MultipartValue::File(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// First text part named `name`.
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.text_fields(name).into_iter().next()
    }

    /// First file part named `name`.
    pub fn file_field(&self, name: &str) -> Option<&Attachment> {
        match self {
            RequestBody::Multipart(parts) => parts.iter().find_map(|part| match &part.value {
                MultipartValue::File(file) if part.name == name => Some(file),
                _ => None,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipartField {
    pub name: String,
    pub value: MultipartValue,
}

impl MultipartField {
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::Text(text.into()),
        }
    }

    pub fn file(name: impl Into<String>, file: Attachment) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::File(file),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultipartValue {
    Text(String),
    File(Attachment),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image() -> Attachment {
        Attachment::new("cover.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47])
    }

    #[test]
    fn plain_fields_encode_as_json_object() {
        let body = Payload::new()
            .with_field("title", "Yoga")
            .with_field("capacity", 12)
            .encode();

        assert_eq!(body, RequestBody::Json(json!({"title": "Yoga", "capacity": 12})));
    }

    #[test]
    fn any_attachment_switches_to_multipart() {
        let body = Payload::new()
            .with_field("title", "Y")
            .with_file("image", image())
            .encode();

        assert!(body.is_multipart());
        assert_eq!(body.text_field("title"), Some("Y"));
        let file = body.file_field("image").unwrap();
        assert_eq!(file.file_name, "cover.png");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.len(), 4);
    }

    #[test]
    fn arrays_become_repeated_bracket_fields() {
        let body = Payload::new()
            .with_field("tags", json!(["a", "b", null, 3]))
            .with_file("image", image())
            .encode();

        assert_eq!(body.text_fields("tags[]"), vec!["a", "b", "3"]);
        assert!(body.text_field("tags").is_none());
    }

    #[test]
    fn multipart_scalar_and_nested_values() {
        let body = Payload::new()
            .with_field("published", true)
            .with_field("price", 9.5)
            .with_field("deleted_at", JsonValue::Null)
            .with_field("seo", json!({"slug": "x"}))
            .with_file("image", image())
            .encode();

        assert_eq!(body.text_field("published"), Some("true"));
        assert_eq!(body.text_field("price"), Some("9.5"));
        assert_eq!(body.text_field("deleted_at"), None);
        assert_eq!(body.text_field("seo"), Some(r#"{"slug":"x"}"#));
    }

    #[test]
    fn file_lists_use_bracket_names() {
        let body = Payload::new()
            .with_files("gallery", vec![image(), image()])
            .encode();

        match &body {
            RequestBody::Multipart(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(parts.iter().all(|p| p.name == "gallery[]"));
            }
            other => panic!("expected multipart, got {:?}", other),
        }
    }

    #[test]
    fn empty_file_list_stays_json() {
        let body = Payload::new()
            .with_field("title", "T")
            .with_files("gallery", Vec::new())
            .encode();
        assert_eq!(body, RequestBody::Json(json!({"title": "T"})));
    }

    #[test]
    fn set_replaces_in_place() {
        let mut payload = Payload::new().with_field("a", 1).with_field("b", 2);
        payload.set("a", FieldValue::Json(json!(10)));

        let names: Vec<&str> = payload.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(payload.get("a").and_then(FieldValue::as_json), Some(&json!(10)));
    }

    #[test]
    fn remove_returns_field() {
        let mut payload = Payload::new().with_field("id", 5).with_field("title", "x");
        assert_eq!(payload.remove("id"), Some(FieldValue::Json(json!(5))));
        assert_eq!(payload.remove("id"), None);
        assert_eq!(payload.len(), 1);
    }

    #[test]
    fn from_serialize_requires_object() {
        #[derive(Serialize)]
        struct Draft {
            title: String,
        }

        let payload = Payload::from_serialize(&Draft {
            title: "Hello".to_string(),
        })
        .unwrap();
        assert_eq!(payload.get("title").and_then(FieldValue::as_json), Some(&json!("Hello")));

        assert!(Payload::from_serialize(&json!(null)).unwrap().is_empty());
        assert!(matches!(
            Payload::from_serialize(&json!([1, 2])),
            Err(Error::InvalidPayload { .. })
        ));
        assert!(Payload::try_from(json!("x")).is_err());
    }
}
