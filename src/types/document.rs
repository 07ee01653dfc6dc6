//! The in-memory form of a fetched GitHub resource.
//!
//! A document is the fetched JSON body plus a `_metadata` envelope. The body
//! is treated opaquely except for the fields a handler explicitly reads; the
//! envelope carries the typed links, the processor version, and timestamps.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::links::LinkValue;
use super::urn::Urn;

/// The `_metadata` envelope attached to every document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Resource kind of the request that fetched this document.
    #[serde(rename = "type")]
    pub kind: String,

    /// Source URL the document was fetched from.
    pub url: String,

    /// When the fetcher retrieved the body.
    pub fetched_at: DateTime<Utc>,

    /// Typed links recorded during processing, keyed by link name.
    pub links: BTreeMap<String, LinkValue>,

    /// Processor version that produced the links. Set when processing
    /// completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,

    /// When processing completed. Always later than `fetched_at`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// A fetched resource and its metadata envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    body: Value,
    metadata: Metadata,
}

impl Document {
    /// Wraps a fetched body, stamping the fetch time as now.
    pub fn new(kind: impl Into<String>, url: impl Into<String>, body: Value) -> Self {
        Self::with_fetched_at(kind, url, body, Utc::now())
    }

    /// Wraps a fetched body with an explicit fetch time.
    pub fn with_fetched_at(
        kind: impl Into<String>,
        url: impl Into<String>,
        body: Value,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Document {
            body,
            metadata: Metadata {
                kind: kind.into(),
                url: url.into(),
                fetched_at,
                links: BTreeMap::new(),
                version: None,
                processed_at: None,
            },
        }
    }

    /// Returns the fetched body.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Returns the fetched body for mutation (patch scrubbing).
    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    /// Returns the metadata envelope.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns the metadata envelope for mutation.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Returns a top-level body field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Returns the recorded link under `name`, if any.
    pub fn link(&self, name: &str) -> Option<&LinkValue> {
        self.metadata.links.get(name)
    }

    /// Returns the canonical self URN, once recorded.
    pub fn self_href(&self) -> Option<&Urn> {
        match self.metadata.links.get("self") {
            Some(LinkValue::SelfLink { href }) => Some(href),
            _ => None,
        }
    }

    /// Returns the elements of a collection page.
    ///
    /// GitHub collection endpoints return a bare JSON array; some fetchers
    /// wrap the array under an `elements` key so the body stays an object.
    /// Both shapes are accepted.
    pub fn elements(&self) -> Option<&Vec<Value>> {
        match &self.body {
            Value::Array(items) => Some(items),
            Value::Object(map) => map.get("elements").and_then(Value::as_array),
            _ => None,
        }
    }

    /// Merges the body and the `_metadata` envelope into one JSON value, the
    /// shape the store persists.
    ///
    /// Array bodies are wrapped under an `elements` key so the envelope has
    /// somewhere to live.
    pub fn to_json(&self) -> Value {
        let metadata = serde_json::to_value(&self.metadata)
            .unwrap_or_else(|_| Value::Object(Default::default()));
        let mut map = match &self.body {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("elements".to_string(), other.clone());
                map
            }
        };
        map.insert("_metadata".to_string(), metadata);
        Value::Object(map)
    }
}

/// Extracts a JSON id as its string form.
///
/// GitHub ids are numbers for most resources and strings for events and
/// commit shas; URNs need the textual form either way.
pub fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::urn::ResourceKind;
    use serde_json::json;

    #[test]
    fn get_reads_top_level_fields() {
        let doc = Document::new("org", "https://api.github.com/orgs/acme", json!({"id": 7}));
        assert_eq!(doc.get("id"), Some(&json!(7)));
        assert_eq!(doc.get("missing"), None);
    }

    #[test]
    fn elements_accepts_array_body() {
        let doc = Document::new("repos", "u", json!([{"id": 1}, {"id": 2}]));
        assert_eq!(doc.elements().unwrap().len(), 2);
    }

    #[test]
    fn elements_accepts_wrapped_body() {
        let doc = Document::new("repos", "u", json!({"elements": [{"id": 1}]}));
        assert_eq!(doc.elements().unwrap().len(), 1);
    }

    #[test]
    fn elements_rejects_plain_object() {
        let doc = Document::new("org", "u", json!({"id": 7}));
        assert!(doc.elements().is_none());
    }

    #[test]
    fn to_json_injects_metadata() {
        let mut doc = Document::new("org", "https://api.github.com/orgs/acme", json!({"id": 7}));
        doc.metadata_mut().links.insert(
            "self".to_string(),
            LinkValue::SelfLink {
                href: Urn::root(ResourceKind::Org, 7),
            },
        );
        let json = doc.to_json();
        assert_eq!(json["id"], json!(7));
        assert_eq!(json["_metadata"]["type"], json!("org"));
        assert_eq!(
            json["_metadata"]["links"]["self"]["href"],
            json!("urn:org:7")
        );
    }

    #[test]
    fn to_json_wraps_array_bodies() {
        let doc = Document::new("repos", "u", json!([{"id": 1}]));
        let json = doc.to_json();
        assert_eq!(json["elements"], json!([{"id": 1}]));
        assert!(json["_metadata"].is_object());
    }

    #[test]
    fn json_id_accepts_numbers_and_strings() {
        assert_eq!(json_id(&json!(42)), Some("42".to_string()));
        assert_eq!(json_id(&json!("abc")), Some("abc".to_string()));
        assert_eq!(json_id(&json!(null)), None);
        assert_eq!(json_id(&json!({"id": 1})), None);
    }

    #[test]
    fn self_href_reads_self_link() {
        let mut doc = Document::new("org", "u", json!({"id": 7}));
        assert!(doc.self_href().is_none());
        doc.metadata_mut().links.insert(
            "self".to_string(),
            LinkValue::SelfLink {
                href: Urn::root(ResourceKind::Org, 7),
            },
        );
        assert_eq!(doc.self_href().unwrap().as_str(), "urn:org:7");
    }
}
