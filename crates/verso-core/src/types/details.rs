//! Named attributes attached to a record.
//!
//! `Details` is the only way to read or write open-ended record content.
//! Keys are unique and iteration order is by key; detail collections are
//! ordered sequences grouped under a name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::RecordId;

/// Detail key under which a snapshot keeps the id of its former parent.
pub const PARENT_ID_DETAIL: &str = "ParentID";

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DetailValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    /// Reference to another record. Stored as a plain id, never resolved.
    Link(RecordId),
    Json(serde_json::Value),
}

impl DetailValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<RecordId> {
        match self {
            Self::Link(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<bool> for DetailValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for DetailValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for DetailValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for DetailValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for DetailValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<Utc>> for DetailValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl From<RecordId> for DetailValue {
    fn from(v: RecordId) -> Self {
        Self::Link(v)
    }
}

impl From<serde_json::Value> for DetailValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// Attribute map plus named detail collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Details {
    #[serde(default)]
    attributes: BTreeMap<String, DetailValue>,
    #[serde(default)]
    collections: BTreeMap<String, Vec<DetailValue>>,
}

impl Details {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute.
    pub fn get(&self, key: &str) -> Option<&DetailValue> {
        self.attributes.get(key)
    }

    /// Set an attribute, returning the value it replaced.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<DetailValue>) -> Option<DetailValue> {
        self.attributes.insert(key.into(), value.into())
    }

    /// Remove an attribute.
    pub fn remove(&mut self, key: &str) -> Option<DetailValue> {
        self.attributes.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Iterate attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DetailValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of attributes (collections not included).
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.collections.is_empty()
    }

    /// Get a detail collection by name.
    pub fn collection(&self, name: &str) -> Option<&[DetailValue]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    /// Get a detail collection for modification, creating it when missing.
    pub fn collection_mut(&mut self, name: impl Into<String>) -> &mut Vec<DetailValue> {
        self.collections.entry(name.into()).or_default()
    }

    /// Remove a detail collection.
    pub fn remove_collection(&mut self, name: &str) -> Option<Vec<DetailValue>> {
        self.collections.remove(name)
    }

    /// Names of all detail collections.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Drop every attribute and every collection.
    pub fn clear(&mut self) {
        self.attributes.clear();
        self.collections.clear();
    }

    /// Copy every attribute and collection from `other` except `excluded` keys.
    pub(crate) fn copy_from_except(&mut self, other: &Details, excluded: &[&str]) {
        for (key, value) in &other.attributes {
            if !excluded.contains(&key.as_str()) {
                self.attributes.insert(key.clone(), value.clone());
            }
        }
        for (name, values) in &other.collections {
            self.collections.insert(name.clone(), values.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let mut details = Details::new();
        assert!(details.set("Text", "hello").is_none());
        assert_eq!(details.get("Text").and_then(|v| v.as_text()), Some("hello"));

        let old = details.set("Text", "bye");
        assert_eq!(old, Some(DetailValue::Text("hello".to_string())));
        assert_eq!(details.len(), 1);

        details.remove("Text");
        assert!(details.is_empty());
    }

    #[test]
    fn test_collections_are_ordered() {
        let mut details = Details::new();
        let tags = details.collection_mut("Tags");
        tags.push("b".into());
        tags.push("a".into());

        let tags = details.collection("Tags").unwrap();
        assert_eq!(tags[0].as_text(), Some("b"));
        assert_eq!(tags[1].as_text(), Some("a"));
        assert!(!details.is_empty());
        assert_eq!(details.len(), 0);
    }

    #[test]
    fn test_clear_drops_collections() {
        let mut details = Details::new();
        details.set("A", 1i64);
        details.collection_mut("Tags").push("x".into());

        details.clear();
        assert!(details.is_empty());
        assert!(details.collection("Tags").is_none());
    }

    #[test]
    fn test_copy_from_except() {
        let mut source = Details::new();
        source.set("A", 1i64);
        source.set(PARENT_ID_DETAIL, RecordId(7));
        source.collection_mut("Tags").push("x".into());

        let mut target = Details::new();
        target.copy_from_except(&source, &[PARENT_ID_DETAIL]);

        assert_eq!(target.get("A").and_then(|v| v.as_int()), Some(1));
        assert!(!target.contains(PARENT_ID_DETAIL));
        assert_eq!(target.collection("Tags").map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_details_json_shape() {
        let mut details = Details::new();
        details.set("Link", RecordId(3));
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(
            json["attributes"]["Link"],
            serde_json::json!({"type": "link", "value": 3})
        );
    }
}
