//! Response types decoded from the graph API.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::GraphError;

/// Any entity returned by the API (user, page, post, comment)
///
/// Field access returns `None` both for missing keys and for JSON `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphObject(Map<String, Value>);

impl GraphObject {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Object identifier; the API reports numeric ids as strings
    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn message(&self) -> Option<&str> {
        self.get_str("message")
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of non-null fields
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Non-null fields, in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().filter(|(_, value)| !value.is_null())
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for GraphObject {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Paging links attached to a connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// One-to-many relationship (e.g. "likes") or a search result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Always a sequence: a missing or `null` "data" decodes as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<GraphObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
}

impl Connection {
    pub fn data(&self) -> &[GraphObject] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn next_page_url(&self) -> Option<&str> {
        self.paging.as_ref().and_then(|paging| paging.next.as_deref())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<GraphObject>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<GraphObject>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Auxiliary fields merged into a wall post (name, link, caption, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attachment(BTreeMap<String, String>);

impl Attachment {
    /// Keys the client sets itself; an attachment may not override them
    pub const RESERVED_KEYS: [&'static str; 2] = ["message", "access_token"];

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn reserved_key(&self) -> Option<&str> {
        self.0
            .keys()
            .map(String::as_str)
            .find(|key| Self::RESERVED_KEYS.contains(key))
    }

    /// True when every attachment field is present and equal in `object`
    pub fn is_reflected_in(&self, object: &GraphObject) -> bool {
        self.iter().all(|(key, value)| object.get_str(key) == Some(value))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attachment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Result of a multi-object fetch: resolved objects plus per-identifier failures
#[derive(Debug, Default)]
pub struct ObjectBatch {
    pub objects: BTreeMap<String, GraphObject>,
    pub failures: BTreeMap<String, GraphError>,
}

impl ObjectBatch {
    /// Number of resolved objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, identifier: &str) -> Option<&GraphObject> {
        self.objects.get(identifier)
    }

    pub fn failure(&self, identifier: &str) -> Option<&GraphError> {
        self.failures.get(identifier)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
