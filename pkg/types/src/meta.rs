use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;

use crate::kind::Resource;

/// Metadata common to every stored object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Store revision of the last write to this object. Assigned by the store.
    #[serde(default)]
    pub resource_version: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// An object of any kind: parsed metadata plus the untyped remainder.
///
/// This is what listers hand to evaluators. Evaluators never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl DynamicObject {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
                ..Default::default()
            },
            data: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata
            .labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Decode a stored JSON document.
    pub fn from_slice(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Convert a typed object into its dynamic form.
    pub fn from_typed<T: Resource + Serialize>(obj: &T) -> anyhow::Result<Self> {
        Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
    }

    /// Convert back into a typed object.
    pub fn try_parse<T: Resource + DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_value(serde_json::to_value(self)?)?)
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}
