use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::meta::ObjectMeta;

/// Name of a measured quantity, e.g. `count/replicationcontrollers`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceName(pub String);

impl ResourceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mapping from resource name to a non-negative quantity.
/// Used both for usage vectors and for hard limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceList(pub BTreeMap<ResourceName, u64>);

impl ResourceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<ResourceName>, quantity: u64) -> Self {
        self.0.insert(name.into(), quantity);
        self
    }

    pub fn get(&self, name: &ResourceName) -> Option<u64> {
        self.0.get(name).copied()
    }

    pub fn set(&mut self, name: ResourceName, quantity: u64) {
        self.0.insert(name, quantity);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceName, &u64)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Element-wise sum. Saturates instead of wrapping.
    pub fn add(&self, other: &ResourceList) -> ResourceList {
        let mut out = self.clone();
        for (name, qty) in other.iter() {
            let entry = out.0.entry(name.clone()).or_insert(0);
            *entry = entry.saturating_add(*qty);
        }
        out
    }

    /// Names in `self` whose quantity is strictly above the matching entry in `hard`.
    /// Names absent from `hard` are unconstrained.
    pub fn exceeded(&self, hard: &ResourceList) -> Vec<ResourceName> {
        self.0
            .iter()
            .filter(|(name, qty)| hard.get(name).is_some_and(|limit| **qty > limit))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Resource quota for a namespace. Limits are set externally; `status.used`
/// is informational and is never read back as the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub metadata: ObjectMeta,
    pub spec: ResourceQuotaSpec,
    #[serde(default)]
    pub status: ResourceQuotaStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceQuotaSpec {
    #[serde(default)]
    pub hard: ResourceList,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceQuotaStatus {
    #[serde(default)]
    pub hard: ResourceList,
    #[serde(default)]
    pub used: ResourceList,
    #[serde(default)]
    pub last_observed: Option<DateTime<Utc>>,
}
