use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies an object type, e.g. `apps/ReplicaSet`. An empty group is the core group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKind {
    #[serde(default)]
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}/{}", self.group, self.kind)
        }
    }
}

/// Identifies the plural, storage-facing name of a type, e.g. `replicasets.apps`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupResource {
    #[serde(default)]
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }

    /// Key prefix holding every object of this resource in `namespace`.
    pub fn namespace_prefix(&self, namespace: &str) -> String {
        format!(
            "{}{}/{}/",
            pkg_constants::state::REGISTRY_PREFIX,
            self,
            namespace
        )
    }

    /// Key prefix holding every object of this resource across namespaces.
    pub fn registry_prefix(&self) -> String {
        format!("{}{}/", pkg_constants::state::REGISTRY_PREFIX, self)
    }

    /// Storage key of a single object.
    pub fn object_key(&self, namespace: &str, name: &str) -> String {
        format!("{}{}", self.namespace_prefix(namespace), name)
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

/// Static description of a well-known type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub group: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
}

impl ResourceDescriptor {
    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(self.group, self.kind)
    }

    pub fn group_resource(&self) -> GroupResource {
        GroupResource::new(self.group, self.plural)
    }
}

pub const REPLICATION_CONTROLLERS: ResourceDescriptor = ResourceDescriptor {
    group: "",
    kind: "ReplicationController",
    plural: "replicationcontrollers",
};

pub const CONFIGMAPS: ResourceDescriptor = ResourceDescriptor {
    group: "",
    kind: "ConfigMap",
    plural: "configmaps",
};

pub const SECRETS: ResourceDescriptor = ResourceDescriptor {
    group: "",
    kind: "Secret",
    plural: "secrets",
};

pub const SERVICES: ResourceDescriptor = ResourceDescriptor {
    group: "",
    kind: "Service",
    plural: "services",
};

pub const DEPLOYMENTS: ResourceDescriptor = ResourceDescriptor {
    group: "apps",
    kind: "Deployment",
    plural: "deployments",
};

pub const REPLICASETS: ResourceDescriptor = ResourceDescriptor {
    group: "apps",
    kind: "ReplicaSet",
    plural: "replicasets",
};

/// Implemented by typed objects that have a fixed descriptor.
pub trait Resource {
    const DESCRIPTOR: ResourceDescriptor;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_group_only_when_set() {
        assert_eq!(REPLICATION_CONTROLLERS.group_kind().to_string(), "ReplicationController");
        assert_eq!(DEPLOYMENTS.group_kind().to_string(), "apps/Deployment");
        assert_eq!(REPLICASETS.group_resource().to_string(), "replicasets.apps");
    }

    #[test]
    fn object_keys_are_namespace_scoped() {
        let gr = REPLICATION_CONTROLLERS.group_resource();
        assert_eq!(
            gr.object_key("team-a", "web"),
            "/registry/replicationcontrollers/team-a/web"
        );
        assert_eq!(
            DEPLOYMENTS.group_resource().namespace_prefix("team-a"),
            "/registry/deployments.apps/team-a/"
        );
        // A namespace that is a prefix of another must not share a key prefix.
        assert!(!gr.object_key("team-ab", "x").starts_with(&gr.namespace_prefix("team-a")));
    }
}
