use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::kind::{REPLICATION_CONTROLLERS, Resource, ResourceDescriptor};
use crate::meta::ObjectMeta;

// --- ReplicationController status ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicationControllerStatus {
    pub replicas: u32,
    #[serde(default)]
    pub ready_replicas: u32,
}

// --- ReplicationController spec ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationControllerSpec {
    pub replicas: u32,
    #[serde(default)]
    pub selector: HashMap<String, String>,
    /// Labels stamped on every pod this controller creates.
    #[serde(default)]
    pub template_labels: HashMap<String, String>,
}

// --- ReplicationController ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationController {
    pub metadata: ObjectMeta,
    pub spec: ReplicationControllerSpec,
    #[serde(default)]
    pub status: ReplicationControllerStatus,
}

impl Resource for ReplicationController {
    const DESCRIPTOR: ResourceDescriptor = REPLICATION_CONTROLLERS;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::DynamicObject;

    #[test]
    fn converts_through_dynamic_form() {
        let rc = ReplicationController {
            metadata: ObjectMeta {
                name: "frontend".to_string(),
                namespace: "shop".to_string(),
                ..Default::default()
            },
            spec: ReplicationControllerSpec {
                replicas: 3,
                selector: HashMap::from([("app".to_string(), "frontend".to_string())]),
                template_labels: HashMap::new(),
            },
            status: ReplicationControllerStatus::default(),
        };
        let dynamic = DynamicObject::from_typed(&rc).unwrap();
        assert_eq!(dynamic.namespace(), "shop");
        assert_eq!(dynamic.data["spec"]["replicas"], 3);

        let back: ReplicationController = dynamic.try_parse().unwrap();
        assert_eq!(back.spec.replicas, 3);
        assert_eq!(back.metadata.name, "frontend");
    }
}
