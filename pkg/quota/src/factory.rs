use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use pkg_constants::quota::{
    DEFAULT_LIST_TIMEOUT_MS, RESOURCE_CONFIGMAPS, RESOURCE_DEPLOYMENTS, RESOURCE_REPLICASETS,
    RESOURCE_REPLICATION_CONTROLLERS, RESOURCE_SECRETS, RESOURCE_SERVICES,
};
use pkg_types::kind::{
    CONFIGMAPS, DEPLOYMENTS, REPLICASETS, REPLICATION_CONTROLLERS, ResourceDescriptor, SECRETS,
    SERVICES,
};

use crate::client::StoreClient;
use crate::evaluator::{Evaluator, ObjectCountEvaluator};
use crate::informer_factory::SharedInformerFactory;
use crate::lister::{CachedLister, Lister, StoreLister};
use crate::registry::EvaluatorRegistry;

/// Kinds counted by object-count evaluators, with their resource names.
pub const OBJECT_COUNT_KINDS: [(ResourceDescriptor, &str); 6] = [
    (REPLICATION_CONTROLLERS, RESOURCE_REPLICATION_CONTROLLERS),
    (CONFIGMAPS, RESOURCE_CONFIGMAPS),
    (SECRETS, RESOURCE_SECRETS),
    (SERVICES, RESOURCE_SERVICES),
    (DEPLOYMENTS, RESOURCE_DEPLOYMENTS),
    (REPLICASETS, RESOURCE_REPLICASETS),
];

/// Builds evaluators, choosing each one's lister once at construction.
///
/// With an informer factory every evaluator reads from a shared cache;
/// without one it queries the store on each call.
pub struct EvaluatorFactory {
    client: Arc<dyn StoreClient>,
    informers: Option<Arc<SharedInformerFactory>>,
    list_timeout: Duration,
}

impl EvaluatorFactory {
    pub fn new(client: Arc<dyn StoreClient>, informers: Option<Arc<SharedInformerFactory>>) -> Self {
        Self {
            client,
            informers,
            list_timeout: Duration::from_millis(DEFAULT_LIST_TIMEOUT_MS),
        }
    }

    /// Deadline for direct store queries.
    pub fn with_list_timeout(mut self, timeout: Duration) -> Self {
        self.list_timeout = timeout;
        self
    }

    /// Lister for `descriptor`'s resource.
    pub fn lister(&self, descriptor: ResourceDescriptor) -> Arc<dyn Lister> {
        let resource = descriptor.group_resource();
        match &self.informers {
            Some(informers) => {
                debug!("Listing {} from the informer cache", resource);
                Arc::new(CachedLister::new(informers.for_resource(resource)))
            }
            None => {
                debug!("Listing {} directly from the store", resource);
                Arc::new(
                    StoreLister::new(Arc::clone(&self.client), resource)
                        .with_timeout(self.list_timeout),
                )
            }
        }
    }

    /// Object-count evaluator for `descriptor`, reporting `resource_name`.
    pub fn object_count(&self, descriptor: ResourceDescriptor, resource_name: &str) -> Arc<dyn Evaluator> {
        Arc::new(ObjectCountEvaluator::new(
            descriptor.group_kind(),
            resource_name.into(),
            self.lister(descriptor),
        ))
    }

    /// Evaluator for replication controllers.
    pub fn replication_controllers(&self) -> Arc<dyn Evaluator> {
        self.object_count(REPLICATION_CONTROLLERS, RESOURCE_REPLICATION_CONTROLLERS)
    }

    /// One evaluator per supported kind.
    pub fn evaluators(&self) -> Vec<Arc<dyn Evaluator>> {
        OBJECT_COUNT_KINDS
            .iter()
            .map(|(descriptor, name)| self.object_count(*descriptor, name))
            .collect()
    }

    /// Registry holding every supported evaluator.
    pub fn registry(&self) -> EvaluatorRegistry {
        self.evaluators().into_iter().collect()
    }
}

/// Evaluator for replication controllers. Uses the informer cache when
/// `informers` is given, direct store queries otherwise.
pub fn new_replication_controller_evaluator(
    client: Arc<dyn StoreClient>,
    informers: Option<Arc<SharedInformerFactory>>,
) -> Arc<dyn Evaluator> {
    EvaluatorFactory::new(client, informers).replication_controllers()
}

/// Registry with an evaluator for every supported kind.
pub fn new_registry(
    client: Arc<dyn StoreClient>,
    informers: Option<Arc<SharedInformerFactory>>,
) -> EvaluatorRegistry {
    EvaluatorFactory::new(client, informers).registry()
}
