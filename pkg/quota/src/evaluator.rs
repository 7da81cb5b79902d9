use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use pkg_types::kind::GroupKind;
use pkg_types::meta::DynamicObject;
use pkg_types::quota::{ResourceList, ResourceName};

use crate::error::QuotaError;
use crate::lister::{Lister, ObjectHandle};
use crate::selector::ListOptions;

/// Admission operation being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Computes resource usage for one kind.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// The kind this evaluator measures.
    fn group_kind(&self) -> &GroupKind;

    /// Resource names this evaluator reports.
    fn matching_resources(&self) -> &[ResourceName];

    /// Whether an update must be checked as if it were a create.
    fn allow_create_on_update(&self) -> bool;

    /// Whether the admission path must consult this evaluator for `operation`.
    fn handles(&self, operation: Operation) -> bool {
        match operation {
            Operation::Create => true,
            Operation::Update => self.allow_create_on_update(),
            Operation::Delete => false,
        }
    }

    /// Usage a single object contributes once admitted.
    fn object_usage(&self, object: &DynamicObject) -> ResourceList;

    /// Current usage in `namespace`, computed fresh on every call.
    async fn usage(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<ResourceList, QuotaError>;
}

/// Counts the objects of a kind. Exposes exactly one resource name.
pub struct ObjectCountEvaluator {
    group_kind: GroupKind,
    resource_names: [ResourceName; 1],
    allow_create_on_update: bool,
    lister: Arc<dyn Lister>,
}

impl ObjectCountEvaluator {
    /// Updates never change the number of objects, so by default they are
    /// not evaluated.
    pub fn new(group_kind: GroupKind, resource_name: ResourceName, lister: Arc<dyn Lister>) -> Self {
        Self {
            group_kind,
            resource_names: [resource_name],
            allow_create_on_update: false,
            lister,
        }
    }

    pub fn with_create_on_update(mut self, allow: bool) -> Self {
        self.allow_create_on_update = allow;
        self
    }

    pub fn resource_name(&self) -> &ResourceName {
        &self.resource_names[0]
    }
}

#[async_trait]
impl Evaluator for ObjectCountEvaluator {
    fn group_kind(&self) -> &GroupKind {
        &self.group_kind
    }

    fn matching_resources(&self) -> &[ResourceName] {
        &self.resource_names
    }

    fn allow_create_on_update(&self) -> bool {
        self.allow_create_on_update
    }

    fn object_usage(&self, _object: &DynamicObject) -> ResourceList {
        ResourceList::new().with(self.resource_name().clone(), 1)
    }

    async fn usage(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<ResourceList, QuotaError> {
        let items = self
            .lister
            .list(namespace, &ListOptions::default(), cancel)
            .await
            .map_err(|e| QuotaError::UsageComputationFailed {
                kind: self.group_kind.clone(),
                source: Box::new(e),
            })?;
        debug!(
            "{} usage in {}: {}={}",
            self.group_kind,
            namespace,
            self.resource_name(),
            items.len()
        );
        Ok(ResourceList::new().with(self.resource_name().clone(), items.len() as u64))
    }
}

/// Reduces a listed set of objects to a usage vector.
pub type UsageReducer = Arc<dyn Fn(&[ObjectHandle]) -> ResourceList + Send + Sync>;

/// Usage of a single object.
pub type ObjectUsageFn = Arc<dyn Fn(&DynamicObject) -> ResourceList + Send + Sync>;

/// Evaluator for kinds whose usage is an aggregation over their objects,
/// e.g. a sum of a declared quantity. Same lister contract and error policy
/// as `ObjectCountEvaluator`.
pub struct AggregateEvaluator {
    group_kind: GroupKind,
    resource_names: Vec<ResourceName>,
    allow_create_on_update: bool,
    lister: Arc<dyn Lister>,
    reduce: UsageReducer,
    per_object: ObjectUsageFn,
}

impl AggregateEvaluator {
    pub fn new(
        group_kind: GroupKind,
        resource_names: Vec<ResourceName>,
        lister: Arc<dyn Lister>,
        reduce: UsageReducer,
        per_object: ObjectUsageFn,
    ) -> Self {
        Self {
            group_kind,
            resource_names,
            // Quantity-based usage can change on update.
            allow_create_on_update: true,
            lister,
            reduce,
            per_object,
        }
    }

    pub fn with_create_on_update(mut self, allow: bool) -> Self {
        self.allow_create_on_update = allow;
        self
    }
}

#[async_trait]
impl Evaluator for AggregateEvaluator {
    fn group_kind(&self) -> &GroupKind {
        &self.group_kind
    }

    fn matching_resources(&self) -> &[ResourceName] {
        &self.resource_names
    }

    fn allow_create_on_update(&self) -> bool {
        self.allow_create_on_update
    }

    fn object_usage(&self, object: &DynamicObject) -> ResourceList {
        (self.per_object)(object)
    }

    async fn usage(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<ResourceList, QuotaError> {
        let items = self
            .lister
            .list(namespace, &ListOptions::default(), cancel)
            .await
            .map_err(|e| QuotaError::UsageComputationFailed {
                kind: self.group_kind.clone(),
                source: Box::new(e),
            })?;
        let mut usage = (self.reduce)(&items);
        // Report every tracked name, zero when the reducer omits it.
        for name in &self.resource_names {
            if usage.get(name).is_none() {
                usage.set(name.clone(), 0);
            }
        }
        Ok(usage)
    }
}
