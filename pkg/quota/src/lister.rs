use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use pkg_types::kind::GroupResource;
use pkg_types::meta::DynamicObject;

use crate::client::{StoreClient, StoreFailure};
use crate::error::QuotaError;
use crate::informer::Informer;
use crate::selector::ListOptions;

/// Shared, read-only reference to an object owned by the store or a cache.
pub type ObjectHandle = Arc<DynamicObject>;

/// Lists the objects of one kind in one namespace.
#[async_trait]
pub trait Lister: Send + Sync {
    async fn list(
        &self,
        namespace: &str,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ObjectHandle>, QuotaError>;
}

fn require_namespace(namespace: &str) -> Result<(), QuotaError> {
    if namespace.is_empty() {
        return Err(QuotaError::StoreError(
            "listers are namespace-scoped; namespace is required".to_string(),
        ));
    }
    Ok(())
}

/// Lists by querying the store on every call. Consistent with the store at
/// call time; pays a round trip each time.
pub struct StoreLister {
    client: Arc<dyn StoreClient>,
    resource: GroupResource,
    timeout: Option<Duration>,
}

impl StoreLister {
    pub fn new(client: Arc<dyn StoreClient>, resource: GroupResource) -> Self {
        Self {
            client,
            resource,
            timeout: None,
        }
    }

    /// Deadline for calls whose options carry none. Running out of it is a
    /// store timeout, not a cancellation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Lister for StoreLister {
    async fn list(
        &self,
        namespace: &str,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ObjectHandle>, QuotaError> {
        require_namespace(namespace)?;
        let call = self.client.list(&self.resource, namespace, options);
        // A caller deadline is a cancellation; our own is a slow store.
        let result: Result<_, StoreFailure> = match (options.timeout, self.timeout) {
            (Some(deadline), _) => tokio::select! {
                _ = cancel.cancelled() => return Err(QuotaError::Cancelled),
                r = tokio::time::timeout(deadline, call) => match r {
                    Ok(r) => r,
                    Err(_) => return Err(QuotaError::Cancelled),
                },
            },
            (None, Some(limit)) => tokio::select! {
                _ = cancel.cancelled() => return Err(QuotaError::Cancelled),
                r = tokio::time::timeout(limit, call) => r.unwrap_or_else(|_| {
                    Err(StoreFailure::Timeout(format!(
                        "no answer for {} within {}ms",
                        self.resource,
                        limit.as_millis()
                    )))
                }),
            },
            (None, None) => tokio::select! {
                _ = cancel.cancelled() => return Err(QuotaError::Cancelled),
                r = call => r,
            },
        };
        let list = result?;
        Ok(list.items.into_iter().map(Arc::new).collect())
    }
}

/// Lists from an informer cache. Never touches the network; fails with
/// `IndexNotSynced` until the informer has completed a full list.
pub struct CachedLister {
    informer: Arc<Informer>,
}

impl CachedLister {
    pub fn new(informer: Arc<Informer>) -> Self {
        Self { informer }
    }
}

#[async_trait]
impl Lister for CachedLister {
    async fn list(
        &self,
        namespace: &str,
        options: &ListOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ObjectHandle>, QuotaError> {
        if cancel.is_cancelled() {
            return Err(QuotaError::Cancelled);
        }
        require_namespace(namespace)?;
        let selector = options
            .selector()
            .map_err(|e| QuotaError::StoreError(e.to_string()))?;
        self.informer
            .list(namespace, &selector, options.resource_version)
            .await
    }
}
