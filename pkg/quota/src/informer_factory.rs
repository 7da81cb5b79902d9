use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pkg_types::kind::GroupResource;

use crate::client::StoreClient;
use crate::informer::{Informer, ResyncBackoff};
use crate::metrics::QuotaMetrics;

/// Hands out one shared informer per resource.
///
/// Informers are created lazily by `for_resource` and only begin listing
/// once `start` is called; informers requested after `start` need another
/// `start` call.
pub struct SharedInformerFactory {
    client: Arc<dyn StoreClient>,
    backoff: ResyncBackoff,
    metrics: Arc<QuotaMetrics>,
    informers: Mutex<HashMap<GroupResource, Arc<Informer>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SharedInformerFactory {
    pub fn new(client: Arc<dyn StoreClient>, backoff: ResyncBackoff, metrics: Arc<QuotaMetrics>) -> Self {
        Self {
            client,
            backoff,
            metrics,
            informers: Mutex::new(HashMap::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// The shared informer for `resource`, created on first use.
    pub fn for_resource(&self, resource: GroupResource) -> Arc<Informer> {
        let mut informers = self.informers.lock().unwrap_or_else(|e| e.into_inner());
        informers
            .entry(resource)
            .or_insert_with_key(|resource| {
                Informer::new(
                    resource.clone(),
                    Arc::clone(&self.client),
                    self.backoff,
                    Arc::clone(&self.metrics),
                )
            })
            .clone()
    }

    pub fn informers(&self) -> Vec<Arc<Informer>> {
        self.informers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Start every informer that has not been started yet.
    pub fn start(&self, shutdown: &CancellationToken) {
        let mut started = Vec::new();
        for informer in self.informers() {
            if let Some(handle) = informer.start(shutdown.clone()) {
                info!("Started informer for {}", informer.resource());
                started.push(handle);
            }
        }
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(started);
    }

    /// Wait until every informer is `Synced`. Returns false if any did not
    /// sync within `timeout`.
    pub async fn wait_for_cache_sync(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut all_synced = true;
        for informer in self.informers() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if !informer.wait_for_sync(remaining).await {
                warn!("Informer for {} did not sync within {:?}", informer.resource(), timeout);
                all_synced = false;
            }
        }
        all_synced
    }

    /// Wait for every started informer task to exit after shutdown.
    pub async fn join(&self) {
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Informer task failed: {}", e);
            }
        }
    }
}
