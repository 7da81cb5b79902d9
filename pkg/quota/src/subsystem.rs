use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::admission::QuotaAdmission;
use crate::client::StoreClient;
use crate::config::QuotaConfig;
use crate::factory::EvaluatorFactory;
use crate::informer_factory::SharedInformerFactory;
use crate::metrics::QuotaMetrics;

/// Fully wired quota subsystem: evaluators, optional informer caches and
/// the admission check. Built once at control-plane start-up.
pub struct QuotaSubsystem {
    pub admission: Arc<QuotaAdmission>,
    pub informers: Option<Arc<SharedInformerFactory>>,
    pub metrics: Arc<QuotaMetrics>,
    shutdown: CancellationToken,
}

impl QuotaSubsystem {
    /// Build every evaluator and, when configured, start the informers and
    /// wait for their first sync.
    ///
    /// A sync timeout is not fatal: cache-backed evaluators report
    /// `IndexNotSynced` (and admission fails closed) until the caches catch up.
    pub async fn start(client: Arc<dyn StoreClient>, config: &QuotaConfig) -> Self {
        let metrics = Arc::new(QuotaMetrics::new());
        let shutdown = CancellationToken::new();
        let informers = config.use_informers.then(|| {
            Arc::new(SharedInformerFactory::new(
                Arc::clone(&client),
                config.resync_backoff,
                Arc::clone(&metrics),
            ))
        });

        let registry = EvaluatorFactory::new(client, informers.clone())
            .with_list_timeout(config.list_timeout)
            .registry();
        info!(
            "Quota subsystem: {} evaluators, listing from {}",
            registry.len(),
            if informers.is_some() { "informer caches" } else { "the store" }
        );

        if let Some(informers) = &informers {
            informers.start(&shutdown);
            if informers.wait_for_cache_sync(config.cache_sync_timeout).await {
                info!("Quota informer caches synced");
            } else {
                warn!(
                    "Quota informer caches not synced after {:?}; admission fails closed until they are",
                    config.cache_sync_timeout
                );
            }
        }

        let admission = Arc::new(QuotaAdmission::new(Arc::new(registry), Arc::clone(&metrics)));
        Self {
            admission,
            informers,
            metrics,
            shutdown,
        }
    }

    /// Stop the informers and wait for their tasks to exit.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Some(informers) = &self.informers {
            informers.join().await;
        }
        info!("Quota subsystem stopped");
    }
}
