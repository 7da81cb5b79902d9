use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pkg_state::watch::EventType;
use pkg_types::kind::GroupResource;
use pkg_types::meta::DynamicObject;

use crate::client::{StoreClient, StoreFailure, WatchItem};
use crate::error::QuotaError;
use crate::lister::ObjectHandle;
use crate::metrics::QuotaMetrics;
use crate::selector::Selector;

/// Lifecycle of an informer cache.
///
/// `Synced` is reached after the first full list. Losing the change stream
/// drops the informer back to `Syncing` until a relist completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Unstarted,
    Syncing,
    Synced,
}

/// Relist backoff bounds.
#[derive(Debug, Clone, Copy)]
pub struct ResyncBackoff {
    pub initial: Duration,
    pub max: Duration,
}

impl ResyncBackoff {
    fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

impl Default for ResyncBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(pkg_constants::quota::DEFAULT_RESYNC_BACKOFF_INITIAL_MS),
            max: Duration::from_millis(pkg_constants::quota::DEFAULT_RESYNC_BACKOFF_MAX_MS),
        }
    }
}

struct IndexState {
    phase: SyncPhase,
    /// Store revision of the last applied list or event.
    revision: u64,
    /// namespace -> name -> object
    objects: HashMap<String, BTreeMap<String, ObjectHandle>>,
}

impl IndexState {
    fn upsert(&mut self, obj: DynamicObject) {
        self.objects
            .entry(obj.namespace().to_string())
            .or_default()
            .insert(obj.name().to_string(), Arc::new(obj));
    }

    fn remove(&mut self, namespace: &str, name: &str) {
        if let Some(ns) = self.objects.get_mut(namespace) {
            ns.remove(name);
            if ns.is_empty() {
                self.objects.remove(namespace);
            }
        }
    }
}

/// Namespace-indexed, continuously updated cache of one resource.
///
/// A single task owns all writes: it lists, then applies change events one
/// at a time. Each list replacement and each event is applied under one
/// write lock, so readers never observe a partially applied change.
pub struct Informer {
    resource: GroupResource,
    client: Arc<dyn StoreClient>,
    backoff: ResyncBackoff,
    metrics: Arc<QuotaMetrics>,
    state: RwLock<IndexState>,
    phase_tx: watch::Sender<SyncPhase>,
    started: AtomicBool,
}

impl Informer {
    pub fn new(
        resource: GroupResource,
        client: Arc<dyn StoreClient>,
        backoff: ResyncBackoff,
        metrics: Arc<QuotaMetrics>,
    ) -> Arc<Self> {
        let (phase_tx, _) = watch::channel(SyncPhase::Unstarted);
        Arc::new(Self {
            resource,
            client,
            backoff,
            metrics,
            state: RwLock::new(IndexState {
                phase: SyncPhase::Unstarted,
                revision: 0,
                objects: HashMap::new(),
            }),
            phase_tx,
            started: AtomicBool::new(false),
        })
    }

    pub fn resource(&self) -> &GroupResource {
        &self.resource
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase_tx.borrow()
    }

    pub fn has_synced(&self) -> bool {
        self.phase() == SyncPhase::Synced
    }

    /// Observe phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase_tx.subscribe()
    }

    /// Store revision the cache currently reflects.
    pub async fn revision(&self) -> u64 {
        self.state.read().await.revision
    }

    /// Wait until the cache is `Synced`. Returns false on timeout.
    pub async fn wait_for_sync(&self, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|p| *p == SyncPhase::Synced)).await,
            Ok(Ok(_))
        )
    }

    /// Objects in `namespace` matching `selector`.
    ///
    /// Fails with `IndexNotSynced` unless the cache is `Synced` and, when
    /// `min_revision` is given, has caught up to it.
    pub async fn list(
        &self,
        namespace: &str,
        selector: &Selector,
        min_revision: Option<u64>,
    ) -> Result<Vec<ObjectHandle>, QuotaError> {
        let state = self.state.read().await;
        if state.phase != SyncPhase::Synced
            || min_revision.is_some_and(|min| state.revision < min)
        {
            return Err(QuotaError::IndexNotSynced(self.resource.clone()));
        }
        Ok(state
            .objects
            .get(namespace)
            .map(|objects| {
                objects
                    .values()
                    .filter(|o| selector.matches(o))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Start the list/watch loop as a background task. Returns `None` if the
    /// informer was already started.
    pub fn start(self: &Arc<Self>, shutdown: CancellationToken) -> Option<tokio::task::JoinHandle<()>> {
        if self.started.swap(true, Ordering::SeqCst) {
            return None;
        }
        let informer = Arc::clone(self);
        Some(tokio::spawn(async move { informer.run(shutdown).await }))
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("Informer for {} started", self.resource);
        let mut delay = self.backoff.initial;
        loop {
            self.set_phase(SyncPhase::Syncing).await;
            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                r = self.list_and_watch(&shutdown, &mut delay) => r,
            };
            match result {
                Ok(()) => break,
                Err(e) => {
                    self.set_phase(SyncPhase::Syncing).await;
                    self.metrics.record_relist();
                    warn!(
                        "Informer for {} lost its view ({}), relisting in {}ms",
                        self.resource,
                        e,
                        delay.as_millis()
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = self.backoff.next(delay);
                }
            }
        }
        info!("Informer for {} stopped", self.resource);
    }

    /// One list followed by a watch from the listed revision. Returns `Ok`
    /// only on shutdown.
    async fn list_and_watch(
        &self,
        shutdown: &CancellationToken,
        delay: &mut Duration,
    ) -> Result<(), StoreFailure> {
        let list = self.client.list_all(&self.resource).await?;
        let count = list.items.len();
        let revision = list.resource_version;
        self.replace(list.items, revision).await;
        *delay = self.backoff.initial;
        info!(
            "Informer for {} synced {} objects at revision {}",
            self.resource, count, revision
        );

        let mut stream = self.client.watch(&self.resource, revision).await?;
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                n = stream.next() => n,
            };
            match next {
                Some(Ok(item)) => self.apply(item).await,
                Some(Err(e)) => return Err(e),
                None => return Err(StoreFailure::Expired("watch stream closed".to_string())),
            }
        }
    }

    async fn set_phase(&self, phase: SyncPhase) {
        let mut state = self.state.write().await;
        state.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    async fn replace(&self, items: Vec<DynamicObject>, revision: u64) {
        let mut state = self.state.write().await;
        state.objects.clear();
        for obj in items {
            state.upsert(obj);
        }
        state.revision = revision;
        state.phase = SyncPhase::Synced;
        self.phase_tx.send_replace(SyncPhase::Synced);
    }

    async fn apply(&self, item: WatchItem) {
        let mut state = self.state.write().await;
        // Already reflected by the list this watch started from.
        if item.resource_version() <= state.revision {
            return;
        }
        let event = match item {
            WatchItem::Change(event) => event,
            WatchItem::Bookmark(revision) => {
                state.revision = revision;
                return;
            }
        };
        debug!(
            "Informer for {} applying {:?} {}/{} at revision {}",
            self.resource,
            event.event_type,
            event.object.namespace(),
            event.object.name(),
            event.resource_version
        );
        match event.event_type {
            EventType::Added | EventType::Modified => state.upsert(event.object),
            EventType::Deleted => state.remove(event.object.namespace(), event.object.name()),
        }
        state.revision = event.resource_version;
    }
}
