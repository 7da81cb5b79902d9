use async_trait::async_trait;
use chrono::Utc;
use std::pin::Pin;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use pkg_state::client::StateStore;
use pkg_state::watch::{EventType, WatchEvent};
use pkg_types::kind::GroupResource;
use pkg_types::meta::DynamicObject;
use pkg_types::validate::validate_name;

use crate::selector::ListOptions;

/// Store-level failure as reported by the authoritative store.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreFailure {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("timeout: {0}")]
    Timeout(String),
    /// The change stream can no longer be continued; the consumer must relist.
    #[error("watch expired: {0}")]
    Expired(String),
}

/// Result of a list call: the matching objects and the store revision the
/// listing is exact for.
#[derive(Debug, Clone, Default)]
pub struct ObjectList {
    pub items: Vec<DynamicObject>,
    pub resource_version: u64,
}

/// A single change to an object, in per-object causal order.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub event_type: EventType,
    pub object: DynamicObject,
    pub resource_version: u64,
}

/// Item of a watch stream.
#[derive(Debug, Clone)]
pub enum WatchItem {
    Change(ChangeEvent),
    /// The store has moved to this revision through writes the watch does
    /// not carry (other resources, undecodable values).
    Bookmark(u64),
}

impl WatchItem {
    pub fn resource_version(&self) -> u64 {
        match self {
            WatchItem::Change(event) => event.resource_version,
            WatchItem::Bookmark(revision) => *revision,
        }
    }
}

pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<WatchItem, StoreFailure>> + Send>>;

/// Narrow read interface to the authoritative store.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// List objects of `resource` in `namespace`, filtered by `options`.
    async fn list(
        &self,
        resource: &GroupResource,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<ObjectList, StoreFailure>;

    /// List objects of `resource` across all namespaces. Used to prime caches.
    async fn list_all(&self, resource: &GroupResource) -> Result<ObjectList, StoreFailure>;

    /// Stream every change to `resource` after revision `since`, with a
    /// bookmark for each store revision that carries no such change. An
    /// `Err` item is a discontinuity: the consumer must relist before
    /// trusting its view.
    async fn watch(
        &self,
        resource: &GroupResource,
        since: u64,
    ) -> Result<ChangeStream, StoreFailure>;
}

/// `StoreClient` over the SlateDB-backed `StateStore`.
/// Objects live at `/registry/<resource>/<namespace>/<name>` as JSON.
#[derive(Clone)]
pub struct StateStoreClient {
    store: StateStore,
}

impl StateStoreClient {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Create or replace an object. Stamps uid, creation time and the
    /// revision of the write into its metadata. Returns the revision.
    pub async fn apply(
        &self,
        resource: &GroupResource,
        object: &DynamicObject,
    ) -> anyhow::Result<u64> {
        validate_name(object.namespace())?;
        validate_name(object.name())?;
        let key = resource.object_key(object.namespace(), object.name());
        let existing = match self.store.get(&key).await? {
            Some(bytes) => Some(DynamicObject::from_slice(&bytes)?),
            None => None,
        };
        let mut object = object.clone();
        match existing {
            Some(prev) => {
                object.metadata.uid = prev.metadata.uid;
                object.metadata.created_at = prev.metadata.created_at;
            }
            None => {
                if object.metadata.uid.is_empty() {
                    object.metadata.uid = Uuid::new_v4().to_string();
                }
                object.metadata.created_at.get_or_insert_with(Utc::now);
            }
        }
        self.store
            .put_with_revision(&key, |revision| {
                object.metadata.resource_version = Some(revision);
                Ok(serde_json::to_vec(&object)?)
            })
            .await
    }

    /// Delete an object. Returns the revision of the delete, if it existed.
    pub async fn remove(
        &self,
        resource: &GroupResource,
        namespace: &str,
        name: &str,
    ) -> anyhow::Result<Option<u64>> {
        self.store.delete(&resource.object_key(namespace, name)).await
    }

    async fn scan(&self, prefix: &str) -> Result<(Vec<DynamicObject>, u64), StoreFailure> {
        let (entries, revision) = self
            .store
            .list_prefix_at(prefix)
            .await
            .map_err(|e| StoreFailure::Unavailable(e.to_string()))?;
        let items = entries
            .into_iter()
            .filter_map(|(key, value)| match DynamicObject::from_slice(&value) {
                Ok(obj) => Some(obj),
                Err(e) => {
                    warn!("Skipping undecodable object at {}: {}", key, e);
                    None
                }
            })
            .collect();
        Ok((items, revision))
    }
}

#[async_trait]
impl StoreClient for StateStoreClient {
    async fn list(
        &self,
        resource: &GroupResource,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<ObjectList, StoreFailure> {
        if namespace.is_empty() {
            return Err(StoreFailure::Invalid("namespace is required".to_string()));
        }
        validate_name(namespace).map_err(|e| StoreFailure::Invalid(e.to_string()))?;
        let selector = options
            .selector()
            .map_err(|e| StoreFailure::Invalid(e.to_string()))?;
        if let Some(min) = options.resource_version {
            let current = self.store.revision().await;
            if min > current {
                return Err(StoreFailure::Invalid(format!(
                    "resource version {} is newer than the store ({})",
                    min, current
                )));
            }
        }
        let (items, resource_version) = self.scan(&resource.namespace_prefix(namespace)).await?;
        let items: Vec<DynamicObject> = items.into_iter().filter(|o| selector.matches(o)).collect();
        debug!(
            "Listed {} {} in {} at revision {}",
            items.len(),
            resource,
            namespace,
            resource_version
        );
        Ok(ObjectList {
            items,
            resource_version,
        })
    }

    async fn list_all(&self, resource: &GroupResource) -> Result<ObjectList, StoreFailure> {
        let (items, resource_version) = self.scan(&resource.registry_prefix()).await?;
        Ok(ObjectList {
            items,
            resource_version,
        })
    }

    async fn watch(
        &self,
        resource: &GroupResource,
        since: u64,
    ) -> Result<ChangeStream, StoreFailure> {
        // Subscribe before reading the backlog so nothing falls in between.
        let rx = self.store.event_log.subscribe();
        let backlog = self
            .store
            .event_log
            .events_since(since)
            .await
            .ok_or_else(|| {
                StoreFailure::Expired(format!("revision {} is no longer retained", since))
            })?;
        let last_replayed = backlog.last().map(|e| e.seq).unwrap_or(since);

        let live = BroadcastStream::new(rx).filter_map(move |item| match item {
            Ok(ev) if ev.seq <= last_replayed => None,
            Ok(ev) => Some(Ok(ev)),
            Err(BroadcastStreamRecvError::Lagged(n)) => Some(Err(StoreFailure::Expired(
                format!("watch fell {} events behind", n),
            ))),
        });

        let prefix = resource.registry_prefix();
        let stream = tokio_stream::iter(backlog.into_iter().map(Ok))
            .chain(live)
            .filter_map(move |item| match item {
                Ok(ev) if ev.key.starts_with(&prefix) => {
                    let seq = ev.seq;
                    Some(Ok(decode_event(ev).map_or(WatchItem::Bookmark(seq), WatchItem::Change)))
                }
                Ok(ev) => Some(Ok(WatchItem::Bookmark(ev.seq))),
                Err(e) => Some(Err(e)),
            });
        Ok(Box::pin(stream))
    }
}

fn decode_event(ev: WatchEvent) -> Option<ChangeEvent> {
    let bytes = ev.value.as_deref()?;
    match DynamicObject::from_slice(bytes) {
        Ok(mut object) => {
            object.metadata.resource_version = Some(ev.seq);
            Some(ChangeEvent {
                event_type: ev.event_type,
                object,
                resource_version: ev.seq,
            })
        }
        Err(e) => {
            warn!("Dropping undecodable event for {}: {}", ev.key, e);
            None
        }
    }
}
