//! In-memory `StoreClient` with failure injection for unit tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use pkg_state::watch::EventType;
use pkg_types::kind::GroupResource;
use pkg_types::meta::DynamicObject;

use crate::client::{ChangeEvent, ChangeStream, ObjectList, StoreClient, StoreFailure, WatchItem};
use crate::informer::Informer;
use crate::selector::ListOptions;

type WatchSender = mpsc::UnboundedSender<Result<WatchItem, StoreFailure>>;

#[derive(Default)]
struct Inner {
    revision: u64,
    objects: BTreeMap<(String, String), DynamicObject>,
    log: Vec<WatchItem>,
    watchers: Vec<WatchSender>,
    list_failure: Option<StoreFailure>,
    list_calls: usize,
}

/// Holds objects of a single resource; the resource argument is ignored.
pub(crate) struct FakeStore {
    inner: Mutex<Inner>,
    gate: watch::Sender<bool>,
    waiting: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            gate,
            waiting: AtomicUsize::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn add(&self, ns: &str, name: &str) -> u64 {
        self.add_labeled(ns, name, &[])
    }

    pub fn add_labeled(&self, ns: &str, name: &str, labels: &[(&str, &str)]) -> u64 {
        let obj = DynamicObject::new(ns, name).with_labels(labels.iter().copied());
        let mut inner = self.lock();
        let key = (ns.to_string(), name.to_string());
        let event_type = if inner.objects.contains_key(&key) {
            EventType::Modified
        } else {
            EventType::Added
        };
        record(&mut inner, event_type, obj)
    }

    pub fn delete(&self, ns: &str, name: &str) -> u64 {
        let mut inner = self.lock();
        let obj = inner
            .objects
            .get(&(ns.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_else(|| panic!("no object {}/{}", ns, name));
        record(&mut inner, EventType::Deleted, obj)
    }

    /// Write to some other resource: only the revision moves.
    pub fn write_elsewhere(&self) -> u64 {
        let mut inner = self.lock();
        inner.revision += 1;
        let revision = inner.revision;
        publish(&mut inner, WatchItem::Bookmark(revision));
        revision
    }

    pub fn block_lists(&self) {
        self.gate.send_replace(false);
    }

    pub fn unblock_lists(&self) {
        self.gate.send_replace(true);
    }

    pub fn fail_lists_with(&self, failure: Option<StoreFailure>) {
        self.lock().list_failure = failure;
    }

    /// List calls currently held by `block_lists`.
    pub fn pending_lists(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Drop every open watch with an error, as a lost connection would.
    pub fn break_watches(&self) {
        for w in self.lock().watchers.drain(..) {
            let _ = w.send(Err(StoreFailure::Expired("connection reset".to_string())));
        }
    }

    pub async fn wait_for_watchers(&self, n: usize) {
        for _ in 0..500 {
            {
                let mut inner = self.lock();
                inner.watchers.retain(|w| !w.is_closed());
                if inner.watchers.len() >= n {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {} watchers", n);
    }

    pub async fn wait_until_applied(&self, informer: &Informer, revision: u64) {
        for _ in 0..500 {
            if informer.revision().await >= revision {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("informer never reached revision {}", revision);
    }

    async fn wait_open(&self) {
        let mut rx = self.gate.subscribe();
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _ = rx.wait_for(|open| *open).await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

fn record(inner: &mut Inner, event_type: EventType, mut obj: DynamicObject) -> u64 {
    inner.revision += 1;
    let revision = inner.revision;
    obj.metadata.resource_version = Some(revision);
    let key = (obj.namespace().to_string(), obj.name().to_string());
    match event_type {
        EventType::Deleted => {
            inner.objects.remove(&key);
        }
        _ => {
            inner.objects.insert(key, obj.clone());
        }
    }
    let event = ChangeEvent {
        event_type,
        object: obj,
        resource_version: revision,
    };
    publish(inner, WatchItem::Change(event));
    revision
}

fn publish(inner: &mut Inner, item: WatchItem) {
    inner.log.push(item.clone());
    inner.watchers.retain(|w| w.send(Ok(item.clone())).is_ok());
}

#[async_trait]
impl StoreClient for FakeStore {
    async fn list(
        &self,
        _resource: &GroupResource,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<ObjectList, StoreFailure> {
        self.wait_open().await;
        let mut inner = self.lock();
        inner.list_calls += 1;
        if let Some(failure) = inner.list_failure.clone() {
            return Err(failure);
        }
        let selector = options
            .selector()
            .map_err(|e| StoreFailure::Invalid(e.to_string()))?;
        Ok(ObjectList {
            items: inner
                .objects
                .values()
                .filter(|o| o.namespace() == namespace && selector.matches(o))
                .cloned()
                .collect(),
            resource_version: inner.revision,
        })
    }

    async fn list_all(&self, _resource: &GroupResource) -> Result<ObjectList, StoreFailure> {
        self.wait_open().await;
        let inner = self.lock();
        Ok(ObjectList {
            items: inner.objects.values().cloned().collect(),
            resource_version: inner.revision,
        })
    }

    async fn watch(
        &self,
        _resource: &GroupResource,
        since: u64,
    ) -> Result<ChangeStream, StoreFailure> {
        let mut inner = self.lock();
        let backlog: Vec<Result<WatchItem, StoreFailure>> = inner
            .log
            .iter()
            .filter(|item| item.resource_version() > since)
            .cloned()
            .map(Ok)
            .collect();
        let (tx, rx) = mpsc::unbounded_channel();
        inner.watchers.push(tx);
        Ok(Box::pin(
            tokio_stream::iter(backlog).chain(UnboundedReceiverStream::new(rx)),
        ))
    }
}
