use std::sync::Arc;
use std::time::Duration;

use pkg_constants::quota::{RESOURCE_CONFIGMAPS, RESOURCE_REPLICATION_CONTROLLERS};
use pkg_quota::admission::{AdmissionDecision, AdmissionRequest};
use pkg_quota::client::StateStoreClient;
use pkg_quota::config::QuotaConfig;
use pkg_quota::evaluator::{Evaluator, Operation};
use pkg_quota::QuotaError;
use pkg_quota::factory::{new_registry, new_replication_controller_evaluator};
use pkg_quota::informer::ResyncBackoff;
use pkg_quota::informer_factory::SharedInformerFactory;
use pkg_quota::lister::{CachedLister, Lister, StoreLister};
use pkg_quota::metrics::QuotaMetrics;
use pkg_quota::selector::ListOptions;
use pkg_quota::subsystem::QuotaSubsystem;
use pkg_state::client::StateStore;
use pkg_state::watch::EventLog;
use pkg_types::kind::{CONFIGMAPS, REPLICATION_CONTROLLERS};
use pkg_types::meta::DynamicObject;
use pkg_types::quota::ResourceList;
use pkg_types::replication_controller::{
    ReplicationController, ReplicationControllerSpec, ReplicationControllerStatus,
};
use tokio_util::sync::CancellationToken;

async fn open_store(dir: &tempfile::TempDir, event_log: EventLog) -> StateStoreClient {
    let store = StateStore::with_event_log(dir.path().to_str().unwrap(), event_log)
        .await
        .unwrap();
    StateStoreClient::new(store)
}

fn rc(ns: &str, name: &str, replicas: u32) -> DynamicObject {
    let rc = ReplicationController {
        metadata: pkg_types::meta::ObjectMeta {
            name: name.to_string(),
            namespace: ns.to_string(),
            ..Default::default()
        },
        spec: ReplicationControllerSpec {
            replicas,
            selector: Default::default(),
            template_labels: Default::default(),
        },
        status: ReplicationControllerStatus::default(),
    };
    DynamicObject::from_typed(&rc).unwrap()
}

async fn rc_count(eval: &dyn Evaluator, ns: &str) -> Option<u64> {
    eval.usage(ns, &CancellationToken::new())
        .await
        .ok()
        .and_then(|u| u.get(&RESOURCE_REPLICATION_CONTROLLERS.into()))
}

/// Poll until the evaluator reports `expected`, as a cache converges.
async fn eventually_counts(eval: &dyn Evaluator, ns: &str, expected: u64) {
    for _ in 0..500 {
        if rc_count(eval, ns).await == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "usage in {} never reached {} (last: {:?})",
        ns,
        expected,
        rc_count(eval, ns).await
    );
}

#[tokio::test]
async fn direct_evaluator_counts_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let client = open_store(&dir, EventLog::default()).await;
    let rcs = REPLICATION_CONTROLLERS.group_resource();
    let eval = new_replication_controller_evaluator(Arc::new(client.clone()), None);

    assert_eq!(rc_count(eval.as_ref(), "shop").await, Some(0));
    client.apply(&rcs, &rc("shop", "frontend", 2)).await.unwrap();
    client.apply(&rcs, &rc("shop", "backend", 1)).await.unwrap();
    client.apply(&rcs, &rc("blog", "frontend", 1)).await.unwrap();
    client
        .apply(&CONFIGMAPS.group_resource(), &DynamicObject::new("shop", "cfg"))
        .await
        .unwrap();
    assert_eq!(rc_count(eval.as_ref(), "shop").await, Some(2));

    client.remove(&rcs, "shop", "backend").await.unwrap();
    assert_eq!(rc_count(eval.as_ref(), "shop").await, Some(1));
}

#[tokio::test]
async fn cached_evaluator_converges_to_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let client = open_store(&dir, EventLog::default()).await;
    let rcs = REPLICATION_CONTROLLERS.group_resource();
    client.apply(&rcs, &rc("shop", "seeded", 1)).await.unwrap();

    let subsystem = QuotaSubsystem::start(Arc::new(client.clone()), &QuotaConfig::default()).await;
    let informers = subsystem.informers.clone().unwrap();
    let cached = subsystem
        .admission
        .registry()
        .lookup(&REPLICATION_CONTROLLERS.group_kind())
        .unwrap();
    let direct = new_registry(Arc::new(client.clone()), None)
        .lookup(&REPLICATION_CONTROLLERS.group_kind())
        .unwrap();
    assert!(informers.wait_for_cache_sync(Duration::from_secs(5)).await);
    assert_eq!(rc_count(cached.as_ref(), "shop").await, Some(1));

    for i in 0..10 {
        client.apply(&rcs, &rc("shop", &format!("rc-{}", i), 1)).await.unwrap();
    }
    client.remove(&rcs, "shop", "seeded").await.unwrap();
    // Updates do not change the count.
    client.apply(&rcs, &rc("shop", "rc-0", 7)).await.unwrap();

    eventually_counts(cached.as_ref(), "shop", 10).await;
    assert_eq!(rc_count(direct.as_ref(), "shop").await, Some(10));
    subsystem.stop().await;
}

#[tokio::test]
async fn admission_enforces_limits_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let client = open_store(&dir, EventLog::default()).await;
    let rcs = REPLICATION_CONTROLLERS.group_resource();
    let config = QuotaConfig {
        use_informers: false,
        ..Default::default()
    };
    let subsystem = QuotaSubsystem::start(Arc::new(client.clone()), &config).await;
    assert!(subsystem.informers.is_none());
    let hard = ResourceList::new()
        .with(RESOURCE_REPLICATION_CONTROLLERS, 2)
        .with(RESOURCE_CONFIGMAPS, 1);
    let cancel = CancellationToken::new();

    for name in ["a", "b"] {
        let obj = rc("shop", name, 1);
        let req = AdmissionRequest::new(REPLICATION_CONTROLLERS.group_kind(), Operation::Create, obj.clone());
        assert_eq!(subsystem.admission.admit(&req, &hard, &cancel).await, AdmissionDecision::Admitted);
        client.apply(&rcs, &obj).await.unwrap();
    }

    let third = AdmissionRequest::new(
        REPLICATION_CONTROLLERS.group_kind(),
        Operation::Create,
        rc("shop", "c", 1),
    );
    assert!(!subsystem.admission.admit(&third, &hard, &cancel).await.is_admitted());

    // Scaling an existing controller is an update and never hits the count.
    let scale = AdmissionRequest::new(
        REPLICATION_CONTROLLERS.group_kind(),
        Operation::Update,
        rc("shop", "a", 10),
    );
    assert!(subsystem.admission.admit(&scale, &hard, &cancel).await.is_admitted());

    // Another namespace has its own budget.
    let elsewhere = AdmissionRequest::new(
        REPLICATION_CONTROLLERS.group_kind(),
        Operation::Create,
        rc("blog", "c", 1),
    );
    assert!(subsystem.admission.admit(&elsewhere, &hard, &cancel).await.is_admitted());

    let metrics = subsystem.metrics.render();
    assert!(metrics.contains("quota_admission_denied_total 1\n"));
    subsystem.stop().await;
}

#[tokio::test]
async fn informer_recovers_after_falling_behind_the_event_stream() {
    let dir = tempfile::tempdir().unwrap();
    // A one-slot live channel makes any burst of writes overrun the watcher.
    let client = open_store(&dir, EventLog::new(4096, 1)).await;
    let rcs = REPLICATION_CONTROLLERS.group_resource();

    let subsystem = QuotaSubsystem::start(Arc::new(client.clone()), &QuotaConfig {
        resync_backoff: ResyncBackoff {
            initial: Duration::from_millis(5),
            max: Duration::from_millis(50),
        },
        ..Default::default()
    })
    .await;
    let cached = subsystem
        .admission
        .registry()
        .lookup(&REPLICATION_CONTROLLERS.group_kind())
        .unwrap();

    for i in 0..50 {
        client.apply(&rcs, &rc("shop", &format!("rc-{}", i), 1)).await.unwrap();
    }
    for i in 0..20 {
        client.remove(&rcs, "shop", &format!("rc-{}", i)).await.unwrap();
    }
    eventually_counts(cached.as_ref(), "shop", 30).await;
    subsystem.stop().await;
}

#[tokio::test]
async fn cache_accepts_store_revisions_after_writes_to_other_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let client = open_store(&dir, EventLog::default()).await;
    let rcs = REPLICATION_CONTROLLERS.group_resource();
    client.apply(&rcs, &rc("shop", "web", 1)).await.unwrap();

    let informers = SharedInformerFactory::new(
        Arc::new(client.clone()),
        ResyncBackoff::default(),
        Arc::new(QuotaMetrics::new()),
    );
    let cached = CachedLister::new(informers.for_resource(rcs.clone()));
    let direct = StoreLister::new(Arc::new(client.clone()), rcs.clone());
    let shutdown = CancellationToken::new();
    informers.start(&shutdown);
    assert!(informers.wait_for_cache_sync(Duration::from_secs(5)).await);

    client
        .apply(&CONFIGMAPS.group_resource(), &DynamicObject::new("shop", "cfg"))
        .await
        .unwrap();
    let options = ListOptions {
        resource_version: Some(client.store().revision().await),
        ..Default::default()
    };
    let cancel = CancellationToken::new();
    assert_eq!(direct.list("shop", &options, &cancel).await.unwrap().len(), 1);

    let mut listed = Err(QuotaError::Cancelled);
    for _ in 0..500 {
        listed = cached.list("shop", &options, &cancel).await;
        if !matches!(listed, Err(QuotaError::IndexNotSynced(_))) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(listed.unwrap().len(), 1);

    shutdown.cancel();
    informers.join().await;
}
