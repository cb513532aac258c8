use crate::handler::EventHandler;
use crate::informer::Informer;
use crate::metrics::EventMetrics;
use crate::object::{KubeObject, ResourceKind};
use fabric_controller_k8s_api::{ObjectMeta, Pod, Service};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;

fn mk_pod(ns: &str, name: &str, uid: &str) -> KubeObject {
    KubeObject::Pod(Arc::new(Pod {
        metadata: ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            uid: Some(uid.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }))
}

fn mk_labeled_pod(ns: &str, name: &str, uid: &str, labels: &[(&str, &str)]) -> KubeObject {
    let labels: BTreeMap<String, String> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    KubeObject::Pod(Arc::new(Pod {
        metadata: ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            uid: Some(uid.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }))
}

fn mk_service(ns: &str, name: &str) -> KubeObject {
    KubeObject::Service(Arc::new(Service {
        metadata: ObjectMeta {
            namespace: Some(ns.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }))
}

type Log = Arc<Mutex<Vec<String>>>;

/// Records every callback as `name:op:namespace/name`.
struct Recorder {
    name: &'static str,
    log: Log,
}

impl Recorder {
    fn handler(name: &'static str, log: &Log) -> Box<Self> {
        Box::new(Self {
            name,
            log: log.clone(),
        })
    }

    fn record(&self, op: &str, obj: &KubeObject) {
        self.log
            .lock()
            .push(format!("{}:{}:{}", self.name, op, obj.key()));
    }
}

impl EventHandler for Recorder {
    fn on_add(&self, obj: &KubeObject) {
        self.record("add", obj);
    }

    fn on_update(&self, _old: &KubeObject, new: &KubeObject) {
        self.record("update", new);
    }

    fn on_delete(&self, obj: &KubeObject) {
        self.record("delete", obj);
    }
}

fn federated_pod_informer() -> Arc<Informer> {
    Informer::new_federated(
        ResourceKind::Pod,
        Arc::new(EventMetrics::default()),
        CancellationToken::new(),
    )
}

fn queued_pod_informer(queues: usize) -> Arc<Informer> {
    Informer::new_queued(
        ResourceKind::Pod,
        queues,
        Arc::new(EventMetrics::default()),
        CancellationToken::new(),
    )
}

async fn wait_until(mut pred: impl FnMut() -> bool) {
    time::timeout(Duration::from_secs(5), async {
        while !pred() {
            time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for condition");
}

#[tokio::test]
async fn handlers_fan_out_in_priority_order() {
    let informer = federated_pod_informer();
    let log: Log = Default::default();
    informer
        .add_handler(1, 0, None, Recorder::handler("h0", &log), Vec::new())
        .await;
    informer
        .add_handler(2, 1, None, Recorder::handler("h1", &log), Vec::new())
        .await;

    let pod = mk_pod("default", "p1", "u1");
    informer.apply(pod.clone()).await;
    assert_eq!(*log.lock(), vec!["h0:add:default/p1", "h1:add:default/p1"]);

    // Teardown runs in reverse priority order.
    informer.delete(pod).await;
    assert_eq!(
        *log.lock(),
        vec![
            "h0:add:default/p1",
            "h1:add:default/p1",
            "h1:delete:default/p1",
            "h0:delete:default/p1",
        ]
    );
}

#[tokio::test]
async fn stable_uid_updates_are_delivered_as_updates() {
    let informer = federated_pod_informer();
    let log: Log = Default::default();
    informer
        .add_handler(1, 0, None, Recorder::handler("h", &log), Vec::new())
        .await;

    informer.apply(mk_pod("ns", "x", "u1")).await;
    informer
        .apply(mk_labeled_pod("ns", "x", "u1", &[("app", "web")]))
        .await;
    assert_eq!(*log.lock(), vec!["h:add:ns/x", "h:update:ns/x"]);
}

#[tokio::test]
async fn replaced_objects_synthesize_delete_then_add() {
    let informer = federated_pod_informer();
    let log: Log = Default::default();
    informer
        .add_handler(1, 0, None, Recorder::handler("h", &log), Vec::new())
        .await;

    informer.apply(mk_pod("ns", "x", "u1")).await;
    informer.apply(mk_pod("ns", "x", "u2")).await;
    assert_eq!(
        *log.lock(),
        vec!["h:add:ns/x", "h:delete:ns/x", "h:add:ns/x"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn events_for_one_object_stay_ordered() {
    let informer = queued_pod_informer(4);
    let log: Log = Default::default();
    informer
        .add_handler(1, 0, None, Recorder::handler("h", &log), Vec::new())
        .await;

    informer.apply(mk_pod("ns", "a", "u1")).await;
    informer
        .apply(mk_labeled_pod("ns", "a", "u1", &[("rev", "2")]))
        .await;
    informer.apply(mk_pod("ns", "b", "u2")).await;

    wait_until(|| log.lock().len() == 3).await;

    let log = log.lock();
    let pos = |needle: &str| log.iter().position(|e| e == needle).unwrap();
    assert!(pos("h:add:ns/a") < pos("h:update:ns/a"));
    assert!(log.contains(&"h:add:ns/b".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn removed_handler_sees_no_new_events() {
    let informer = queued_pod_informer(4);
    let victim_log: Log = Default::default();
    let witness_log: Log = Default::default();
    let victim = informer
        .add_handler(1, 0, None, Recorder::handler("v", &victim_log), Vec::new())
        .await;
    informer
        .add_handler(2, 0, None, Recorder::handler("w", &witness_log), Vec::new())
        .await;

    for i in 0..50 {
        informer.apply(mk_pod("ns", &format!("pre-{i}"), "u")).await;
    }
    informer.remove_handler(victim);
    for i in 0..50 {
        informer.apply(mk_pod("ns", &format!("post-{i}"), "u")).await;
    }

    // The witness stays alive, so its log tells us when the queues drained.
    wait_until(|| witness_log.lock().len() == 100).await;

    assert!(
        victim_log.lock().iter().all(|e| !e.contains(":ns/post-")),
        "victim saw events enqueued after removal: {:?}",
        victim_log.lock()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn initial_replay_completes_before_registration_returns() {
    let informer = queued_pod_informer(4);
    for i in 0..10 {
        informer.apply(mk_pod("ns", &format!("seed-{i}"), "u")).await;
    }

    let log: Log = Default::default();
    informer
        .add_handler(
            1,
            0,
            None,
            Recorder::handler("h", &log),
            informer.cache_snapshot(),
        )
        .await;

    // The replay barrier guarantees the initial set is fully delivered by
    // the time registration returns.
    assert_eq!(log.lock().len(), 10);
    assert!(log.lock().iter().all(|e| e.contains(":ns/seed-")));

    informer.apply(mk_pod("ns", "live", "u")).await;
    wait_until(|| log.lock().len() == 11).await;
    assert_eq!(log.lock().last().unwrap(), "h:add:ns/live");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queue_map_compacts_only_on_delete() {
    let informer = queued_pod_informer(2);
    let log: Log = Default::default();
    informer
        .add_handler(1, 0, None, Recorder::handler("h", &log), Vec::new())
        .await;
    let queue_map = informer.queue_map().unwrap();

    let pod = mk_pod("ns", "a", "u1");
    informer.apply(pod.clone()).await;
    wait_until(|| log.lock().len() == 1).await;
    // Adds leave the routing entry behind; only deletes compact the map.
    assert_eq!(queue_map.entry_count(), 1);

    informer.delete(pod).await;
    wait_until(|| log.lock().len() == 2).await;
    wait_until(|| queue_map.entry_count() == 0).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_for_unknown_key_leaves_map_empty() {
    let informer = queued_pod_informer(2);
    let log: Log = Default::default();
    informer
        .add_handler(1, 0, None, Recorder::handler("h", &log), Vec::new())
        .await;

    informer.delete(mk_pod("ns", "ghost", "u1")).await;
    wait_until(|| log.lock().len() == 1).await;
    wait_until(|| informer.queue_map().unwrap().entry_count() == 0).await;
}

#[tokio::test]
async fn mismatched_object_types_are_dropped() {
    let informer = federated_pod_informer();
    let log: Log = Default::default();
    informer
        .add_handler(1, 0, None, Recorder::handler("h", &log), Vec::new())
        .await;

    let svc = mk_service("ns", "web");
    informer.apply(svc.clone()).await;
    informer.delete(svc.clone()).await;

    assert!(log.lock().is_empty());
    assert!(informer.cache_get(&svc.key()).is_none());
}

#[tokio::test]
async fn double_removal_is_idempotent() {
    let informer = federated_pod_informer();
    let log: Log = Default::default();
    let id = informer
        .add_handler(1, 0, None, Recorder::handler("h", &log), Vec::new())
        .await;

    informer.remove_handler(id);
    informer.remove_handler(id);

    informer.apply(mk_pod("ns", "a", "u1")).await;
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn filter_transitions_synthesize_add_and_delete() {
    let informer = federated_pod_informer();
    let log: Log = Default::default();
    let filter: crate::FilterFn = Arc::new(|obj: &KubeObject| match obj {
        KubeObject::Pod(pod) => pod
            .metadata
            .labels
            .as_ref()
            .is_some_and(|l| l.contains_key("net")),
        _ => false,
    });
    informer
        .add_handler(1, 0, Some(filter), Recorder::handler("h", &log), Vec::new())
        .await;

    // Outside the filter: suppressed.
    informer.apply(mk_pod("ns", "x", "u1")).await;
    assert!(log.lock().is_empty());

    // Entering the filtered set is an add, leaving it is a delete.
    informer
        .apply(mk_labeled_pod("ns", "x", "u1", &[("net", "blue")]))
        .await;
    informer.apply(mk_pod("ns", "x", "u1")).await;
    assert_eq!(*log.lock(), vec!["h:add:ns/x", "h:delete:ns/x"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_callbacks_after_shutdown() {
    let informer = queued_pod_informer(2);
    let log: Log = Default::default();
    informer
        .add_handler(1, 0, None, Recorder::handler("h", &log), Vec::new())
        .await;

    informer.apply(mk_pod("ns", "a", "u1")).await;
    wait_until(|| log.lock().len() == 1).await;

    informer.shutdown().await;
    informer.apply(mk_pod("ns", "b", "u2")).await;
    time::sleep(Duration::from_millis(50)).await;
    assert_eq!(log.lock().len(), 1);
}

#[tokio::test]
async fn resync_diffs_the_cached_world() {
    let informer = federated_pod_informer();
    let log: Log = Default::default();
    informer
        .add_handler(1, 0, None, Recorder::handler("h", &log), Vec::new())
        .await;

    informer.apply(mk_pod("ns", "stays", "u1")).await;
    informer.apply(mk_pod("ns", "goes", "u2")).await;
    log.lock().clear();

    // A relist that kept one object, changed nothing about it, and lost the
    // other: the survivor is an update, the missing one a delete from its
    // cached final state.
    informer
        .resync(vec![mk_pod("ns", "stays", "u1"), mk_pod("ns", "fresh", "u3")])
        .await;

    let log = log.lock();
    assert_eq!(log.len(), 3);
    assert!(log.contains(&"h:update:ns/stays".to_string()));
    assert!(log.contains(&"h:add:ns/fresh".to_string()));
    assert!(log.contains(&"h:delete:ns/goes".to_string()));
}
