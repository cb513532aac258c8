use crate::handler::{EventHandler, FilterFn, Handler, HandlerId};
use crate::metrics::EventMetrics;
use crate::object::{KubeObject, ResourceKind};
use crate::queue::QueueMap;
use ahash::AHashMap as HashMap;
use fabric_controller_core::ObjectKey;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A single-type registry of prioritized handlers over a shared object
/// cache.
///
/// Federated informers fan events out to every handler inline on the watch
/// task. Queued informers route each event through the queue map so that
/// handlers run off the watch task with per-object serialization. The mode
/// is fixed at construction.
pub(crate) struct Informer {
    kind: ResourceKind,

    /// priority -> id -> handler. BTreeMap iteration gives ascending
    /// priority for add/update fan-out; delete walks it in reverse.
    handlers: RwLock<BTreeMap<usize, HashMap<HandlerId, Arc<Handler>>>>,

    /// The shared cache backing lookups, handler replay snapshots, and the
    /// tombstones for deletes whose final state the watch never reported.
    cache: RwLock<HashMap<ObjectKey, KubeObject>>,

    queue: Option<QueueMap>,
    num_event_queues: usize,

    stop: CancellationToken,
    synced_tx: watch::Sender<bool>,
    metrics: Arc<EventMetrics>,
}

impl Informer {
    pub(crate) fn new_federated(
        kind: ResourceKind,
        metrics: Arc<EventMetrics>,
        stop: CancellationToken,
    ) -> Arc<Self> {
        let (synced_tx, _) = watch::channel(false);
        Arc::new(Self {
            kind,
            handlers: RwLock::new(BTreeMap::new()),
            cache: RwLock::new(HashMap::new()),
            queue: None,
            num_event_queues: 0,
            stop,
            synced_tx,
            metrics,
        })
    }

    pub(crate) fn new_queued(
        kind: ResourceKind,
        num_event_queues: usize,
        metrics: Arc<EventMetrics>,
        stop: CancellationToken,
    ) -> Arc<Self> {
        let (synced_tx, _) = watch::channel(false);
        Arc::new(Self {
            kind,
            handlers: RwLock::new(BTreeMap::new()),
            cache: RwLock::new(HashMap::new()),
            queue: Some(QueueMap::new(num_event_queues, &stop)),
            num_event_queues,
            stop,
            synced_tx,
            metrics,
        })
    }

    // === cache ===

    pub(crate) fn cache_get(&self, key: &ObjectKey) -> Option<KubeObject> {
        self.cache.read().get(key).cloned()
    }

    pub(crate) fn cache_snapshot(&self) -> Vec<KubeObject> {
        self.cache.read().values().cloned().collect()
    }

    pub(crate) async fn wait_synced(&self) {
        let mut rx = self.synced_tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Checks a delivered object against the declared type. Mismatches are
    /// logged and the event is dropped.
    fn ensure_kind(&self, obj: &KubeObject) -> bool {
        if obj.kind() == self.kind {
            return true;
        }
        error!(
            expected = %self.kind,
            actual = %obj.kind(),
            key = %obj.key(),
            "object type did not match informer type, dropping event"
        );
        false
    }

    // === watch-side entry points ===

    /// Add-or-update from the watch stream: consults the cache to decide
    /// which, and keeps the cache current before handlers run.
    pub(crate) async fn apply(self: &Arc<Self>, obj: KubeObject) {
        if !self.ensure_kind(&obj) {
            return;
        }
        let key = obj.key();
        let old = self.cache.write().insert(key, obj.clone());
        match old {
            Some(old) => self.dispatch_update(old, obj).await,
            None => self.dispatch_add(obj).await,
        }
    }

    /// Delete from the watch stream. When the stream reports no final state
    /// the cached copy is the tombstone; a delete for an object the cache
    /// never held is dropped.
    pub(crate) async fn delete(self: &Arc<Self>, obj: KubeObject) {
        if !self.ensure_kind(&obj) {
            return;
        }
        self.cache.write().remove(&obj.key());
        self.dispatch_delete(obj).await;
    }

    /// Reconciles a freshly listed world against the cache: new objects are
    /// adds, surviving objects are updates, vanished objects are deletes
    /// delivered from their cached final state.
    pub(crate) async fn resync(self: &Arc<Self>, objs: Vec<KubeObject>) {
        let mut fresh = HashMap::with_capacity(objs.len());
        for obj in objs {
            if !self.ensure_kind(&obj) {
                continue;
            }
            fresh.insert(obj.key(), obj);
        }

        let stale = std::mem::replace(&mut *self.cache.write(), fresh.clone());

        let mut removed = Vec::new();
        for (key, old) in stale {
            match fresh.remove(&key) {
                Some(new) => self.dispatch_update(old, new).await,
                None => removed.push(old),
            }
        }
        for (_, obj) in fresh {
            self.dispatch_add(obj).await;
        }
        for obj in removed {
            self.dispatch_delete(obj).await;
        }

        self.synced_tx.send_replace(true);
    }

    // === fan-out ===

    fn for_each_handler(&self, f: impl Fn(&Handler)) {
        let handlers = self.handlers.read();
        for by_id in handlers.values() {
            for handler in by_id.values() {
                f(handler);
            }
        }
    }

    fn for_each_handler_reversed(&self, f: impl Fn(&Handler)) {
        let handlers = self.handlers.read();
        for by_id in handlers.values().rev() {
            for handler in by_id.values() {
                f(handler);
            }
        }
    }

    fn fan_out_add(&self, obj: &KubeObject) {
        let start = Instant::now();
        self.for_each_handler(|h| h.on_add(obj));
        self.metrics.observe(self.kind, "add", start);
    }

    /// A changed unique id means the object was replaced in place; handlers
    /// see delete-then-add instead of update.
    fn fan_out_update(&self, old: &KubeObject, new: &KubeObject) {
        let start = Instant::now();
        let replaced = old.uid() != new.uid();
        if replaced {
            info!(key = %new.key(), "object replaced, delivering delete followed by add");
        }
        self.for_each_handler(|h| {
            if replaced {
                h.on_delete(old);
                h.on_add(new);
            } else {
                h.on_update(old, new);
            }
        });
        self.metrics.observe(self.kind, "update", start);
    }

    fn fan_out_delete(&self, obj: &KubeObject) {
        let start = Instant::now();
        self.for_each_handler_reversed(|h| h.on_delete(obj));
        self.metrics.observe(self.kind, "delete", start);
    }

    async fn dispatch_add(self: &Arc<Self>, obj: KubeObject) {
        match &self.queue {
            None => self.fan_out_add(&obj),
            Some(queue) => {
                let inf = self.clone();
                queue
                    .enqueue(None, obj, false, move |e| inf.fan_out_add(&e.obj))
                    .await;
            }
        }
    }

    async fn dispatch_update(self: &Arc<Self>, old: KubeObject, new: KubeObject) {
        match &self.queue {
            None => self.fan_out_update(&old, &new),
            Some(queue) => {
                let inf = self.clone();
                queue
                    .enqueue(Some(old), new, false, move |e| {
                        let old = e.old.as_ref().map_or(&e.obj, |o| o);
                        inf.fan_out_update(old, &e.obj);
                    })
                    .await;
            }
        }
    }

    async fn dispatch_delete(self: &Arc<Self>, obj: KubeObject) {
        match &self.queue {
            None => self.fan_out_delete(&obj),
            Some(queue) => {
                let inf = self.clone();
                queue
                    .enqueue(None, obj, true, move |e| inf.fan_out_delete(&e.obj))
                    .await;
            }
        }
    }

    // === registration ===

    /// Registers a handler after replaying `existing` to it alone, so it
    /// observes a consistent initial set before any live event. In queued
    /// mode the replay runs through a private temporary queue map and is
    /// awaited to completion.
    pub(crate) async fn add_handler(
        self: &Arc<Self>,
        id: HandlerId,
        priority: usize,
        filter: Option<FilterFn>,
        callbacks: Box<dyn EventHandler>,
        existing: Vec<KubeObject>,
    ) -> HandlerId {
        let handler = Handler::new(id, priority, filter, callbacks);

        match &self.queue {
            None => {
                for obj in &existing {
                    handler.on_add(obj);
                }
            }
            Some(_) => {
                let adds = QueueMap::new(self.num_event_queues, &self.stop);
                for obj in existing {
                    let h = handler.clone();
                    adds.enqueue(None, obj, false, move |e| h.on_add(&e.obj)).await;
                }
                adds.shutdown().await;
            }
        }

        self.handlers
            .write()
            .entry(priority)
            .or_default()
            .insert(id, handler);
        id
    }

    /// Kills the handler inline so no new callback fires, then excises it
    /// from the priority map asynchronously. Removing an already-removed
    /// handler is a logged no-op.
    pub(crate) fn remove_handler(self: &Arc<Self>, id: HandlerId) {
        let handler = {
            let handlers = self.handlers.read();
            handlers
                .values()
                .find_map(|by_id| by_id.get(&id))
                .cloned()
        };
        let Some(handler) = handler else {
            warn!(kind = %self.kind, id, "tried to remove unknown event handler");
            return;
        };
        if !handler.kill() {
            error!(kind = %self.kind, id = handler.id, "removing already-removed event handler");
            return;
        }
        debug!(
            kind = %self.kind,
            id = handler.id,
            priority = handler.priority,
            "sending event handler for removal"
        );

        let inf = self.clone();
        tokio::spawn(async move {
            let mut handlers = inf.handlers.write();
            let mut removed = false;
            for by_id in handlers.values_mut() {
                if by_id.remove(&id).is_some() {
                    removed = true;
                    debug!(kind = %inf.kind, id, "removed event handler");
                }
            }
            if !removed {
                warn!(kind = %inf.kind, id, "tried to remove unknown event handler");
            }
        });
    }

    /// Marks every handler dead, then closes the queue map and waits for the
    /// workers. No callback fires after this returns.
    pub(crate) async fn shutdown(&self) {
        {
            let mut handlers = self.handlers.write();
            for by_id in handlers.values() {
                for handler in by_id.values() {
                    handler.kill();
                }
            }
            handlers.clear();
        }
        if let Some(queue) = &self.queue {
            queue.shutdown().await;
        }
    }

    #[cfg(test)]
    pub(crate) fn queue_map(&self) -> Option<&QueueMap> {
        self.queue.as_ref()
    }
}
