use crate::object::KubeObject;
use ahash::AHashMap as HashMap;
use fabric_controller_core::ObjectKey;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const EVENT_QUEUE_DEPTH: usize = 10;

/// One routed observation. `old` is set on update events only.
pub(crate) struct QueuedEvent {
    pub(crate) old: Option<KubeObject>,
    pub(crate) obj: KubeObject,
}

type ProcessFn = Box<dyn FnOnce(QueuedEvent) + Send>;

struct WorkItem {
    event: QueuedEvent,
    process: ProcessFn,
}

/// Routing decision for one object key. The queue index stays pinned while
/// events are in flight so all events for the key land on the same worker.
struct QueueEntry {
    queue: AtomicUsize,
    refcount: AtomicI32,
}

/// Key -> entry table, shared with completion closures. Split from the
/// channel ring so closures never keep the senders alive: dropping the ring
/// is what closes the channels at shutdown.
struct KeyTable {
    entries: Mutex<HashMap<ObjectKey, Arc<QueueEntry>>>,
}

impl KeyTable {
    /// Called when an event finishes processing. Non-delete completions
    /// only touch the refcount; the table is compacted on deletes alone.
    fn release(&self, key: &ObjectKey, entry: &QueueEntry, is_delete: bool) {
        if !is_delete {
            entry.refcount.fetch_sub(1, Ordering::SeqCst);
            return;
        }
        let mut entries = self.entries.lock();
        if entry.refcount.fetch_sub(1, Ordering::SeqCst) - 1 <= 0 {
            entries.remove(key);
        }
    }
}

/// Distributes events across a fixed ring of bounded channels, each drained
/// by a single worker, serializing all events for one object key onto one
/// worker in arrival order.
pub(crate) struct QueueMap {
    table: Arc<KeyTable>,
    queues: RwLock<Vec<mpsc::Sender<WorkItem>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl QueueMap {
    pub(crate) fn new(num_queues: usize, stop: &CancellationToken) -> Self {
        let mut queues = Vec::with_capacity(num_queues);
        let mut workers = Vec::with_capacity(num_queues);
        for _ in 0..num_queues {
            let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
            queues.push(tx);
            workers.push(tokio::spawn(process_events(rx, stop.clone())));
        }
        Self {
            table: Arc::new(KeyTable {
                entries: Mutex::new(HashMap::new()),
            }),
            queues: RwLock::new(queues),
            workers: Mutex::new(workers),
        }
    }

    /// Power-of-check balancing: random start, scan the full ring, take the
    /// shortest queue, first seen winning ties.
    fn pick_queue(queues: &[mpsc::Sender<WorkItem>]) -> usize {
        let n = queues.len();
        let start = rand::thread_rng().gen_range(0..n);
        let len = |i: usize| queues[i].max_capacity() - queues[i].capacity();
        let mut best = start;
        let mut best_len = len(start);
        for j in 0..n {
            let q = (start + j) % n;
            let l = len(q);
            if l < best_len {
                best = q;
                best_len = l;
            }
        }
        best
    }

    /// Creates or revives the routing entry for `key`. A refcount going
    /// 0 -> 1 means the prior burst completed without a delete; the entry is
    /// reassigned a fresh queue to rebalance.
    fn entry_for(&self, key: &ObjectKey, queues: &[mpsc::Sender<WorkItem>]) -> Arc<QueueEntry> {
        let mut entries = self.table.entries.lock();
        if let Some(entry) = entries.get(key) {
            let entry = entry.clone();
            if entry.refcount.fetch_add(1, Ordering::SeqCst) == 0 {
                entry.queue.store(Self::pick_queue(queues), Ordering::SeqCst);
            }
            entry
        } else {
            let entry = Arc::new(QueueEntry {
                queue: AtomicUsize::new(Self::pick_queue(queues)),
                refcount: AtomicI32::new(1),
            });
            entries.insert(key.clone(), entry.clone());
            entry
        }
    }

    /// Routes an event onto the key's worker. The completion wrapper
    /// releases the routing entry after `process` runs.
    pub(crate) async fn enqueue(
        &self,
        old: Option<KubeObject>,
        obj: KubeObject,
        is_delete: bool,
        process: impl FnOnce(QueuedEvent) + Send + 'static,
    ) {
        let key = obj.key();
        let sender = {
            let queues = self.queues.read();
            if queues.is_empty() {
                warn!(key = %key, "event queues closed, dropping event");
                return;
            }
            let entry = self.entry_for(&key, &queues);
            let queue = entry.queue.load(Ordering::SeqCst);
            let table = self.table.clone();
            let process: ProcessFn = Box::new(move |event| {
                process(event);
                table.release(&key, &entry, is_delete);
            });
            (queues[queue].clone(), process)
        };
        let (tx, process) = sender;
        let item = WorkItem {
            event: QueuedEvent { old, obj },
            process,
        };
        if let Err(err) = tx.send(item).await {
            warn!(key = %err.0.event.obj.key(), "event queue closed, dropping event");
        }
    }

    /// Two-phase shutdown: the senders are dropped to close every channel,
    /// then the workers are awaited as the barrier. Workers drain what they
    /// already hold; no process closure runs after this returns.
    pub(crate) async fn shutdown(&self) {
        self.queues.write().clear();
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.await;
        }
    }

    #[cfg(test)]
    pub(crate) fn entry_count(&self) -> usize {
        self.table.entries.lock().len()
    }
}

/// One long-running worker: drains its channel until it closes or the stop
/// token fires. Errors are the process closure's concern, not the worker's.
async fn process_events(mut rx: mpsc::Receiver<WorkItem>, stop: CancellationToken) {
    loop {
        tokio::select! {
            item = rx.recv() => match item {
                Some(item) => (item.process)(item.event),
                None => return,
            },
            _ = stop.cancelled() => return,
        }
    }
}
