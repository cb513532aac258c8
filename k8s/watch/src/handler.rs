use crate::object::KubeObject;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Opaque id returned on registration; used to remove the handler later.
pub type HandlerId = u64;

/// Callback bundle a controller registers for one resource kind.
///
/// Callbacks are synchronous and run either on the watch task (federated
/// informers) or on a queue worker (queued informers). They must hand
/// long-running work off to the controller's own tasks.
pub trait EventHandler: Send + Sync {
    fn on_add(&self, obj: &KubeObject);
    fn on_update(&self, old: &KubeObject, new: &KubeObject);
    fn on_delete(&self, obj: &KubeObject);
}

pub type FilterFn = Arc<dyn Fn(&KubeObject) -> bool + Send + Sync>;

/// A registered handler. The liveness flag transitions alive -> dead
/// exactly once; a dead handler is never called again.
pub(crate) struct Handler {
    pub(crate) id: HandlerId,
    pub(crate) priority: usize,
    alive: AtomicBool,
    filter: Option<FilterFn>,
    callbacks: Box<dyn EventHandler>,
}

impl Handler {
    pub(crate) fn new(
        id: HandlerId,
        priority: usize,
        filter: Option<FilterFn>,
        callbacks: Box<dyn EventHandler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            priority,
            alive: AtomicBool::new(true),
            filter,
            callbacks,
        })
    }

    fn accepts(&self, obj: &KubeObject) -> bool {
        self.filter.as_ref().map_or(true, |f| f(obj))
    }

    pub(crate) fn on_add(&self, obj: &KubeObject) {
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }
        if self.accepts(obj) {
            self.callbacks.on_add(obj);
        }
    }

    /// Filter transitions on update synthesize the event the handler should
    /// see: an object entering the filtered set is an add, one leaving it is
    /// a delete.
    pub(crate) fn on_update(&self, old: &KubeObject, new: &KubeObject) {
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }
        match (self.accepts(old), self.accepts(new)) {
            (true, true) => self.callbacks.on_update(old, new),
            (false, true) => self.callbacks.on_add(new),
            (true, false) => self.callbacks.on_delete(old),
            (false, false) => {}
        }
    }

    pub(crate) fn on_delete(&self, obj: &KubeObject) {
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }
        if self.accepts(obj) {
            self.callbacks.on_delete(obj);
        }
    }

    /// Returns false if the handler was already dead.
    pub(crate) fn kill(&self) -> bool {
        self.alive.swap(false, Ordering::SeqCst)
    }
}
