use crate::handler::{EventHandler, FilterFn, HandlerId};
use crate::informer::Informer;
use crate::metrics::EventMetrics;
use crate::object::{ResourceKind, WatchedResource};
use crate::{pump, Error};
use ahash::AHashMap as HashMap;
use fabric_controller_core::ObjectKey;
use fabric_controller_k8s_api::{
    self as api, Api, CloudPrivateIpConfig, EgressFirewall, EgressIp, EgressQos, EgressService,
    EndpointSlice, MultiNetworkPolicy, NetworkAttachmentDefinition, NetworkPolicy, Node, Pod,
    Service,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Owns one informer per resource kind and the watch pumps that feed them.
///
/// Controllers use the lookup surface (`get_*`) for cached reads and the
/// handler surface (`add_*_handler` / `remove_*_handler`) to receive events.
pub struct WatchFactory {
    client: api::Client,
    informers: HashMap<ResourceKind, Arc<Informer>>,
    handler_counter: AtomicU64,
    stop: CancellationToken,
    pumps: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    metrics: Arc<EventMetrics>,
}

impl WatchFactory {
    pub fn new(client: api::Client, num_event_queues: usize) -> Self {
        let stop = CancellationToken::new();
        let metrics = Arc::new(EventMetrics::default());

        let mut informers = HashMap::with_capacity(ResourceKind::ALL.len());
        for kind in ResourceKind::ALL {
            let informer = if kind.queued() {
                Informer::new_queued(kind, num_event_queues, metrics.clone(), stop.clone())
            } else {
                Informer::new_federated(kind, metrics.clone(), stop.clone())
            };
            informers.insert(kind, informer);
        }

        Self {
            client,
            informers,
            handler_counter: AtomicU64::new(0),
            stop,
            pumps: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            metrics,
        }
    }

    pub fn metrics(&self) -> &EventMetrics {
        &self.metrics
    }

    /// Starts every watch pump and waits for the caches to hold their first
    /// listed world. Idempotent; must complete before handlers see events.
    pub async fn start(&self) -> Result<(), Error> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("starting watch factory");

        self.spawn_pump::<Pod>()?;
        self.spawn_pump::<Service>()?;
        self.spawn_pump::<api::Namespace>()?;
        self.spawn_pump::<Node>()?;
        self.spawn_pump::<NetworkPolicy>()?;
        self.spawn_pump::<EndpointSlice>()?;
        self.spawn_pump::<EgressFirewall>()?;
        self.spawn_pump::<EgressIp>()?;
        self.spawn_pump::<EgressQos>()?;
        self.spawn_pump::<EgressService>()?;
        self.spawn_pump::<CloudPrivateIpConfig>()?;
        self.spawn_pump::<NetworkAttachmentDefinition>()?;
        self.spawn_pump::<MultiNetworkPolicy>()?;

        for informer in self.informers.values() {
            tokio::select! {
                _ = self.stop.cancelled() => return Err(Error::ShutDown),
                _ = informer.wait_synced() => {}
            }
        }
        Ok(())
    }

    fn spawn_pump<T: WatchedResource>(&self) -> Result<(), Error> {
        let api = Api::<T>::all(self.client.clone());
        let informer = self.informer(T::KIND)?.clone();
        let handle = tokio::spawn(pump::run(api, informer, self.stop.child_token()));
        self.pumps.lock().push(handle);
        Ok(())
    }

    /// Cascades shutdown: stops the pumps, then shuts every informer down.
    pub async fn shutdown(&self) {
        self.stop.cancel();
        let pumps = std::mem::take(&mut *self.pumps.lock());
        for pump in pumps {
            let _ = pump.await;
        }
        for informer in self.informers.values() {
            informer.shutdown().await;
        }
    }

    fn informer(&self, kind: ResourceKind) -> Result<&Arc<Informer>, Error> {
        self.informers.get(&kind).ok_or(Error::UnknownKind(kind))
    }

    // === lookup surface ===

    fn get<T: WatchedResource>(&self, key: ObjectKey) -> Result<Arc<T>, Error> {
        let informer = self.informer(T::KIND)?;
        let obj = informer
            .cache_get(&key)
            .ok_or_else(|| Error::NotFound { kind: T::KIND, key })?;
        T::from_object(&obj).cloned().ok_or(Error::TypeMismatch {
            expected: T::KIND,
            actual: obj.kind(),
        })
    }

    fn list<T: WatchedResource>(&self, namespace: Option<&str>) -> Result<Vec<Arc<T>>, Error> {
        let informer = self.informer(T::KIND)?;
        Ok(informer
            .cache_snapshot()
            .into_iter()
            .filter(|obj| match namespace {
                Some(ns) => obj.key().namespace == ns,
                None => true,
            })
            .filter_map(|obj| T::from_object(&obj).cloned())
            .collect())
    }

    pub fn get_pod(&self, namespace: &str, name: &str) -> Result<Arc<Pod>, Error> {
        self.get(ObjectKey::new(namespace, name))
    }

    pub fn get_pods(&self, namespace: &str) -> Result<Vec<Arc<Pod>>, Error> {
        self.list(Some(namespace))
    }

    pub fn get_service(&self, namespace: &str, name: &str) -> Result<Arc<Service>, Error> {
        self.get(ObjectKey::new(namespace, name))
    }

    pub fn get_namespace(&self, name: &str) -> Result<Arc<api::Namespace>, Error> {
        self.get(ObjectKey::cluster_scoped(name))
    }

    pub fn get_namespaces(&self) -> Result<Vec<Arc<api::Namespace>>, Error> {
        self.list(None)
    }

    pub fn get_node(&self, name: &str) -> Result<Arc<Node>, Error> {
        self.get(ObjectKey::cluster_scoped(name))
    }

    pub fn get_nodes(&self) -> Result<Vec<Arc<Node>>, Error> {
        self.list(None)
    }

    pub fn get_network_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Arc<NetworkPolicy>, Error> {
        self.get(ObjectKey::new(namespace, name))
    }

    pub fn get_endpoint_slice(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Arc<EndpointSlice>, Error> {
        self.get(ObjectKey::new(namespace, name))
    }

    pub fn get_egress_firewall(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Arc<EgressFirewall>, Error> {
        self.get(ObjectKey::new(namespace, name))
    }

    pub fn get_egress_ip(&self, name: &str) -> Result<Arc<EgressIp>, Error> {
        self.get(ObjectKey::cluster_scoped(name))
    }

    pub fn get_egress_qos(&self, namespace: &str, name: &str) -> Result<Arc<EgressQos>, Error> {
        self.get(ObjectKey::new(namespace, name))
    }

    pub fn get_egress_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Arc<EgressService>, Error> {
        self.get(ObjectKey::new(namespace, name))
    }

    pub fn get_cloud_private_ip_config(
        &self,
        name: &str,
    ) -> Result<Arc<CloudPrivateIpConfig>, Error> {
        self.get(ObjectKey::cluster_scoped(name))
    }

    pub fn get_network_attachment_definition(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Arc<NetworkAttachmentDefinition>, Error> {
        self.get(ObjectKey::new(namespace, name))
    }

    pub fn get_multi_network_policy(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Arc<MultiNetworkPolicy>, Error> {
        self.get(ObjectKey::new(namespace, name))
    }

    // === handler surface ===

    /// Registers a handler on `kind`'s informer after replaying the current
    /// cache to it. The returned id is the removal token.
    pub async fn add_handler(
        &self,
        kind: ResourceKind,
        priority: usize,
        filter: Option<FilterFn>,
        callbacks: Box<dyn EventHandler>,
    ) -> Result<HandlerId, Error> {
        let informer = self.informer(kind)?;
        let id = self.handler_counter.fetch_add(1, Ordering::SeqCst);
        let existing = informer.cache_snapshot();
        informer
            .add_handler(id, priority, filter, callbacks, existing)
            .await;
        Ok(id)
    }

    pub fn remove_handler(&self, kind: ResourceKind, id: HandlerId) -> Result<(), Error> {
        self.informer(kind)?.remove_handler(id);
        Ok(())
    }

    pub async fn add_pod_handler(
        &self,
        priority: usize,
        filter: Option<FilterFn>,
        callbacks: Box<dyn EventHandler>,
    ) -> Result<HandlerId, Error> {
        self.add_handler(ResourceKind::Pod, priority, filter, callbacks)
            .await
    }

    pub async fn add_namespace_handler(
        &self,
        priority: usize,
        filter: Option<FilterFn>,
        callbacks: Box<dyn EventHandler>,
    ) -> Result<HandlerId, Error> {
        self.add_handler(ResourceKind::Namespace, priority, filter, callbacks)
            .await
    }

    pub async fn add_node_handler(
        &self,
        priority: usize,
        filter: Option<FilterFn>,
        callbacks: Box<dyn EventHandler>,
    ) -> Result<HandlerId, Error> {
        self.add_handler(ResourceKind::Node, priority, filter, callbacks)
            .await
    }

    pub async fn add_network_attachment_definition_handler(
        &self,
        priority: usize,
        filter: Option<FilterFn>,
        callbacks: Box<dyn EventHandler>,
    ) -> Result<HandlerId, Error> {
        self.add_handler(
            ResourceKind::NetworkAttachmentDefinition,
            priority,
            filter,
            callbacks,
        )
        .await
    }
}
