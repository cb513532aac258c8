use crate::ManagerError;
use async_trait::async_trait;
use fabric_controller_core::{Config, NetInfo, Topology, DEFAULT_NETWORK_NAME};
use fabric_controller_k8s_api as api;
use fabric_controller_k8s_watch::{
    EventHandler, HandlerId, KubeObject, ResourceKind, WatchFactory, DEFAULT_HANDLER_PRIORITY,
};
use fabric_controller_sbdb::{
    AddressSet, ExternalIds, LogicalRouter, LogicalSwitch, Op, SouthboundClient,
    ADDRESS_SET_IP_FAMILY_KEY, ADDRESS_SET_NAMESPACE, NETWORK_EXTERNAL_ID_KEY, OBJECT_NAME_KEY,
    TOPOLOGY_EXTERNAL_ID_KEY,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Lifecycle handle for one network's controller. Controllers own their
/// network's southbound state; `cleanup` removes every record tagged with
/// the network's name.
#[async_trait]
pub trait NetworkController: Send + Sync {
    fn network_name(&self) -> &str;
    fn topology(&self) -> Topology;

    async fn start(&self) -> anyhow::Result<()>;
    async fn stop(&self);
    async fn cleanup(&self) -> anyhow::Result<()>;
}

/// Chooses the controller implementation for a secondary network.
/// Topologies the interconnect feature cannot support are rejected here,
/// never silently downgraded.
pub(crate) fn new_network_controller(
    sb: Arc<dyn SouthboundClient>,
    net: NetInfo,
    config: &Config,
) -> Result<Box<dyn NetworkController>, ManagerError> {
    if config.enable_interconnect && net.topology != Topology::Layer3 {
        return Err(ManagerError::UnsupportedTopology {
            topology: net.topology,
        });
    }
    Ok(Box::new(SecondaryNetworkController::new(sb, net)))
}

/// Builds a controller used solely to invoke its cleanup path for a stale
/// network. Skips the interconnect check: stale records of a now-forbidden
/// topology must still be removable.
pub(crate) fn new_dummy_network_controller(
    sb: Arc<dyn SouthboundClient>,
    net: NetInfo,
) -> Box<dyn NetworkController> {
    Box::new(SecondaryNetworkController::new(sb, net))
}

// === secondary networks ===

/// Realizes one secondary network: a logical switch per network, plus a
/// cluster router for layer-3 topologies. All records carry the network and
/// topology external-IDs the reaper keys on.
pub(crate) struct SecondaryNetworkController {
    sb: Arc<dyn SouthboundClient>,
    net: NetInfo,
}

impl SecondaryNetworkController {
    pub(crate) fn new(sb: Arc<dyn SouthboundClient>, net: NetInfo) -> Self {
        Self { sb, net }
    }

    fn switch_name(&self) -> String {
        format!("{}_switch", self.net.name)
    }

    fn router_name(&self) -> String {
        format!("{}_cluster_router", self.net.name)
    }

    fn network_ids(&self) -> ExternalIds {
        let mut ids = ExternalIds::new();
        ids.insert(
            NETWORK_EXTERNAL_ID_KEY.to_string(),
            self.net.name.clone(),
        );
        ids.insert(
            TOPOLOGY_EXTERNAL_ID_KEY.to_string(),
            self.net.topology.as_str().to_string(),
        );
        ids
    }
}

#[async_trait]
impl NetworkController for SecondaryNetworkController {
    fn network_name(&self) -> &str {
        &self.net.name
    }

    fn topology(&self) -> Topology {
        self.net.topology
    }

    async fn start(&self) -> anyhow::Result<()> {
        info!(network = %self.net.name, topology = %self.net.topology, "starting network controller");
        let mut ops = vec![Op::CreateOrUpdateLogicalSwitch {
            switch: LogicalSwitch {
                name: self.switch_name(),
                external_ids: self.network_ids(),
            },
        }];
        if self.net.topology == Topology::Layer3 {
            ops.push(Op::CreateOrUpdateLogicalRouter {
                router: LogicalRouter {
                    name: self.router_name(),
                    external_ids: self.network_ids(),
                },
            });
        }
        self.sb.transact(ops).await?;
        Ok(())
    }

    async fn stop(&self) {
        debug!(network = %self.net.name, "stopping network controller");
    }

    async fn cleanup(&self) -> anyhow::Result<()> {
        info!(network = %self.net.name, "cleaning up network entities");
        let name = self.net.name.clone();
        let owned = move |ids: &ExternalIds| {
            ids.get(NETWORK_EXTERNAL_ID_KEY) == Some(&name)
        };

        let mut ops = Vec::new();
        let by_network = owned.clone();
        for switch in self
            .sb
            .find_logical_switches(&move |s: &LogicalSwitch| by_network(&s.external_ids))
            .await?
        {
            ops.push(Op::DeleteLogicalSwitch { name: switch.name });
        }
        for router in self
            .sb
            .find_logical_routers(&move |r: &LogicalRouter| owned(&r.external_ids))
            .await?
        {
            ops.push(Op::DeleteLogicalRouter { name: router.name });
        }
        if !ops.is_empty() {
            self.sb.transact(ops).await?;
        }
        Ok(())
    }
}

// === default network ===

enum NamespaceEvent {
    Apply(Arc<api::Namespace>),
    Delete(String),
}

struct NamespaceHandler {
    tx: UnboundedSender<NamespaceEvent>,
}

impl EventHandler for NamespaceHandler {
    fn on_add(&self, obj: &KubeObject) {
        if let KubeObject::Namespace(ns) = obj {
            let _ = self.tx.send(NamespaceEvent::Apply(ns.clone()));
        }
    }

    fn on_update(&self, _old: &KubeObject, new: &KubeObject) {
        self.on_add(new);
    }

    fn on_delete(&self, obj: &KubeObject) {
        if let KubeObject::Namespace(_) = obj {
            let _ = self.tx.send(NamespaceEvent::Delete(obj.key().name));
        }
    }
}

/// The default network controller. Keeps one address set per namespace and
/// IP family current in the southbound database; namespace events arrive
/// through the watch factory and are drained by a single worker task.
pub(crate) struct DefaultNetworkController {
    factory: Arc<WatchFactory>,
    sb: Arc<dyn SouthboundClient>,
    handler: Mutex<Option<HandlerId>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DefaultNetworkController {
    pub(crate) fn new(factory: Arc<WatchFactory>, sb: Arc<dyn SouthboundClient>) -> Self {
        Self {
            factory,
            sb,
            handler: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    async fn sync_namespaces(sb: Arc<dyn SouthboundClient>, mut rx: UnboundedReceiver<NamespaceEvent>) {
        while let Some(event) = rx.recv().await {
            let result = match event {
                NamespaceEvent::Apply(ns) => apply_namespace_address_sets(&*sb, &ns).await,
                NamespaceEvent::Delete(name) => delete_namespace_address_sets(&*sb, &name).await,
            };
            if let Err(error) = result {
                error!(%error, "failed to sync namespace address sets");
            }
        }
    }
}

#[async_trait]
impl NetworkController for DefaultNetworkController {
    fn network_name(&self) -> &str {
        DEFAULT_NETWORK_NAME
    }

    fn topology(&self) -> Topology {
        Topology::Layer3
    }

    async fn start(&self) -> anyhow::Result<()> {
        info!("starting default network controller");
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self
            .factory
            .add_namespace_handler(
                DEFAULT_HANDLER_PRIORITY,
                None,
                Box::new(NamespaceHandler { tx }),
            )
            .await?;
        *self.handler.lock() = Some(id);
        *self.worker.lock() = Some(tokio::spawn(Self::sync_namespaces(self.sb.clone(), rx)));
        Ok(())
    }

    async fn stop(&self) {
        if let Some(id) = self.handler.lock().take() {
            if let Err(error) = self.factory.remove_handler(ResourceKind::Namespace, id) {
                warn!(%error, "failed to remove namespace handler");
            }
        }
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }

    async fn cleanup(&self) -> anyhow::Result<()> {
        // The default network is never reaped; nothing to do.
        Ok(())
    }
}

fn namespace_address_set_name(namespace: &str, family: &str) -> String {
    format!("{namespace}_{family}")
}

async fn apply_namespace_address_sets(
    sb: &dyn SouthboundClient,
    ns: &api::Namespace,
) -> anyhow::Result<()> {
    let name = ns.metadata.name.as_deref().unwrap_or_default();
    let mut ops = Vec::with_capacity(2);
    for family in ["v4", "v6"] {
        let ids = ADDRESS_SET_NAMESPACE
            .builder()
            .set(OBJECT_NAME_KEY, name)
            .set(ADDRESS_SET_IP_FAMILY_KEY, family)
            .build()?;
        ops.push(Op::CreateOrUpdateAddressSet {
            set: AddressSet {
                name: namespace_address_set_name(name, family),
                addresses: Vec::new(),
                external_ids: ids.external_ids(),
            },
        });
    }
    sb.transact(ops).await?;
    Ok(())
}

async fn delete_namespace_address_sets(
    sb: &dyn SouthboundClient,
    namespace: &str,
) -> anyhow::Result<()> {
    let ops = ["v4", "v6"]
        .into_iter()
        .map(|family| Op::DeleteAddressSet {
            name: namespace_address_set_name(namespace, family),
        })
        .collect();
    sb.transact(ops).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_controller_sbdb::mem::MemSouthbound;
    use fabric_controller_sbdb::OWNER_TYPE_KEY;

    fn mk_namespace(name: &str) -> api::Namespace {
        api::Namespace {
            metadata: api::ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn layer3_controller_realizes_switch_and_router() {
        let db = Arc::new(MemSouthbound::new("z1"));
        let controller = SecondaryNetworkController::new(
            db.clone(),
            NetInfo::new("tenant-blue", Topology::Layer3),
        );
        controller.start().await.unwrap();

        assert_eq!(db.switch_names(), vec!["tenant-blue_switch"]);
        assert_eq!(db.router_names(), vec!["tenant-blue_cluster_router"]);

        controller.cleanup().await.unwrap();
        assert!(db.switch_names().is_empty());
        assert!(db.router_names().is_empty());
    }

    #[tokio::test]
    async fn layer2_controller_realizes_switch_only() {
        let db = Arc::new(MemSouthbound::new("z1"));
        let controller = SecondaryNetworkController::new(
            db.clone(),
            NetInfo::new("tenant-red", Topology::Layer2),
        );
        controller.start().await.unwrap();

        assert_eq!(db.switch_names(), vec!["tenant-red_switch"]);
        assert!(db.router_names().is_empty());
    }

    #[tokio::test]
    async fn cleanup_spares_other_networks() {
        let db = Arc::new(MemSouthbound::new("z1"));
        let blue = SecondaryNetworkController::new(
            db.clone(),
            NetInfo::new("blue", Topology::Layer2),
        );
        let red = SecondaryNetworkController::new(
            db.clone(),
            NetInfo::new("red", Topology::Layer2),
        );
        blue.start().await.unwrap();
        red.start().await.unwrap();

        blue.cleanup().await.unwrap();
        assert_eq!(db.switch_names(), vec!["red_switch"]);
    }

    #[tokio::test]
    async fn namespace_sync_maintains_address_sets() {
        let db = Arc::new(MemSouthbound::new("z1"));
        let ns = mk_namespace("prod");

        apply_namespace_address_sets(&*db, &ns).await.unwrap();
        assert_eq!(db.address_set_names(), vec!["prod_v4", "prod_v6"]);

        // Records are tagged with the Namespace owner schema.
        let tagged = db
            .find_address_sets(&|set: &AddressSet| {
                set.external_ids.get(OWNER_TYPE_KEY).map(String::as_str) == Some("Namespace")
            })
            .await
            .unwrap();
        assert_eq!(tagged.len(), 2);

        delete_namespace_address_sets(&*db, "prod").await.unwrap();
        assert!(db.address_set_names().is_empty());
    }

    #[test]
    fn topology_mismatch_is_rejected_before_construction() {
        let db: Arc<dyn SouthboundClient> = Arc::new(MemSouthbound::new("z1"));
        let config = Config {
            enable_interconnect: true,
            ..Default::default()
        };
        assert!(new_network_controller(
            db.clone(),
            NetInfo::new("x", Topology::Localnet),
            &config
        )
        .is_err());

        // The dummy path stays open so stale localnet records remain
        // cleanable after interconnect is enabled.
        let dummy = new_dummy_network_controller(db, NetInfo::new("x", Topology::Localnet));
        assert_eq!(dummy.topology(), Topology::Localnet);
        assert_eq!(dummy.network_name(), "x");
    }
}
