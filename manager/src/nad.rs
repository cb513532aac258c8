use crate::controller::{new_network_controller, NetworkController};
use ahash::AHashMap as HashMap;
use fabric_controller_core::{Config, NetInfo, ObjectKey, Topology, DEFAULT_NETWORK_NAME};
use fabric_controller_k8s_api::NetworkAttachmentDefinition;
use fabric_controller_k8s_watch::{
    EventHandler, HandlerId, KubeObject, ResourceKind, WatchFactory, DEFAULT_HANDLER_PRIORITY,
};
use fabric_controller_sbdb::SouthboundClient;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// CNI-style network configuration carried in a
/// network-attachment-definition's `config` blob.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct NetConf {
    pub name: String,
    #[serde(default)]
    pub topology: Option<String>,
}

impl NetConf {
    pub(crate) fn parse(config: &str) -> anyhow::Result<NetInfo> {
        let conf: NetConf = serde_json::from_str(config)?;
        let topology = match conf.topology.as_deref() {
            Some(t) => t.parse::<Topology>()?,
            None => Topology::Layer3,
        };
        Ok(NetInfo::new(conf.name, topology))
    }
}

enum NadEvent {
    Apply(Arc<NetworkAttachmentDefinition>),
    Delete(ObjectKey),
}

struct NadHandler {
    tx: UnboundedSender<NadEvent>,
}

impl EventHandler for NadHandler {
    fn on_add(&self, obj: &KubeObject) {
        if let KubeObject::NetworkAttachmentDefinition(nad) = obj {
            let _ = self.tx.send(NadEvent::Apply(nad.clone()));
        }
    }

    fn on_update(&self, _old: &KubeObject, new: &KubeObject) {
        self.on_add(new);
    }

    fn on_delete(&self, obj: &KubeObject) {
        if let KubeObject::NetworkAttachmentDefinition(_) = obj {
            let _ = self.tx.send(NadEvent::Delete(obj.key()));
        }
    }
}

/// Runs one controller per observed network-attachment-definition.
///
/// The informer handler only forwards events onto a channel; this task owns
/// the controller set and does the starting and stopping, so the watch path
/// never blocks on controller work.
pub(crate) struct NadSupervisor {
    factory: Arc<WatchFactory>,
    sb: Arc<dyn SouthboundClient>,
    config: Config,
    handler: Mutex<Option<HandlerId>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct Networks {
    /// network name -> running controller
    controllers: HashMap<String, Box<dyn NetworkController>>,
    /// attachment key -> network name, for delete events
    attachments: HashMap<ObjectKey, String>,
}

impl NadSupervisor {
    pub(crate) fn new(
        factory: Arc<WatchFactory>,
        sb: Arc<dyn SouthboundClient>,
        config: Config,
    ) -> Self {
        Self {
            factory,
            sb,
            config,
            handler: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub(crate) async fn start(&self) -> anyhow::Result<()> {
        info!("starting network attachment supervisor");
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self
            .factory
            .add_network_attachment_definition_handler(
                DEFAULT_HANDLER_PRIORITY,
                None,
                Box::new(NadHandler { tx }),
            )
            .await?;
        *self.handler.lock() = Some(id);

        let sb = self.sb.clone();
        let config = self.config.clone();
        *self.task.lock() = Some(tokio::spawn(run(rx, sb, config)));
        Ok(())
    }

    pub(crate) async fn stop(&self) {
        if let Some(id) = self.handler.lock().take() {
            if let Err(error) = self
                .factory
                .remove_handler(ResourceKind::NetworkAttachmentDefinition, id)
            {
                warn!(%error, "failed to remove network attachment handler");
            }
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

async fn run(mut rx: UnboundedReceiver<NadEvent>, sb: Arc<dyn SouthboundClient>, config: Config) {
    let mut networks = Networks::default();
    while let Some(event) = rx.recv().await {
        match event {
            NadEvent::Apply(nad) => apply(&mut networks, nad, &sb, &config).await,
            NadEvent::Delete(key) => delete(&mut networks, key).await,
        }
    }
}

async fn apply(
    networks: &mut Networks,
    nad: Arc<NetworkAttachmentDefinition>,
    sb: &Arc<dyn SouthboundClient>,
    config: &Config,
) {
    let key = ObjectKey {
        namespace: nad.metadata.namespace.clone().unwrap_or_default(),
        name: nad.metadata.name.clone().unwrap_or_default(),
    };
    let Some(raw) = nad.spec.config.as_deref() else {
        warn!(attachment = %key, "attachment has no network config, skipping");
        return;
    };
    let net = match NetConf::parse(raw) {
        Ok(net) => net,
        Err(error) => {
            warn!(attachment = %key, %error, "invalid network config, skipping");
            return;
        }
    };
    if net.name == DEFAULT_NETWORK_NAME {
        // The default network is managed by its own controller.
        return;
    }
    let same_topology = networks
        .controllers
        .get(&net.name)
        .map(|c| c.topology() == net.topology);
    match same_topology {
        Some(true) => {
            networks.attachments.insert(key, net.name);
            return;
        }
        Some(false) => {
            // Topology changed under us: tear the old controller down first.
            if let Some(old) = networks.controllers.remove(&net.name) {
                old.stop().await;
            }
        }
        None => {}
    }

    let controller = match new_network_controller(sb.clone(), net.clone(), config) {
        Ok(controller) => controller,
        Err(error) => {
            error!(attachment = %key, network = %net.name, %error, "cannot run network controller");
            return;
        }
    };
    if let Err(error) = controller.start().await {
        error!(network = %net.name, %error, "failed to start network controller");
        return;
    }
    networks.attachments.insert(key, net.name.clone());
    networks.controllers.insert(net.name, controller);
}

async fn delete(networks: &mut Networks, key: ObjectKey) {
    let Some(name) = networks.attachments.remove(&key) else {
        return;
    };
    // Another attachment may still reference the same network.
    if networks.attachments.values().any(|n| n == &name) {
        return;
    }
    let Some(controller) = networks.controllers.remove(&name) else {
        return;
    };
    info!(network = %name, "network attachment removed, stopping controller");
    controller.stop().await;
    if let Err(error) = controller.cleanup().await {
        error!(network = %name, %error, "failed to clean up deleted network");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_net_conf() {
        let net = NetConf::parse(r#"{"name": "tenant-blue", "topology": "layer2"}"#).unwrap();
        assert_eq!(net, NetInfo::new("tenant-blue", Topology::Layer2));
    }

    #[test]
    fn topology_defaults_to_layer3() {
        let net = NetConf::parse(r#"{"name": "tenant-red"}"#).unwrap();
        assert_eq!(net.topology, Topology::Layer3);
    }

    #[test]
    fn rejects_unknown_topology() {
        assert!(NetConf::parse(r#"{"name": "x", "topology": "mesh"}"#).is_err());
    }

    #[test]
    fn rejects_malformed_config() {
        assert!(NetConf::parse("not json").is_err());
    }
}
