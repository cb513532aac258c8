use crate::controller::{new_dummy_network_controller, NetworkController};
use crate::metrics::ManagerMetrics;
use ahash::AHashMap as HashMap;
use fabric_controller_core::{NetInfo, Topology};
use fabric_controller_sbdb::{
    ExternalIds, LogicalRouter, LogicalSwitch, SouthboundClient, NETWORK_EXTERNAL_ID_KEY,
    TOPOLOGY_EXTERNAL_ID_KEY,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn secondary_network(ids: &ExternalIds) -> Option<NetInfo> {
    let name = ids.get(NETWORK_EXTERNAL_ID_KEY)?;
    // The topology key always co-exists with the network key.
    let topology = ids.get(TOPOLOGY_EXTERNAL_ID_KEY)?;
    match topology.parse::<Topology>() {
        Ok(topology) => Some(NetInfo::new(name.clone(), topology)),
        Err(error) => {
            warn!(network = %name, %error, "ignoring record with unknown topology");
            None
        }
    }
}

/// Finds every secondary-network logical switch and router, and for each
/// network name not in `running`, instantiates a dummy controller of the
/// recorded topology and invokes its cleanup. One network's failure never
/// blocks the others.
pub(crate) async fn cleanup_deleted_networks(
    sb: &Arc<dyn SouthboundClient>,
    running: &HashSet<String>,
    metrics: &ManagerMetrics,
) -> anyhow::Result<()> {
    let tagged = |ids: &ExternalIds| ids.contains_key(NETWORK_EXTERNAL_ID_KEY);
    let switches = sb
        .find_logical_switches(&move |s: &LogicalSwitch| tagged(&s.external_ids))
        .await?;
    let routers = sb
        .find_logical_routers(&move |r: &LogicalRouter| tagged(&r.external_ids))
        .await?;

    let mut stale: HashMap<String, Box<dyn NetworkController>> = HashMap::new();
    let records = switches
        .iter()
        .map(|s| &s.external_ids)
        .chain(routers.iter().map(|r| &r.external_ids));
    for ids in records {
        let Some(net) = secondary_network(ids) else {
            continue;
        };
        if running.contains(&net.name) || stale.contains_key(&net.name) {
            continue;
        }
        debug!(network = %net.name, topology = %net.topology, "found stale network");
        stale.insert(net.name.clone(), new_dummy_network_controller(sb.clone(), net));
    }

    for (name, controller) in stale {
        info!(network = %name, "cleaning up entities for stale network");
        if let Err(error) = controller.cleanup().await {
            error!(network = %name, %error, "failed to delete stale logical entities");
            continue;
        }
        metrics.stale_network_reaped();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_controller_sbdb::mem::MemSouthbound;

    fn network_ids(network: &str, topology: &str) -> ExternalIds {
        let mut ids = ExternalIds::new();
        ids.insert(NETWORK_EXTERNAL_ID_KEY.to_string(), network.to_string());
        ids.insert(TOPOLOGY_EXTERNAL_ID_KEY.to_string(), topology.to_string());
        ids
    }

    #[tokio::test]
    async fn reaps_stale_layer3_network() {
        let db = Arc::new(MemSouthbound::new("z1"));
        db.insert_switch(LogicalSwitch {
            name: "netA_switch".to_string(),
            external_ids: network_ids("netA", "layer3"),
        });
        db.insert_router(LogicalRouter {
            name: "netA_cluster_router".to_string(),
            external_ids: network_ids("netA", "layer3"),
        });

        let sb: Arc<dyn SouthboundClient> = db.clone();
        let running: HashSet<String> = ["default".to_string()].into();
        cleanup_deleted_networks(&sb, &running, &ManagerMetrics::default())
            .await
            .unwrap();

        assert!(db.switch_names().is_empty());
        assert!(db.router_names().is_empty());
    }

    #[tokio::test]
    async fn keeps_running_networks() {
        let db = Arc::new(MemSouthbound::new("z1"));
        db.insert_switch(LogicalSwitch {
            name: "netA_switch".to_string(),
            external_ids: network_ids("netA", "layer2"),
        });
        // Untagged switches belong to the default network and are never
        // candidates.
        db.insert_switch(LogicalSwitch {
            name: "node1".to_string(),
            external_ids: ExternalIds::new(),
        });

        let sb: Arc<dyn SouthboundClient> = db.clone();
        let running: HashSet<String> = ["default".to_string(), "netA".to_string()].into();
        cleanup_deleted_networks(&sb, &running, &ManagerMetrics::default())
            .await
            .unwrap();

        assert_eq!(db.switch_names(), vec!["netA_switch", "node1"]);
    }

    #[tokio::test]
    async fn unrecognized_records_do_not_block_other_cleanups() {
        let db = Arc::new(MemSouthbound::new("z1"));
        db.insert_switch(LogicalSwitch {
            name: "netA_switch".to_string(),
            external_ids: network_ids("netA", "layer3"),
        });
        db.insert_switch(LogicalSwitch {
            name: "netB_switch".to_string(),
            // Unknown topology: the record is skipped, not fatal.
            external_ids: network_ids("netB", "warp"),
        });

        let sb: Arc<dyn SouthboundClient> = db.clone();
        cleanup_deleted_networks(&sb, &HashSet::new(), &ManagerMetrics::default())
            .await
            .unwrap();

        assert_eq!(db.switch_names(), vec!["netB_switch"]);
    }
}
