//! The network-controller manager: runs the default network controller and,
//! with multi-network enabled, one controller per observed
//! network-attachment-definition. On start it also reaps southbound state
//! left behind by networks that no longer exist.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod controller;
mod event_support;
mod metrics;
mod nad;
mod reaper;

pub use self::controller::NetworkController;
pub use self::event_support::{
    has_dedicated_update_fn, needs_update_during_retry, pod_completed, pod_scheduled,
    resource_from_cache, resources_equal,
};
pub use self::metrics::{ConfigDurationRecorder, ManagerMetrics};

use self::controller::DefaultNetworkController;
use self::nad::NadSupervisor;
use fabric_controller_core::{Config, Topology, DEFAULT_NETWORK_NAME};
use fabric_controller_k8s_watch::WatchFactory;
use fabric_controller_sbdb::{
    Capability, Meter, MeterBand, Op, SouthboundClient, ACL_LOGGING_METER_NAME, METER_ACTION_DROP,
    METER_UNIT_PACKETS_PER_SECOND,
};
use parking_lot::Mutex;
use prometheus_client::registry::Registry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("configured zone {configured} does not match southbound zone {observed}")]
    ZoneMismatch { configured: String, observed: String },

    #[error("topology {topology} is not supported when the interconnect feature is enabled")]
    UnsupportedTopology { topology: Topology },

    #[error("manager already started")]
    AlreadyStarted,

    #[error("manager stopped")]
    Stopped,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ManagerState {
    New,
    Starting,
    Ready,
    Stopping,
    Stopped,
}

/// Orchestrates startup and shutdown of all network controllers.
///
/// `start` is one-shot: a manager that failed to start stays stopped and a
/// fresh one must be constructed.
pub struct ControllerManager {
    factory: Arc<WatchFactory>,
    sb: Arc<dyn SouthboundClient>,
    config: Config,

    state: Mutex<ManagerState>,
    stop: CancellationToken,

    sctp_support: Mutex<bool>,
    svc_template_support: Mutex<bool>,

    metrics: ManagerMetrics,
    config_duration: Mutex<Option<ConfigDurationRecorder>>,

    default_controller: Mutex<Option<Arc<DefaultNetworkController>>>,
    nad_supervisor: Mutex<Option<Arc<NadSupervisor>>>,
}

impl ControllerManager {
    pub fn new(factory: Arc<WatchFactory>, sb: Arc<dyn SouthboundClient>, config: Config) -> Self {
        Self {
            factory,
            sb,
            config,
            state: Mutex::new(ManagerState::New),
            stop: CancellationToken::new(),
            sctp_support: Mutex::new(false),
            svc_template_support: Mutex::new(false),
            metrics: ManagerMetrics::default(),
            config_duration: Mutex::new(None),
            default_controller: Mutex::new(None),
            nad_supervisor: Mutex::new(None),
        }
    }

    /// Registers the manager's and the watch factory's metrics.
    pub fn register_metrics(&self, reg: &mut Registry) {
        self.metrics.register(reg);
        self.factory.metrics().register(reg);
        if let Some(recorder) = &*self.config_duration.lock() {
            recorder.register(reg);
        }
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        {
            let mut state = self.state.lock();
            if *state != ManagerState::New {
                return Err(ManagerError::AlreadyStarted.into());
            }
            *state = ManagerState::Starting;
        }
        info!("starting the network controller manager");

        match self.start_inner().await {
            Ok(()) => {
                *self.state.lock() = ManagerState::Ready;
                Ok(())
            }
            Err(error) => {
                *self.state.lock() = ManagerState::Stopped;
                Err(error)
            }
        }
    }

    async fn start_inner(&self) -> anyhow::Result<()> {
        wait_for_zone_match(
            &*self.sb,
            &self.config.zone,
            self.config.zone_match_timeout,
            self.config.zone_match_interval,
            &self.stop,
            &self.metrics,
        )
        .await?;

        if self.config.enable_metrics {
            info!("metrics enabled");
        }

        self.probe_features().await?;

        // The meter only rate-limits ACL logging; a failure must not keep
        // the control plane from starting.
        if let Err(error) =
            create_acl_logging_meter(&*self.sb, self.config.acl_logging_rate_limit).await
        {
            warn!(%error, "failed to create ACL logging meter");
        }

        if self.config.enable_config_duration {
            *self.config_duration.lock() = Some(ConfigDurationRecorder::default());
        }

        self.factory.start().await?;

        let default_controller = Arc::new(DefaultNetworkController::new(
            self.factory.clone(),
            self.sb.clone(),
        ));
        default_controller.start().await?;
        *self.default_controller.lock() = Some(default_controller);

        self.reap_stale_networks().await?;

        if self.config.enable_multi_network {
            let supervisor = Arc::new(NadSupervisor::new(
                self.factory.clone(),
                self.sb.clone(),
                self.config.clone(),
            ));
            supervisor.start().await?;
            *self.nad_supervisor.lock() = Some(supervisor);
        }

        Ok(())
    }

    async fn probe_features(&self) -> anyhow::Result<()> {
        let sctp = self.sb.probe(Capability::Sctp).await?;
        if sctp {
            info!("SCTP support detected");
        } else {
            warn!("SCTP unsupported by the southbound database, SCTP services will not work");
        }
        *self.sctp_support.lock() = sctp;

        let templates = self.sb.probe(Capability::ChassisTemplateVar).await?;
        if !templates {
            warn!("southbound database does not support template variables, disabling template load balancers");
        }
        *self.svc_template_support.lock() = templates;
        Ok(())
    }

    /// Networks known to the running set at start: just the default network;
    /// secondary controllers have not been created yet.
    async fn reap_stale_networks(&self) -> anyhow::Result<()> {
        let running: HashSet<String> = [DEFAULT_NETWORK_NAME.to_string()].into();
        reaper::cleanup_deleted_networks(&self.sb, &running, &self.metrics).await
    }

    /// Gracefully stops every managed controller and the watch factory.
    pub async fn stop(&self) {
        *self.state.lock() = ManagerState::Stopping;
        self.stop.cancel();

        if let Some(controller) = self.default_controller.lock().take() {
            controller.stop().await;
        }
        if let Some(supervisor) = self.nad_supervisor.lock().take() {
            supervisor.stop().await;
        }
        self.factory.shutdown().await;

        *self.state.lock() = ManagerState::Stopped;
    }

    pub fn sctp_support(&self) -> bool {
        *self.sctp_support.lock()
    }

    pub fn svc_template_support(&self) -> bool {
        *self.svc_template_support.lock()
    }
}

/// Installs the fair meter that rate-limits ACL logging: one drop band at
/// the configured packets-per-second rate, committed as a single op list.
async fn create_acl_logging_meter(sb: &dyn SouthboundClient, rate: u32) -> anyhow::Result<()> {
    let band = MeterBand {
        action: METER_ACTION_DROP.to_string(),
        rate,
    };
    let meter = Meter {
        name: ACL_LOGGING_METER_NAME.to_string(),
        unit: METER_UNIT_PACKETS_PER_SECOND.to_string(),
        fair: true,
    };
    sb.transact(vec![Op::CreateOrUpdateMeter {
        meter,
        bands: vec![band],
    }])
    .await?;
    Ok(())
}

/// Polls the southbound database until its zone matches `configured`.
/// Gives up after `timeout`, returning an error naming both zones.
async fn wait_for_zone_match(
    sb: &dyn SouthboundClient,
    configured: &str,
    timeout: std::time::Duration,
    interval: std::time::Duration,
    stop: &CancellationToken,
    metrics: &ManagerMetrics,
) -> Result<(), ManagerError> {
    let deadline = Instant::now() + timeout;
    let mut observed = String::new();
    loop {
        metrics.zone_match_attempt();
        match sb.zone().await {
            Ok(zone) if zone == configured => return Ok(()),
            Ok(zone) => {
                observed = zone;
            }
            Err(error) => {
                warn!(%error, "failed to read zone from the southbound database");
            }
        }
        if Instant::now() >= deadline {
            return Err(ManagerError::ZoneMismatch {
                configured: configured.to_string(),
                observed,
            });
        }
        tokio::select! {
            _ = time::sleep(interval) => {}
            _ = stop.cancelled() => return Err(ManagerError::Stopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_controller_sbdb::mem::MemSouthbound;
    use std::time::Duration;

    #[tokio::test]
    async fn zone_match_succeeds_when_zones_agree() {
        let db = MemSouthbound::new("z1");
        let stop = CancellationToken::new();
        wait_for_zone_match(
            &db,
            "z1",
            Duration::from_millis(200),
            Duration::from_millis(10),
            &stop,
            &ManagerMetrics::default(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn zone_mismatch_names_both_zones() {
        let db = MemSouthbound::new("z2");
        let stop = CancellationToken::new();
        let err = wait_for_zone_match(
            &db,
            "z1",
            Duration::from_millis(100),
            Duration::from_millis(10),
            &stop,
            &ManagerMetrics::default(),
        )
        .await
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("z1"), "missing configured zone: {message}");
        assert!(message.contains("z2"), "missing observed zone: {message}");
    }

    #[tokio::test]
    async fn zone_match_tolerates_late_agreement() {
        let db = Arc::new(MemSouthbound::new("z2"));
        let flip = db.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(30)).await;
            flip.set_zone("z1");
        });

        let stop = CancellationToken::new();
        wait_for_zone_match(
            &*db,
            "z1",
            Duration::from_secs(2),
            Duration::from_millis(10),
            &stop,
            &ManagerMetrics::default(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn installs_acl_logging_meter() {
        let db = Arc::new(MemSouthbound::new("z1"));
        create_acl_logging_meter(&*db, 25).await.unwrap();

        let (meter, bands) = db.meter(ACL_LOGGING_METER_NAME).unwrap();
        assert!(meter.fair);
        assert_eq!(meter.unit, METER_UNIT_PACKETS_PER_SECOND);
        assert_eq!(
            bands,
            vec![MeterBand {
                action: METER_ACTION_DROP.to_string(),
                rate: 25,
            }]
        );
    }

    #[tokio::test]
    async fn acl_logging_meter_failure_is_surfaced_to_the_caller() {
        // Start logs and tolerates this error; the helper itself must
        // surface it.
        let db = Arc::new(MemSouthbound::new("z1"));
        db.fail_transactions(true);
        assert!(create_acl_logging_meter(&*db, 25).await.is_err());
        assert!(db.meter(ACL_LOGGING_METER_NAME).is_none());
    }

    #[tokio::test]
    async fn unsupported_topology_is_rejected_under_interconnect() {
        let db: Arc<dyn SouthboundClient> = Arc::new(MemSouthbound::new("z1"));
        let config = Config {
            enable_interconnect: true,
            ..Default::default()
        };

        let err = controller::new_network_controller(
            db.clone(),
            fabric_controller_core::NetInfo::new("tenant", Topology::Layer2),
            &config,
        )
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(
            err,
            ManagerError::UnsupportedTopology {
                topology: Topology::Layer2
            }
        ));

        // Layer-3 networks are always allowed.
        assert!(controller::new_network_controller(
            db,
            fabric_controller_core::NetInfo::new("tenant", Topology::Layer3),
            &config,
        )
        .is_ok());
    }
}
