use std::time::Duration;

/// Manager configuration. Read once at construction; there is no hot reload.
#[derive(Clone, Debug)]
pub struct Config {
    /// Named shard of the southbound database this manager drives. The
    /// manager refuses to start against any other zone.
    pub zone: String,

    /// Run one controller per network-attachment-definition in addition to
    /// the default network controller.
    pub enable_multi_network: bool,

    /// Interconnect deployments only support layer-3 secondary networks.
    pub enable_interconnect: bool,

    pub enable_multicast: bool,
    pub enable_metrics: bool,
    pub enable_config_duration: bool,

    /// Packets-per-second rate for the ACL logging meter.
    pub acl_logging_rate_limit: u32,

    /// How long to wait for the southbound zone to match `zone`.
    pub zone_match_timeout: Duration,
    /// Poll period for the zone match.
    pub zone_match_interval: Duration,

    /// Width of each queued informer's event-queue ring.
    pub num_event_queues: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zone: "global".to_string(),
            enable_multi_network: false,
            enable_interconnect: false,
            enable_multicast: false,
            enable_metrics: false,
            enable_config_duration: false,
            acl_logging_rate_limit: 20,
            zone_match_timeout: Duration::from_secs(300),
            zone_match_interval: Duration::from_millis(500),
            num_event_queues: 15,
        }
    }
}
