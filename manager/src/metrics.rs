use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Manager-level counters.
#[derive(Clone, Debug, Default)]
pub struct ManagerMetrics {
    stale_networks_reaped: Counter,
    zone_match_attempts: Counter,
}

impl ManagerMetrics {
    pub fn register(&self, reg: &mut Registry) {
        reg.register(
            "stale_networks_reaped",
            "Number of stale secondary networks cleaned out of the southbound database",
            self.stale_networks_reaped.clone(),
        );
        reg.register(
            "zone_match_attempts",
            "Number of polls performed while waiting for the southbound zone to match",
            self.zone_match_attempts.clone(),
        );
    }

    pub(crate) fn stale_network_reaped(&self) {
        self.stale_networks_reaped.inc();
    }

    pub(crate) fn zone_match_attempt(&self) {
        self.zone_match_attempts.inc();
    }
}

/// Samples how long configuration changes take to apply southbound.
/// Created only when the config-duration feature is enabled.
#[derive(Clone, Debug)]
pub struct ConfigDurationRecorder {
    durations: Histogram,
}

impl Default for ConfigDurationRecorder {
    fn default() -> Self {
        Self {
            durations: Histogram::new(exponential_buckets(0.01, 2.0, 14)),
        }
    }
}

impl ConfigDurationRecorder {
    pub fn register(&self, reg: &mut Registry) {
        reg.register(
            "config_duration_seconds",
            "Duration from receiving a configuration change to committing it southbound",
            self.durations.clone(),
        );
    }

    pub fn observe(&self, elapsed: Duration) {
        self.durations.observe(elapsed.as_secs_f64());
    }
}
