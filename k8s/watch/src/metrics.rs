use crate::object::ResourceKind;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::{
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use std::time::Instant;

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct EventLabels {
    resource: &'static str,
    event: &'static str,
}

/// Per-kind event counters and fan-out latency histograms.
#[derive(Clone, Debug)]
pub struct EventMetrics {
    events: Family<EventLabels, Counter>,
    add_latency: Histogram,
    update_latency: Histogram,
    delete_latency: Histogram,
}

impl Default for EventMetrics {
    fn default() -> Self {
        let buckets = || exponential_buckets(0.000_1, 2.0, 16);
        Self {
            events: Family::default(),
            add_latency: Histogram::new(buckets()),
            update_latency: Histogram::new(buckets()),
            delete_latency: Histogram::new(buckets()),
        }
    }
}

impl EventMetrics {
    pub fn register(&self, reg: &mut Registry) {
        reg.register(
            "resource_update_total",
            "Total number of add/update/delete events handled per resource",
            self.events.clone(),
        );
        reg.register(
            "resource_add_latency_seconds",
            "Latency of delivering an add event to all handlers",
            self.add_latency.clone(),
        );
        reg.register(
            "resource_update_latency_seconds",
            "Latency of delivering an update event to all handlers",
            self.update_latency.clone(),
        );
        reg.register(
            "resource_delete_latency_seconds",
            "Latency of delivering a delete event to all handlers",
            self.delete_latency.clone(),
        );
    }

    pub(crate) fn observe(&self, resource: ResourceKind, event: &'static str, start: Instant) {
        self.events
            .get_or_create(&EventLabels {
                resource: resource.as_str(),
                event,
            })
            .inc();
        let elapsed = start.elapsed().as_secs_f64();
        match event {
            "add" => self.add_latency.observe(elapsed),
            "update" => self.update_latency.observe(elapsed),
            _ => self.delete_latency.observe(elapsed),
        }
    }
}
