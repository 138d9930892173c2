//! Process metrics
//!
//! A single registry exposed at `/metrics` in Prometheus text format.

use prometheus::{IntCounter, Registry};
use std::sync::Arc;

pub struct Metrics {
    pub transfers_applied_total: IntCounter,
    pub transfers_spooled_total: IntCounter,
    pub outbox_published_total: IntCounter,
    pub fraud_incidents_total: IntCounter,
}

/// Build the registry and counters. Called once at startup.
pub fn init_metrics() -> (Arc<Registry>, Arc<Metrics>) {
    let registry = Registry::new();

    let transfers_applied_total =
        IntCounter::new("transfers_applied_total", "Transfers applied to the ledger")
            .expect("valid counter name");
    let transfers_spooled_total =
        IntCounter::new("transfers_spooled_total", "Transfers parked in the spool")
            .expect("valid counter name");
    let outbox_published_total =
        IntCounter::new("outbox_published_total", "Outbox rows published to the stream")
            .expect("valid counter name");
    let fraud_incidents_total =
        IntCounter::new("fraud_incidents_total", "Incidents raised by the fraud rule")
            .expect("valid counter name");

    for c in [
        &transfers_applied_total,
        &transfers_spooled_total,
        &outbox_published_total,
        &fraud_incidents_total,
    ] {
        registry
            .register(Box::new(c.clone()))
            .expect("unique counter registration");
    }

    (
        Arc::new(registry),
        Arc::new(Metrics {
            transfers_applied_total,
            transfers_spooled_total,
            outbox_published_total,
            fraud_incidents_total,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_registered_and_count() {
        let (registry, metrics) = init_metrics();
        metrics.transfers_applied_total.inc();
        metrics.transfers_applied_total.inc();
        metrics.outbox_published_total.inc();

        let families = registry.gather();
        assert_eq!(families.len(), 4);
        let applied = families
            .iter()
            .find(|f| f.get_name() == "transfers_applied_total")
            .unwrap();
        assert_eq!(applied.get_metric()[0].get_counter().get_value() as i64, 2);
    }
}
