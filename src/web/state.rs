use std::sync::Arc;

use prometheus::Registry;

use crate::ledger::Ledger;
use crate::metrics::Metrics;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    /// Admin surface is disabled entirely when no key is configured.
    pub admin_key: Option<String>,
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        ledger: Ledger,
        admin_key: Option<String>,
        registry: Arc<Registry>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            ledger,
            admin_key,
            registry,
            metrics,
        }
    }
}
