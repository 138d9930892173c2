//! time-ledger-sim
//!
//! A zone-aware, double-entry ledger simulator for a time-currency where
//! one unit is one second. Operators mark zones up or down, apply
//! containment controls, watch incidents raised by the fraud rule, and
//! replay spooled work after recovery.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration
//! - [`db`] - Connection pool and schema
//! - [`hash`] - Canonical request fingerprint + throttle bucket
//! - [`ledger`] - Transfer admission, spool/replay, incidents, snapshot
//! - [`messaging`] - Outbox publisher and fraud consumer over JetStream
//! - [`web`] - HTTP control plane
//! - [`metrics`] - Prometheus counters
//! - [`app`] - Process wiring and shutdown

pub mod app;
pub mod config;
pub mod db;
pub mod hash;
pub mod ledger;
pub mod logging;
pub mod messaging;
pub mod metrics;
pub mod version;
pub mod web;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use ledger::{CreateTransferInput, Ledger, LedgerError, TransferOutcome};
