//! Event stream plumbing
//!
//! The ledger writes outbox rows; [`outbox::OutboxPublisher`] drains them
//! into JetStream; [`fraud::FraudConsumer`] pulls them back out with an
//! inbox-dedup guard. Both loops are at-least-once by construction.

pub mod fraud;
pub mod outbox;
pub mod streams;

pub use fraud::FraudConsumer;
pub use outbox::OutboxPublisher;
