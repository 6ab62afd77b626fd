//! Event bus for orchestration observability.
//!
//! Provides an `EventBus` that distributes `OrchestrationEvent` messages to
//! all subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
