//! Shared domain types for the BUSY operation orchestrator.
//!
//! This crate contains the data that flows between the orchestration layers:
//! Input/Output envelopes, context snapshots, checkpoints, intervention
//! actions, execution statistics, events and their associated error types.
//!
//! No runtime dependencies -- only serde, uuid, chrono, thiserror and the
//! JSON Schema crates used to describe and validate payloads.

pub mod checkpoint;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod intervention;
pub mod operation;
