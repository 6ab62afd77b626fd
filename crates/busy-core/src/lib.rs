//! Operation orchestration core for BUSY.
//!
//! This crate owns the behavior of a run: the `Operation` contract, the
//! in-memory checkpoint store, the intervention coordinator, the step
//! orchestrator and the execution context that threads them together. It
//! depends only on `busy-types` -- never on a terminal, database or network
//! crate. Embedders supply the intervention interface.

pub mod config;
pub mod event;
pub mod operation;
pub mod orchestration;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
