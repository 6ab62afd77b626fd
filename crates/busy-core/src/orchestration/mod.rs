//! Orchestration core: checkpoints, interventions and step execution.
//!
//! - `checkpoint` -- append-only in-memory snapshot store
//! - `interface` -- the decision boundary embedders implement
//! - `manager` -- process-level coordinator (modes, stats, checkpoints)
//! - `orchestrator` -- single-step state machine with intervention handling
//! - `context` -- execution context threading state and capabilities through a run

pub mod checkpoint;
pub mod context;
pub mod interface;
pub mod manager;
pub mod orchestrator;

pub use checkpoint::CheckpointManager;
pub use context::{
    ContextError, ContextModifications, ExecutionContext, HistoryEntry, HistoryEvent, TraceEntry,
    TraceStatus,
};
pub use interface::{BoxInterventionInterface, InterventionInterface};
pub use manager::InterventionManager;
pub use orchestrator::{
    OperationOrchestrator, OrchestratorError, ProcessContext, StepOutcome, StepResolution,
};
