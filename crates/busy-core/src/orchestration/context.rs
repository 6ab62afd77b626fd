//! Execution context threaded through a run.
//!
//! `ExecutionContext` bundles the state of a run (layer, shared and
//! layer-specific state, metadata, depth) with its capability registry and
//! the shared [`InterventionManager`]. `get_context_for_operation()` and
//! `spawn()` derive contexts one level deeper that share the same manager
//! but own their state, history and call scope.

use std::sync::Arc;

use busy_types::config::EngineConfig;
use busy_types::context::ContextState;
use busy_types::error::OperationError;
use busy_types::operation::{Input, Output};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::operation::BoxOperation;

use super::manager::InterventionManager;
use super::orchestrator::{
    OperationOrchestrator, OrchestratorError, ProcessContext, StepOutcome, StepResolution,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("execution depth {depth} exceeds the maximum of {max}")]
    DepthExceeded { depth: u32, max: u32 },

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Operation(#[from] OperationError),
}

// ---------------------------------------------------------------------------
// History and trace
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEvent {
    Start,
    Complete,
    Failed,
}

/// One entry of a context's operation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub operation_name: String,
    pub event: HistoryEvent,
    pub timestamp: DateTime<Utc>,
}

/// Final status of an orchestrated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Completed,
    Skipped,
    Rewound,
    Aborted,
    Failed,
}

impl std::fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TraceStatus::Completed => "completed",
            TraceStatus::Skipped => "skipped",
            TraceStatus::Rewound => "rewound",
            TraceStatus::Aborted => "aborted",
            TraceStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Observability record of one `send_input_with_interventions` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub operation_name: String,
    pub status: TraceStatus,
}

// ---------------------------------------------------------------------------
// ContextModifications
// ---------------------------------------------------------------------------

/// Changes applied to the copy created by [`ExecutionContext::spawn`].
#[derive(Debug, Clone, Default)]
pub struct ContextModifications {
    /// Extra capabilities; a name already registered is replaced.
    pub capabilities: Vec<BoxOperation>,
    /// Merged over the copied metadata.
    pub metadata: Map<String, Value>,
    /// Merged over the copied shared state.
    pub shared_state: Map<String, Value>,
    /// Replaces the layer when set.
    pub layer: Option<String>,
}

impl ContextModifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capability(mut self, operation: BoxOperation) -> Self {
        self.capabilities.push(operation);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_shared(mut self, key: impl Into<String>, value: Value) -> Self {
        self.shared_state.insert(key.into(), value);
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }
}

// ---------------------------------------------------------------------------
// ExecutionContext
// ---------------------------------------------------------------------------

/// Metadata keys set by `get_context_for_operation` for the derived call.
const CALL_SCOPE_KEYS: [&str; 2] = ["operation", "parent_call_id"];

/// State, capabilities and services of one run (or sub-run).
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    state: ContextState,
    process: ProcessContext,
    orchestrator: OperationOrchestrator,
    max_execution_depth: u32,
    call_id: Uuid,
    operation_history: Vec<HistoryEntry>,
    execution_trace: Vec<TraceEntry>,
}

impl ExecutionContext {
    /// Create a root context (depth 0) for the named process.
    pub fn new(
        process_name: impl Into<String>,
        manager: Arc<InterventionManager>,
        config: &EngineConfig,
    ) -> Self {
        let process_name = process_name.into();
        let mut state = ContextState::new(config.default_layer.clone());
        state
            .metadata
            .insert("process".to_string(), Value::String(process_name.clone()));

        Self {
            state,
            process: ProcessContext::new(process_name, Vec::new()),
            orchestrator: OperationOrchestrator::new(manager),
            max_execution_depth: config.max_execution_depth,
            call_id: Uuid::now_v7(),
            operation_history: Vec::new(),
            execution_trace: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn process_name(&self) -> &str {
        &self.process.process_name
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    pub fn execution_depth(&self) -> u32 {
        self.state.execution_depth
    }

    pub fn state(&self) -> &ContextState {
        &self.state
    }

    pub fn shared_state_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.state.shared_state
    }

    pub fn layer_specific_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.state.layer_specific
    }

    pub fn manager(&self) -> &Arc<InterventionManager> {
        self.orchestrator.manager()
    }

    pub fn operation_history(&self) -> &[HistoryEntry] {
        &self.operation_history
    }

    pub fn execution_trace(&self) -> &[TraceEntry] {
        &self.execution_trace
    }

    /// Copy of the serializable state.
    pub fn snapshot(&self) -> ContextState {
        self.state.clone()
    }

    /// Replace the state, e.g. with a context restored by a rewind.
    ///
    /// The execution depth and the call-scope metadata (`operation`,
    /// `parent_call_id`) belong to this context and are kept, since a rewind
    /// may target a checkpoint recorded by a context at another depth.
    pub fn apply_state(&mut self, mut state: ContextState) {
        state.execution_depth = self.state.execution_depth;
        for key in CALL_SCOPE_KEYS {
            match self.state.metadata.get(key) {
                Some(value) => {
                    state.metadata.insert(key.to_string(), value.clone());
                }
                None => {
                    state.metadata.remove(key);
                }
            }
        }
        tracing::debug!(
            call_id = %self.call_id,
            layer = state.current_layer.as_str(),
            "applied context state"
        );
        self.state = state;
    }

    // -----------------------------------------------------------------------
    // Capabilities
    // -----------------------------------------------------------------------

    /// Register an operation. Registration order is the playbook order.
    pub fn register_capability(&mut self, operation: BoxOperation) {
        self.process.push(operation);
    }

    pub fn capability(&self, name: &str) -> Option<&BoxOperation> {
        self.process.operation(name)
    }

    /// Registered operation names in playbook order.
    pub fn operation_names(&self) -> &[String] {
        &self.process.operation_names
    }

    fn resolve(&self, name: &str) -> Result<(usize, BoxOperation), ContextError> {
        let operation = self
            .process
            .operation(name)
            .ok_or_else(|| ContextError::UnknownOperation(name.to_string()))?;
        let index = self
            .process
            .operation_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ContextError::UnknownOperation(name.to_string()))?;
        Ok((index, operation.clone()))
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Execute an operation directly, without checkpoints or interventions.
    pub async fn send_input(&self, operation: &str, input: Input) -> Result<Output, ContextError> {
        let (_, op) = self.resolve(operation)?;
        Ok(op.execute(input).await?)
    }

    /// Execute an operation through the orchestrator.
    ///
    /// Records `start` and then `complete` or `failed` in the operation
    /// history, and one trace entry with the final status.
    pub async fn send_input_with_interventions(
        &mut self,
        operation: &str,
        input: Input,
    ) -> Result<StepOutcome, ContextError> {
        let (step_index, op) = self.resolve(operation)?;
        self.record(operation, HistoryEvent::Start);

        let result = self
            .orchestrator
            .execute_operation_with_intervention(
                &op,
                input,
                step_index,
                operation,
                &self.state,
                &self.process,
            )
            .await;

        match result {
            Ok(outcome) => {
                self.record(operation, HistoryEvent::Complete);
                let status = match outcome.resolution {
                    StepResolution::Completed => TraceStatus::Completed,
                    StepResolution::Skipped => TraceStatus::Skipped,
                    StepResolution::Rewound { .. } => TraceStatus::Rewound,
                };
                self.trace(operation, status);
                Ok(outcome)
            }
            Err(err) => {
                self.record(operation, HistoryEvent::Failed);
                let status = if matches!(err, OrchestratorError::Aborted) {
                    TraceStatus::Aborted
                } else {
                    TraceStatus::Failed
                };
                self.trace(operation, status);
                Err(err.into())
            }
        }
    }

    fn record(&mut self, operation: &str, event: HistoryEvent) {
        self.operation_history.push(HistoryEntry {
            operation_name: operation.to_string(),
            event,
            timestamp: Utc::now(),
        });
    }

    fn trace(&mut self, operation: &str, status: TraceStatus) {
        tracing::debug!(call_id = %self.call_id, operation, %status, "traced call");
        self.execution_trace.push(TraceEntry {
            operation_name: operation.to_string(),
            status,
        });
    }

    // -----------------------------------------------------------------------
    // Derived contexts
    // -----------------------------------------------------------------------

    fn child_depth(&self) -> Result<u32, ContextError> {
        let depth = self.state.execution_depth.saturating_add(1);
        if depth > self.max_execution_depth {
            return Err(ContextError::DepthExceeded {
                depth,
                max: self.max_execution_depth,
            });
        }
        Ok(depth)
    }

    fn derive(&self, state: ContextState, process: ProcessContext) -> Self {
        Self {
            state,
            process,
            orchestrator: self.orchestrator.clone(),
            max_execution_depth: self.max_execution_depth,
            call_id: Uuid::now_v7(),
            operation_history: Vec::new(),
            execution_trace: Vec::new(),
        }
    }

    /// Child context for calls made on behalf of `operation`.
    ///
    /// One level deeper, same manager and capabilities, its own copy of the
    /// shared state and an empty layer-specific scope.
    pub fn get_context_for_operation(&self, operation: &str) -> Result<Self, ContextError> {
        self.resolve(operation)?;
        let depth = self.child_depth()?;

        let mut state = self.state.clone();
        state.execution_depth = depth;
        state.layer_specific = Map::new();
        state
            .metadata
            .insert("operation".to_string(), Value::String(operation.to_string()));
        state.metadata.insert(
            "parent_call_id".to_string(),
            Value::String(self.call_id.to_string()),
        );

        let child = self.derive(state, self.process.clone());
        tracing::debug!(
            parent = %self.call_id,
            child = %child.call_id,
            depth,
            operation,
            "created operation context"
        );
        Ok(child)
    }

    /// Copy of this context with `modifications` applied, one level deeper.
    ///
    /// The parent is left untouched.
    pub fn spawn(&self, modifications: ContextModifications) -> Result<Self, ContextError> {
        let depth = self.child_depth()?;

        let mut state = self.state.clone();
        state.execution_depth = depth;
        if let Some(layer) = modifications.layer {
            state.current_layer = layer;
        }
        state.shared_state.extend(modifications.shared_state);
        state.metadata.extend(modifications.metadata);

        let mut process = self.process.clone();
        for operation in modifications.capabilities {
            process.push(operation);
        }

        let spawned = self.derive(state, process);
        tracing::debug!(parent = %self.call_id, child = %spawned.call_id, depth, "spawned context");
        Ok(spawned)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
