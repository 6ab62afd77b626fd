//! Intervention decision types and execution statistics.
//!
//! An intervention is a decision point where a human (or an automated
//! policy) chooses how a run continues. The interface is shown an
//! [`InterventionState`] and answers with an [`InterventionAction`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::checkpoint::Checkpoint;

// ---------------------------------------------------------------------------
// InterventionAction
// ---------------------------------------------------------------------------

/// The decision returned by an intervention interface.
///
/// Internally tagged by `type`:
/// ```json
/// { "type": "back", "target_checkpoint": "0190..." }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterventionAction {
    /// Run the same step again from a fresh "before" checkpoint.
    Retry,
    /// Skip the current step and move to its successor.
    Next,
    /// Rewind to a previously created checkpoint.
    Back { target_checkpoint: Uuid },
    /// Stop the process. The only fatal action.
    Abort,
    /// Merge edits into the step input, then execute.
    EditState { modified_data: Map<String, Value> },
    /// Leave manual mode and execute the step.
    ResumeAuto,
}

impl InterventionAction {
    /// Short, stable label used in logs and events.
    pub fn label(&self) -> &'static str {
        match self {
            InterventionAction::Retry => "retry",
            InterventionAction::Next => "next",
            InterventionAction::Back { .. } => "back",
            InterventionAction::Abort => "abort",
            InterventionAction::EditState { .. } => "edit_state",
            InterventionAction::ResumeAuto => "resume_auto",
        }
    }
}

// ---------------------------------------------------------------------------
// InterventionState
// ---------------------------------------------------------------------------

/// What the interface is shown when a step pauses.
///
/// Built fresh for every prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionState {
    /// Operation name of the paused step.
    pub current_step: String,
    pub step_index: usize,
    /// Failure message when the pause was caused by an operation error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Every checkpoint recorded so far, in creation order.
    pub available_checkpoints: Vec<Checkpoint>,
}

impl InterventionState {
    /// Whether this prompt follows a failed execution.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

// ---------------------------------------------------------------------------
// ExecutionStats
// ---------------------------------------------------------------------------

/// Aggregate counters over every step the coordinator has seen.
///
/// Counters only grow until the owning manager is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total_steps: u64,
    pub completed_steps: u64,
    pub failed_steps: u64,
    pub total_checkpoints: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
