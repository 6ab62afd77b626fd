//! Event types for the orchestration event bus.
//!
//! `OrchestrationEvent` is broadcast while a process runs so that dashboards,
//! loggers and generated runtime UIs can follow along without polling.
//! All variants are Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkpoint::CheckpointKind;

/// Events emitted by the intervention manager and orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    /// An operation is about to be attempted.
    StepStarted {
        process_name: String,
        operation_name: String,
        step_index: usize,
    },

    /// An operation produced its output.
    StepCompleted {
        process_name: String,
        operation_name: String,
        step_index: usize,
        duration_ms: u64,
    },

    /// An operation failed; an intervention round follows.
    StepFailed {
        process_name: String,
        operation_name: String,
        step_index: usize,
        error: String,
    },

    /// An operation was skipped by a `next` decision.
    StepSkipped {
        process_name: String,
        operation_name: String,
        step_index: usize,
    },

    /// The run was rewound to an earlier checkpoint.
    StepRewound {
        process_name: String,
        checkpoint_id: Uuid,
        target_operation: String,
        target_index: usize,
    },

    /// A checkpoint was recorded.
    CheckpointCreated {
        checkpoint_id: Uuid,
        step_id: String,
        step_index: usize,
        kind: CheckpointKind,
    },

    /// The interface is being asked for a decision.
    InterventionRequested {
        operation_name: String,
        step_index: usize,
        error: Option<String>,
    },

    /// The interface answered.
    InterventionResolved {
        operation_name: String,
        step_index: usize,
        action: String,
    },

    /// Manual mode was entered or left.
    ManualModeChanged { enabled: bool },

    /// The process was aborted by an intervention decision.
    ProcessAborted {
        process_name: String,
        operation_name: String,
        step_index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_events_are_tagged() {
        let event = OrchestrationEvent::ManualModeChanged { enabled: true };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({ "type": "manual_mode_changed", "enabled": true }));
    }

    #[test]
    fn test_checkpoint_event_carries_kind() {
        let event = OrchestrationEvent::CheckpointCreated {
            checkpoint_id: Uuid::nil(),
            step_id: "process-order".to_string(),
            step_index: 1,
            kind: CheckpointKind::After,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], json!("after"));
        assert_eq!(value["type"], json!("checkpoint_created"));
    }
}
