//! Checkpoint types: immutable snapshots of context and in-flight data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::context::ContextState;

/// Where in a step's lifecycle a checkpoint was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// Before the operation ran.
    Before,
    /// After the operation produced its output.
    After,
    /// After the operation failed.
    Error,
}

impl std::fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointKind::Before => write!(f, "before"),
            CheckpointKind::After => write!(f, "after"),
            CheckpointKind::Error => write!(f, "error"),
        }
    }
}

/// A snapshot of execution context and step data.
///
/// Never mutated once stored; restoring hands out copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// UUIDv7, unique across the process.
    pub id: Uuid,
    /// Name of the operation the checkpoint belongs to.
    pub step_id: String,
    /// Position of the step in the playbook.
    pub step_index: usize,
    pub kind: CheckpointKind,
    pub description: String,
    pub context_state: ContextState,
    /// Input data (before/error) or output data (after) at this point.
    pub current_data: Value,
    pub timestamp: DateTime<Utc>,
}

/// Copies handed out by a successful restore.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredCheckpoint {
    pub context: ContextState,
    pub data: Value,
}
