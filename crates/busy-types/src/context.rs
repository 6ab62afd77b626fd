//! Serializable projection of an execution context.
//!
//! `ContextState` carries everything about a running context except its
//! capability registry (operations are behavior, not data). It is the
//! `context_state` stored in every checkpoint and the value handed back when a
//! run is rewound.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Snapshot of the mutable state threaded through a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextState {
    /// Layer the context currently executes in (e.g. "operations").
    pub current_layer: String,
    /// State shared by every operation in the run.
    #[serde(default)]
    pub shared_state: Map<String, Value>,
    /// State private to the current layer.
    #[serde(default)]
    pub layer_specific: Map<String, Value>,
    /// Nesting depth; 0 for a root context.
    pub execution_depth: u32,
    /// Free-form annotations (process name, caller, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ContextState {
    /// A root-level state for the given layer.
    pub fn new(current_layer: impl Into<String>) -> Self {
        Self {
            current_layer: current_layer.into(),
            ..Self::default()
        }
    }
}
