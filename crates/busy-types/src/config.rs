//! Engine configuration types.
//!
//! `EngineConfig` represents the `config.toml` that tunes the orchestration
//! core. All fields have sensible defaults.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the orchestration engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deepest child/spawned context allowed below the root (root is 0).
    #[serde(default = "default_max_execution_depth")]
    pub max_execution_depth: u32,

    /// Capacity of the broadcast channel carrying orchestration events.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Start every run paused in manual mode.
    #[serde(default)]
    pub start_in_manual_mode: bool,

    /// Layer name given to root execution contexts.
    #[serde(default = "default_layer")]
    pub default_layer: String,
}

fn default_max_execution_depth() -> u32 {
    8
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_layer() -> String {
    "operations".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_execution_depth: default_max_execution_depth(),
            event_channel_capacity: default_event_channel_capacity(),
            start_in_manual_mode: false,
            default_layer: default_layer(),
        }
    }
}
