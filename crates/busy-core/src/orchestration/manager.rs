//! Process-level intervention coordinator.
//!
//! `InterventionManager` owns the checkpoint store, the manual-mode and
//! one-shot intervention flags, aggregate execution statistics and the
//! installed intervention interface. It is normally constructed once and
//! injected as `Arc<InterventionManager>` into every orchestrator and
//! execution context of a run; [`InterventionManager::global`] offers a
//! process-wide instance for embedders that want a single coordinator.
//!
//! Internal locks are held only for the duration of a field update and never
//! across an `.await`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use busy_types::checkpoint::{CheckpointKind, RestoredCheckpoint};
use busy_types::config::EngineConfig;
use busy_types::context::ContextState;
use busy_types::event::OrchestrationEvent;
use busy_types::intervention::{ExecutionStats, InterventionAction, InterventionState};
use serde_json::Value;
use uuid::Uuid;

use crate::event::EventBus;

use super::checkpoint::CheckpointManager;
use super::interface::{BoxInterventionInterface, InterventionInterface};
use super::OrchestratorError;

static GLOBAL_MANAGER: OnceLock<Arc<InterventionManager>> = OnceLock::new();

// ---------------------------------------------------------------------------
// InterventionManager
// ---------------------------------------------------------------------------

/// Coordinator of manual/auto mode, pending interventions and statistics.
pub struct InterventionManager {
    checkpoints: CheckpointManager,
    interface: RwLock<Option<BoxInterventionInterface>>,
    manual_mode: AtomicBool,
    intervention_requested: AtomicBool,
    stats: Mutex<ExecutionStats>,
    start_in_manual_mode: bool,
    event_bus: EventBus,
}

impl InterventionManager {
    /// Create a manager with its own checkpoint store.
    pub fn new(config: &EngineConfig, event_bus: EventBus) -> Self {
        Self {
            checkpoints: CheckpointManager::new(),
            interface: RwLock::new(None),
            manual_mode: AtomicBool::new(config.start_in_manual_mode),
            intervention_requested: AtomicBool::new(false),
            stats: Mutex::new(ExecutionStats::default()),
            start_in_manual_mode: config.start_in_manual_mode,
            event_bus,
        }
    }

    /// A manager with default configuration and a private event bus.
    pub fn with_defaults() -> Self {
        let config = EngineConfig::default();
        let bus = EventBus::new(config.event_channel_capacity);
        Self::new(&config, bus)
    }

    /// The process-wide coordinator, created with defaults on first use.
    pub fn global() -> Arc<InterventionManager> {
        Arc::clone(GLOBAL_MANAGER.get_or_init(|| Arc::new(Self::with_defaults())))
    }

    /// Restore the initial state: no interface, no checkpoints, zeroed
    /// statistics and the configured starting mode.
    pub fn reset(&self) {
        self.checkpoints.clear();
        *self.interface.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.manual_mode
            .store(self.start_in_manual_mode, Ordering::SeqCst);
        self.intervention_requested.store(false, Ordering::SeqCst);
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = ExecutionStats::default();
        tracing::debug!("intervention manager reset");
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    // -----------------------------------------------------------------------
    // Interface
    // -----------------------------------------------------------------------

    /// Install the decision boundary. Replaces any previous interface.
    pub fn set_interface<T: InterventionInterface + 'static>(&self, interface: T) {
        self.set_boxed_interface(BoxInterventionInterface::new(interface));
    }

    pub fn set_boxed_interface(&self, interface: BoxInterventionInterface) {
        *self.interface.write().unwrap_or_else(PoisonError::into_inner) = Some(interface);
    }

    pub fn clear_interface(&self) {
        *self.interface.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn has_interface(&self) -> bool {
        self.interface
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn interface(&self) -> Result<BoxInterventionInterface, OrchestratorError> {
        self.interface
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(OrchestratorError::InterventionInterfaceMissing)
    }

    /// Ask the installed interface for a decision.
    ///
    /// Fails fast with `InterventionInterfaceMissing` when none is installed.
    pub async fn show_intervention_menu(
        &self,
        state: &InterventionState,
    ) -> Result<InterventionAction, OrchestratorError> {
        let interface = self.interface()?;

        self.event_bus.publish(OrchestrationEvent::InterventionRequested {
            operation_name: state.current_step.clone(),
            step_index: state.step_index,
            error: state.error.clone(),
        });

        let action = interface
            .show_intervention_menu(state)
            .await
            .map_err(OrchestratorError::Interface)?;

        tracing::info!(
            step = state.current_step.as_str(),
            step_index = state.step_index,
            action = action.label(),
            "intervention resolved"
        );
        self.event_bus.publish(OrchestrationEvent::InterventionResolved {
            operation_name: state.current_step.clone(),
            step_index: state.step_index,
            action: action.label().to_string(),
        });

        Ok(action)
    }

    /// Forward a status line to the interface, if one is installed.
    pub fn show_status(&self, message: &str) {
        if let Ok(interface) = self.interface() {
            interface.show_status(message);
        }
    }

    // -----------------------------------------------------------------------
    // Modes
    // -----------------------------------------------------------------------

    /// Make the next step consult the interface even without an error.
    pub fn request_intervention(&self) {
        self.intervention_requested.store(true, Ordering::SeqCst);
        tracing::debug!("intervention requested for next step");
    }

    /// Consume the one-shot intervention request.
    pub fn take_intervention_request(&self) -> bool {
        self.intervention_requested.swap(false, Ordering::SeqCst)
    }

    pub fn enter_manual_mode(&self) {
        if !self.manual_mode.swap(true, Ordering::SeqCst) {
            tracing::info!("entered manual mode");
            self.event_bus
                .publish(OrchestrationEvent::ManualModeChanged { enabled: true });
        }
    }

    pub fn exit_manual_mode(&self) {
        if self.manual_mode.swap(false, Ordering::SeqCst) {
            tracing::info!("left manual mode");
            self.event_bus
                .publish(OrchestrationEvent::ManualModeChanged { enabled: false });
        }
    }

    pub fn is_manual_mode(&self) -> bool {
        self.manual_mode.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------------

    pub fn get_execution_stats(&self) -> ExecutionStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_stats(&self, update: impl FnOnce(&mut ExecutionStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut stats);
    }

    pub(crate) fn record_step_completed(&self) {
        self.update_stats(|stats| {
            stats.total_steps += 1;
            stats.completed_steps += 1;
        });
    }

    pub(crate) fn record_step_failed(&self) {
        self.update_stats(|stats| {
            stats.total_steps += 1;
            stats.failed_steps += 1;
        });
    }

    // -----------------------------------------------------------------------
    // Checkpoints
    // -----------------------------------------------------------------------

    /// Record a checkpoint and count it in the statistics.
    pub fn create_checkpoint(
        &self,
        step_id: &str,
        step_index: usize,
        kind: CheckpointKind,
        context: &ContextState,
        data: &Value,
        description: impl Into<String>,
    ) -> Uuid {
        let id = self
            .checkpoints
            .create_checkpoint(step_id, step_index, kind, context, data, description);
        self.update_stats(|stats| stats.total_checkpoints += 1);

        self.event_bus.publish(OrchestrationEvent::CheckpointCreated {
            checkpoint_id: id,
            step_id: step_id.to_string(),
            step_index,
            kind,
        });

        id
    }

    pub fn restore_checkpoint(&self, id: Uuid) -> Option<RestoredCheckpoint> {
        self.checkpoints.restore_checkpoint(id)
    }
}

impl Default for InterventionManager {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for InterventionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterventionManager")
            .field("manual_mode", &self.is_manual_mode())
            .field("has_interface", &self.has_interface())
            .field("checkpoints", &self.checkpoints.len())
            .field("stats", &self.get_execution_stats())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedInterface;
    use serde_json::json;

    fn state() -> InterventionState {
        InterventionState {
            current_step: "validate-order".to_string(),
            step_index: 0,
            error: None,
            available_checkpoints: Vec::new(),
        }
    }

    #[test]
    fn test_one_shot_request_is_consumed() {
        let manager = InterventionManager::with_defaults();
        assert!(!manager.take_intervention_request());

        manager.request_intervention();
        assert!(manager.take_intervention_request());
        assert!(!manager.take_intervention_request());
    }

    #[test]
    fn test_manual_mode_toggles() {
        let manager = InterventionManager::with_defaults();
        assert!(!manager.is_manual_mode());
        manager.enter_manual_mode();
        assert!(manager.is_manual_mode());
        manager.exit_manual_mode();
        assert!(!manager.is_manual_mode());
    }

    #[test]
    fn test_config_can_start_in_manual_mode() {
        let config = EngineConfig {
            start_in_manual_mode: true,
            ..EngineConfig::default()
        };
        let manager = InterventionManager::new(&config, EventBus::new(8));
        assert!(manager.is_manual_mode());

        manager.exit_manual_mode();
        manager.reset();
        assert!(manager.is_manual_mode());
    }

    #[test]
    fn test_create_checkpoint_counts_in_stats() {
        let manager = InterventionManager::with_defaults();
        let ctx = ContextState::new("operations");
        let id = manager.create_checkpoint(
            "validate-order",
            0,
            CheckpointKind::Before,
            &ctx,
            &json!({ "orderId": "ORD-001" }),
            "before validate-order",
        );

        assert_eq!(manager.get_execution_stats().total_checkpoints, 1);
        let restored = manager.restore_checkpoint(id).unwrap();
        assert_eq!(restored.data["orderId"], json!("ORD-001"));
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let manager = InterventionManager::with_defaults();
        manager.set_interface(ScriptedInterface::new(vec![]));
        manager.enter_manual_mode();
        manager.request_intervention();
        manager.record_step_failed();
        manager.create_checkpoint(
            "a",
            0,
            CheckpointKind::Error,
            &ContextState::default(),
            &json!(null),
            "error in a",
        );

        manager.reset();

        assert!(!manager.has_interface());
        assert!(!manager.is_manual_mode());
        assert!(!manager.take_intervention_request());
        assert_eq!(manager.get_execution_stats(), ExecutionStats::default());
        assert!(manager.checkpoints().is_empty());
    }

    #[tokio::test]
    async fn test_menu_without_interface_fails_fast() {
        let manager = InterventionManager::with_defaults();
        let err = manager.show_intervention_menu(&state()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InterventionInterfaceMissing));
    }

    #[tokio::test]
    async fn test_menu_delegates_to_interface_and_publishes_events() {
        let manager = InterventionManager::with_defaults();
        let mut events = manager.event_bus().subscribe();
        manager.set_interface(ScriptedInterface::new(vec![InterventionAction::Next]));

        let action = manager.show_intervention_menu(&state()).await.unwrap();
        assert_eq!(action, InterventionAction::Next);

        assert!(matches!(
            events.recv().await.unwrap(),
            OrchestrationEvent::InterventionRequested { .. }
        ));
        match events.recv().await.unwrap() {
            OrchestrationEvent::InterventionResolved { action, .. } => assert_eq!(action, "next"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_global_returns_same_instance() {
        let a = InterventionManager::global();
        let b = InterventionManager::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
