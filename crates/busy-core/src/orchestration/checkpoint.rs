//! In-memory checkpoint manager for step-level execution snapshots.
//!
//! Every step transition (before -> after, or before -> error) records an
//! immutable [`Checkpoint`] holding a copy of the context state and the data
//! in flight at that moment. The store is append-only; the only way to drop
//! entries is [`CheckpointManager::clear`].
//!
//! Nothing here fails: "not found" is expressed as `None`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use busy_types::checkpoint::{Checkpoint, CheckpointKind, RestoredCheckpoint};
use busy_types::context::ContextState;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// CheckpointManager
// ---------------------------------------------------------------------------

/// Append-only snapshot store.
///
/// Entries are kept in creation order. Restores hand out owned copies, so a
/// caller mutating restored data can never reach the stored snapshot.
#[derive(Debug, Default)]
pub struct CheckpointManager {
    checkpoints: Mutex<Vec<Checkpoint>>,
}

impl CheckpointManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Vec<Checkpoint>> {
        self.checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Recording
    // -----------------------------------------------------------------------

    /// Record a snapshot and return its id.
    pub fn create_checkpoint(
        &self,
        step_id: &str,
        step_index: usize,
        kind: CheckpointKind,
        context: &ContextState,
        data: &Value,
        description: impl Into<String>,
    ) -> Uuid {
        let id = Uuid::now_v7();
        let checkpoint = Checkpoint {
            id,
            step_id: step_id.to_string(),
            step_index,
            kind,
            description: description.into(),
            context_state: context.clone(),
            current_data: data.clone(),
            timestamp: Utc::now(),
        };

        self.store().push(checkpoint);

        tracing::debug!(
            checkpoint_id = %id,
            step_id,
            step_index,
            kind = %kind,
            "created checkpoint"
        );

        id
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Copy the context and data of a checkpoint.
    pub fn restore_checkpoint(&self, id: Uuid) -> Option<RestoredCheckpoint> {
        let store = self.store();
        let checkpoint = store.iter().find(|c| c.id == id)?;

        tracing::debug!(
            checkpoint_id = %id,
            step_id = checkpoint.step_id.as_str(),
            "restored checkpoint"
        );

        Some(RestoredCheckpoint {
            context: checkpoint.context_state.clone(),
            data: checkpoint.current_data.clone(),
        })
    }

    pub fn get_checkpoint(&self, id: Uuid) -> Option<Checkpoint> {
        self.store().iter().find(|c| c.id == id).cloned()
    }

    /// The latest checkpoint of the closest earlier step.
    ///
    /// Among checkpoints with `step_index < before_step_index`, picks the
    /// greatest `step_index`; ties go to the most recently inserted entry.
    pub fn find_previous_checkpoint(&self, before_step_index: usize) -> Option<Checkpoint> {
        let store = self.store();
        let mut best: Option<&Checkpoint> = None;

        // Later entries win ties because they are visited last with `>=`.
        for checkpoint in store.iter().filter(|c| c.step_index < before_step_index) {
            match best {
                Some(current) if checkpoint.step_index < current.step_index => {}
                _ => best = Some(checkpoint),
            }
        }

        best.cloned()
    }

    /// All checkpoints in creation order.
    pub fn get_all_checkpoints(&self) -> Vec<Checkpoint> {
        self.store().clone()
    }

    pub fn len(&self) -> usize {
        self.store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store().is_empty()
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    pub fn clear(&self) {
        let mut store = self.store();
        let dropped = store.len();
        store.clear();
        tracing::debug!(dropped, "cleared checkpoints");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use serde_json::json;

    fn ctx() -> ContextState {
        let mut state = ContextState::new("operations");
        state
            .shared_state
            .insert("customer".to_string(), json!({ "tier": "gold" }));
        state
    }

    fn record(manager: &CheckpointManager, step_index: usize) -> Uuid {
        manager.create_checkpoint(
            &format!("step-{step_index}"),
            step_index,
            CheckpointKind::Before,
            &ctx(),
            &json!({ "index": step_index }),
            format!("before step-{step_index}"),
        )
    }

    #[test]
    fn test_checkpoint_ids_are_unique() {
        let manager = CheckpointManager::new();
        let ids: HashSet<Uuid> = (0..200).map(|i| record(&manager, i % 3)).collect();
        assert_eq!(ids.len(), 200);
    }

    #[test]
    fn test_restore_returns_deep_equal_copy() {
        let manager = CheckpointManager::new();
        let data = json!({ "orderId": "ORD-001", "items": [1, 2] });
        let id = manager.create_checkpoint(
            "validate-order",
            0,
            CheckpointKind::Before,
            &ctx(),
            &data,
            "before validate-order",
        );

        let mut restored = manager.restore_checkpoint(id).unwrap();
        assert_eq!(restored.context, ctx());
        assert_eq!(restored.data, data);

        restored.data["items"] = json!([]);
        restored
            .context
            .shared_state
            .insert("customer".to_string(), json!(null));

        let again = manager.restore_checkpoint(id).unwrap();
        assert_eq!(again.data, data);
        assert_eq!(again.context, ctx());
        assert_eq!(manager.get_checkpoint(id).unwrap().current_data, data);
    }

    #[test]
    fn test_restore_unknown_id_is_none() {
        let manager = CheckpointManager::new();
        record(&manager, 0);
        assert!(manager.restore_checkpoint(Uuid::now_v7()).is_none());
        assert!(manager.get_checkpoint(Uuid::nil()).is_none());
    }

    #[test]
    fn test_find_previous_picks_greatest_lower_index() {
        let manager = CheckpointManager::new();
        record(&manager, 0);
        record(&manager, 1);
        record(&manager, 2);

        let previous = manager.find_previous_checkpoint(2).unwrap();
        assert_eq!(previous.step_index, 1);

        assert!(manager.find_previous_checkpoint(0).is_none());
    }

    #[test]
    fn test_find_previous_is_none_at_or_below_lowest_index() {
        let manager = CheckpointManager::new();
        record(&manager, 2);
        record(&manager, 3);

        assert!(manager.find_previous_checkpoint(2).is_none());
        assert!(manager.find_previous_checkpoint(1).is_none());
        assert_eq!(manager.find_previous_checkpoint(3).unwrap().step_index, 2);
    }

    #[test]
    fn test_find_previous_breaks_ties_by_latest_insertion() {
        let manager = CheckpointManager::new();
        record(&manager, 0);
        let first_at_one = record(&manager, 1);
        let second_at_one = record(&manager, 1);
        record(&manager, 3);

        let previous = manager.find_previous_checkpoint(3).unwrap();
        assert_eq!(previous.id, second_at_one);
        assert_ne!(previous.id, first_at_one);
    }

    #[test]
    fn test_get_all_preserves_creation_order() {
        let manager = CheckpointManager::new();
        let ids: Vec<Uuid> = [2, 0, 1].iter().map(|i| record(&manager, *i)).collect();
        let all: Vec<Uuid> = manager.get_all_checkpoints().iter().map(|c| c.id).collect();
        assert_eq!(all, ids);
    }

    #[test]
    fn test_clear_empties_store() {
        let manager = CheckpointManager::new();
        record(&manager, 0);
        record(&manager, 1);

        manager.clear();
        assert!(manager.get_all_checkpoints().is_empty());
        assert!(manager.is_empty());

        let id = record(&manager, 5);
        let all = manager.get_all_checkpoints();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
    }
}
