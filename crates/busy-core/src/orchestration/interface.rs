//! The intervention boundary implemented by embedders.
//!
//! A terminal prompt, a web UI or a test double implements
//! [`InterventionInterface`]; the manager holds it as a
//! [`BoxInterventionInterface`] so it can be swapped at runtime.
//!
//! Calls are awaited without a timeout. An interface that never answers
//! stalls the run that asked.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use busy_types::context::ContextState;
use busy_types::error::InterventionError;
use busy_types::intervention::{InterventionAction, InterventionState};
use serde_json::Value;

/// Presents decisions and edits to a human or automated policy.
pub trait InterventionInterface: Send + Sync {
    /// Ask how to proceed with a paused or failed step.
    fn show_intervention_menu(
        &self,
        state: &InterventionState,
    ) -> impl Future<Output = Result<InterventionAction, InterventionError>> + Send;

    /// Let the user edit a context/data pair and return the edited copy.
    fn edit_context_state(
        &self,
        context: ContextState,
        data: Value,
    ) -> impl Future<Output = Result<(ContextState, Value), InterventionError>> + Send;

    /// Display a one-line status message.
    fn show_status(&self, message: &str);
}

/// Object-safe version of [`InterventionInterface`] with boxed futures.
pub trait InterventionInterfaceDyn: Send + Sync {
    fn show_intervention_menu_boxed<'a>(
        &'a self,
        state: &'a InterventionState,
    ) -> Pin<Box<dyn Future<Output = Result<InterventionAction, InterventionError>> + Send + 'a>>;

    fn edit_context_state_boxed(
        &self,
        context: ContextState,
        data: Value,
    ) -> Pin<Box<dyn Future<Output = Result<(ContextState, Value), InterventionError>> + Send + '_>>;

    fn show_status(&self, message: &str);
}

impl<T: InterventionInterface> InterventionInterfaceDyn for T {
    fn show_intervention_menu_boxed<'a>(
        &'a self,
        state: &'a InterventionState,
    ) -> Pin<Box<dyn Future<Output = Result<InterventionAction, InterventionError>> + Send + 'a>>
    {
        Box::pin(self.show_intervention_menu(state))
    }

    fn edit_context_state_boxed(
        &self,
        context: ContextState,
        data: Value,
    ) -> Pin<Box<dyn Future<Output = Result<(ContextState, Value), InterventionError>> + Send + '_>>
    {
        Box::pin(self.edit_context_state(context, data))
    }

    fn show_status(&self, message: &str) {
        InterventionInterface::show_status(self, message);
    }
}

/// Type-erased, shareable intervention interface.
#[derive(Clone)]
pub struct BoxInterventionInterface {
    inner: Arc<dyn InterventionInterfaceDyn>,
}

impl BoxInterventionInterface {
    pub fn new<T: InterventionInterface + 'static>(interface: T) -> Self {
        Self {
            inner: Arc::new(interface),
        }
    }

    /// Wrap an interface the caller keeps a handle to (test doubles).
    pub fn from_arc<T: InterventionInterface + 'static>(interface: Arc<T>) -> Self {
        Self { inner: interface }
    }

    pub async fn show_intervention_menu(
        &self,
        state: &InterventionState,
    ) -> Result<InterventionAction, InterventionError> {
        self.inner.show_intervention_menu_boxed(state).await
    }

    pub async fn edit_context_state(
        &self,
        context: ContextState,
        data: Value,
    ) -> Result<(ContextState, Value), InterventionError> {
        self.inner.edit_context_state_boxed(context, data).await
    }

    pub fn show_status(&self, message: &str) {
        self.inner.show_status(message);
    }
}

impl std::fmt::Debug for BoxInterventionInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxInterventionInterface").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Stamps edited data and moves the context to a review layer.
    #[derive(Default)]
    struct ReviewEditor {
        statuses: Mutex<Vec<String>>,
    }

    impl InterventionInterface for ReviewEditor {
        async fn show_intervention_menu(
            &self,
            _state: &InterventionState,
        ) -> Result<InterventionAction, InterventionError> {
            Ok(InterventionAction::ResumeAuto)
        }

        async fn edit_context_state(
            &self,
            mut context: ContextState,
            mut data: Value,
        ) -> Result<(ContextState, Value), InterventionError> {
            context.current_layer = "review".to_string();
            data["reviewed"] = json!(true);
            Ok((context, data))
        }

        fn show_status(&self, message: &str) {
            self.statuses.lock().unwrap().push(message.to_string());
        }
    }

    #[tokio::test]
    async fn test_boxed_interface_forwards_edits() {
        let editor = Arc::new(ReviewEditor::default());
        let boxed = BoxInterventionInterface::from_arc(Arc::clone(&editor));

        let (context, data) = boxed
            .edit_context_state(ContextState::new("operations"), json!({ "orderId": "ORD-001" }))
            .await
            .unwrap();
        assert_eq!(context.current_layer, "review");
        assert_eq!(data, json!({ "orderId": "ORD-001", "reviewed": true }));

        boxed.show_status("edited");
        assert_eq!(*editor.statuses.lock().unwrap(), vec!["edited".to_string()]);
    }
}
