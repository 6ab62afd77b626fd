//! Non-interactive intervention policy for `busy run --policy auto`.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use console::style;
use serde_json::Value;

use busy_core::orchestration::InterventionInterface;
use busy_types::context::ContextState;
use busy_types::error::InterventionError;
use busy_types::intervention::{InterventionAction, InterventionState};

use super::FailureAction;

/// Answers interventions without asking anyone.
///
/// Manual pauses are resumed. Failures are answered with the configured
/// [`FailureAction`]; `retry` falls back to `abort` once a step has used up
/// its retries.
#[derive(Debug)]
pub struct AutoPolicy {
    on_failure: FailureAction,
    max_retries: u32,
    quiet: bool,
    retries: Mutex<HashMap<usize, u32>>,
}

impl AutoPolicy {
    pub fn new(on_failure: FailureAction, max_retries: u32, quiet: bool) -> Self {
        Self {
            on_failure,
            max_retries,
            quiet,
            retries: Mutex::new(HashMap::new()),
        }
    }

    fn decide(&self, state: &InterventionState) -> InterventionAction {
        if !state.is_failure() {
            return InterventionAction::ResumeAuto;
        }

        match self.on_failure {
            FailureAction::Skip => InterventionAction::Next,
            FailureAction::Abort => InterventionAction::Abort,
            FailureAction::Retry => {
                let mut retries = self.retries.lock().unwrap_or_else(PoisonError::into_inner);
                let used = retries.entry(state.step_index).or_insert(0);
                if *used < self.max_retries {
                    *used += 1;
                    InterventionAction::Retry
                } else {
                    tracing::warn!(
                        step = state.current_step.as_str(),
                        retries = *used,
                        "retries exhausted"
                    );
                    InterventionAction::Abort
                }
            }
        }
    }
}

impl InterventionInterface for AutoPolicy {
    async fn show_intervention_menu(
        &self,
        state: &InterventionState,
    ) -> Result<InterventionAction, InterventionError> {
        let action = self.decide(state);
        if !self.quiet {
            if let Some(error) = &state.error {
                eprintln!(
                    "  {} {} failed: {}",
                    style("!").red().bold(),
                    style(&state.current_step).cyan(),
                    error
                );
            }
            eprintln!(
                "  {} auto decision for {}: {}",
                style("→").dim(),
                style(&state.current_step).cyan(),
                style(action.label()).yellow()
            );
        }
        Ok(action)
    }

    async fn edit_context_state(
        &self,
        context: ContextState,
        data: Value,
    ) -> Result<(ContextState, Value), InterventionError> {
        Ok((context, data))
    }

    fn show_status(&self, message: &str) {
        tracing::info!(message, "status");
        if !self.quiet {
            eprintln!("  {} {message}", style("i").dim());
        }
    }
}
