//! Step orchestrator: runs one operation under checkpointing and intervention.
//!
//! `OperationOrchestrator::execute_operation_with_intervention` is a small
//! state machine around a single step:
//!
//! 1. record a `before` checkpoint;
//! 2. pause for a decision when manual mode is on or an intervention was
//!    requested;
//! 3. execute; success records an `after` checkpoint and resolves the
//!    successor, failure forces manual mode, records an `error` checkpoint and
//!    asks the interface how to recover;
//! 4. apply the decision (`retry`, `next`, `back`, `abort`, `edit_state`,
//!    `resume_auto`).
//!
//! Only `abort` escapes as an error. Navigation decisions (`next`, `back`) are
//! returned to the driving loop as a [`StepOutcome`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use busy_types::checkpoint::CheckpointKind;
use busy_types::context::ContextState;
use busy_types::error::InterventionError;
use busy_types::event::OrchestrationEvent;
use busy_types::intervention::{InterventionAction, InterventionState};
use busy_types::operation::{Input, Output};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::operation::BoxOperation;

use super::manager::InterventionManager;

// ---------------------------------------------------------------------------
// ProcessContext
// ---------------------------------------------------------------------------

/// The process a step belongs to.
///
/// Supplies the named operation set and the ordered name list used to
/// resolve a step's successor.
#[derive(Debug, Clone, Default)]
pub struct ProcessContext {
    pub process_name: String,
    pub operations: HashMap<String, BoxOperation>,
    pub operation_names: Vec<String>,
}

impl ProcessContext {
    /// Build a process from operations in playbook order.
    pub fn new(process_name: impl Into<String>, operations: Vec<BoxOperation>) -> Self {
        let mut process = Self {
            process_name: process_name.into(),
            ..Self::default()
        };
        for operation in operations {
            process.push(operation);
        }
        process
    }

    /// Append an operation; a repeated name replaces the earlier operation
    /// but keeps its position.
    pub fn push(&mut self, operation: BoxOperation) {
        let name = operation.name().to_string();
        if !self.operations.contains_key(&name) {
            self.operation_names.push(name.clone());
        }
        self.operations.insert(name, operation);
    }

    pub fn operation(&self, name: &str) -> Option<&BoxOperation> {
        self.operations.get(name)
    }

    /// The operation following `step_index`, if any.
    pub fn successor(&self, step_index: usize) -> Option<(usize, &str)> {
        let index = step_index + 1;
        self.operation_names
            .get(index)
            .map(|name| (index, name.as_str()))
    }
}

// ---------------------------------------------------------------------------
// StepOutcome
// ---------------------------------------------------------------------------

/// How a step was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResolution {
    /// The operation executed successfully.
    Completed,
    /// The operation was skipped by a `next` decision.
    Skipped,
    /// The run was rewound to a checkpoint.
    Rewound { checkpoint_id: Uuid },
}

/// Result of one orchestrated step, returned to the driving loop.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub should_continue: bool,
    /// Operation to run next; `None` at the end of the sequence.
    pub next_operation: Option<String>,
    pub next_operation_index: Option<usize>,
    /// Output of the step, or the data to feed the next step when skipped
    /// or rewound.
    pub output: Option<Output>,
    pub resolution: StepResolution,
    /// Context restored by a `back` decision.
    pub restored_context: Option<ContextState>,
}

impl StepOutcome {
    fn advance(
        process: &ProcessContext,
        step_index: usize,
        output: Output,
        resolution: StepResolution,
    ) -> Self {
        let successor = process.successor(step_index);
        Self {
            should_continue: successor.is_some() || resolution == StepResolution::Skipped,
            next_operation: successor.map(|(_, name)| name.to_string()),
            next_operation_index: successor.map(|(index, _)| index),
            output: Some(output),
            resolution,
            restored_context: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that stop a step.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The interface chose `abort`.
    #[error("Process aborted by user intervention")]
    Aborted,

    /// An intervention was needed but no interface is installed.
    #[error("no intervention interface installed")]
    InterventionInterfaceMissing,

    /// The interface failed to produce a decision.
    #[error("intervention interface error: {0}")]
    Interface(#[from] InterventionError),
}

// ---------------------------------------------------------------------------
// OperationOrchestrator
// ---------------------------------------------------------------------------

/// What the decision loop does after an action is applied.
enum Decision {
    /// Execute the operation with this input.
    Execute(Input),
    /// Start the step over from its `before` checkpoint.
    Restart,
    /// Ask again with the same state.
    Reprompt,
    /// Hand a navigation decision back to the caller.
    Finish(StepOutcome),
}

/// Runs single steps through checkpointing and intervention.
#[derive(Debug, Clone)]
pub struct OperationOrchestrator {
    manager: Arc<InterventionManager>,
}

impl OperationOrchestrator {
    pub fn new(manager: Arc<InterventionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<InterventionManager> {
        &self.manager
    }

    /// Execute `operation` as step `step_index` of `process`.
    ///
    /// Of the decisions, only `abort` produces an error
    /// (`OrchestratorError::Aborted`); a missing or failing interface is the
    /// other way out.
    pub async fn execute_operation_with_intervention(
        &self,
        operation: &BoxOperation,
        input: Input,
        step_index: usize,
        operation_name: &str,
        context: &ContextState,
        process: &ProcessContext,
    ) -> Result<StepOutcome, OrchestratorError> {
        let span = info_span!(
            "operation",
            process = process.process_name.as_str(),
            operation = operation_name,
            step_index,
        );

        self.run_step(operation, input, step_index, operation_name, context, process)
            .instrument(span)
            .await
    }

    async fn run_step(
        &self,
        operation: &BoxOperation,
        mut input: Input,
        step_index: usize,
        operation_name: &str,
        context: &ContextState,
        process: &ProcessContext,
    ) -> Result<StepOutcome, OrchestratorError> {
        'step: loop {
            self.manager.create_checkpoint(
                operation_name,
                step_index,
                CheckpointKind::Before,
                context,
                input.data(),
                format!("{}: before {operation_name}", process.process_name),
            );

            let requested = self.manager.take_intervention_request();
            let mut error: Option<String> = None;
            let mut pending = if requested || self.manager.is_manual_mode() {
                tracing::debug!(requested, "pausing before execution");
                Some(self.ask(operation_name, step_index, None).await?)
            } else {
                None
            };

            loop {
                if let Some(action) = pending.take() {
                    match self.apply(action, &input, step_index, operation_name, process)? {
                        Decision::Execute(next_input) => input = next_input,
                        Decision::Restart => continue 'step,
                        Decision::Reprompt => {
                            pending = Some(self.ask(operation_name, step_index, error.clone()).await?);
                            continue;
                        }
                        Decision::Finish(outcome) => return Ok(outcome),
                    }
                }

                self.manager.event_bus().publish(OrchestrationEvent::StepStarted {
                    process_name: process.process_name.clone(),
                    operation_name: operation_name.to_string(),
                    step_index,
                });

                let started = Instant::now();
                match operation.execute(input.clone()).await {
                    Ok(output) => {
                        return Ok(self.complete(
                            output,
                            started,
                            step_index,
                            operation_name,
                            context,
                            process,
                        ));
                    }
                    Err(err) => {
                        let message = err.to_string();
                        tracing::warn!(error = %message, "operation failed");

                        self.manager.record_step_failed();
                        self.manager.enter_manual_mode();
                        self.manager.create_checkpoint(
                            operation_name,
                            step_index,
                            CheckpointKind::Error,
                            context,
                            input.data(),
                            format!("{}: error in {operation_name}: {message}", process.process_name),
                        );
                        self.manager.event_bus().publish(OrchestrationEvent::StepFailed {
                            process_name: process.process_name.clone(),
                            operation_name: operation_name.to_string(),
                            step_index,
                            error: message.clone(),
                        });

                        error = Some(message);
                        pending = Some(self.ask(operation_name, step_index, error.clone()).await?);
                    }
                }
            }
        }
    }

    /// Build a fresh intervention state and wait for a decision.
    async fn ask(
        &self,
        operation_name: &str,
        step_index: usize,
        error: Option<String>,
    ) -> Result<InterventionAction, OrchestratorError> {
        let state = InterventionState {
            current_step: operation_name.to_string(),
            step_index,
            error,
            available_checkpoints: self.manager.checkpoints().get_all_checkpoints(),
        };
        self.manager.show_intervention_menu(&state).await
    }

    fn apply(
        &self,
        action: InterventionAction,
        input: &Input,
        step_index: usize,
        operation_name: &str,
        process: &ProcessContext,
    ) -> Result<Decision, OrchestratorError> {
        match action {
            InterventionAction::Retry => {
                tracing::info!("retrying step");
                Ok(Decision::Restart)
            }
            InterventionAction::Next => {
                tracing::info!("skipping step");
                self.manager.event_bus().publish(OrchestrationEvent::StepSkipped {
                    process_name: process.process_name.clone(),
                    operation_name: operation_name.to_string(),
                    step_index,
                });
                Ok(Decision::Finish(StepOutcome::advance(
                    process,
                    step_index,
                    Output::passthrough(input),
                    StepResolution::Skipped,
                )))
            }
            InterventionAction::Back { target_checkpoint } => {
                let (Some(checkpoint), Some(restored)) = (
                    self.manager.checkpoints().get_checkpoint(target_checkpoint),
                    self.manager.restore_checkpoint(target_checkpoint),
                ) else {
                    tracing::warn!(checkpoint_id = %target_checkpoint, "rewind target not found");
                    self.manager
                        .show_status(&format!("checkpoint {target_checkpoint} not found"));
                    return Ok(Decision::Reprompt);
                };

                tracing::info!(
                    checkpoint_id = %target_checkpoint,
                    target = checkpoint.step_id.as_str(),
                    target_index = checkpoint.step_index,
                    "rewinding"
                );
                self.manager.event_bus().publish(OrchestrationEvent::StepRewound {
                    process_name: process.process_name.clone(),
                    checkpoint_id: target_checkpoint,
                    target_operation: checkpoint.step_id.clone(),
                    target_index: checkpoint.step_index,
                });

                Ok(Decision::Finish(StepOutcome {
                    should_continue: true,
                    next_operation: Some(checkpoint.step_id),
                    next_operation_index: Some(checkpoint.step_index),
                    output: Some(Output::new(restored.data, input.schema().clone())),
                    resolution: StepResolution::Rewound {
                        checkpoint_id: target_checkpoint,
                    },
                    restored_context: Some(restored.context),
                }))
            }
            InterventionAction::Abort => {
                tracing::warn!("process aborted by intervention");
                self.manager.event_bus().publish(OrchestrationEvent::ProcessAborted {
                    process_name: process.process_name.clone(),
                    operation_name: operation_name.to_string(),
                    step_index,
                });
                Err(OrchestratorError::Aborted)
            }
            InterventionAction::EditState { modified_data } => {
                tracing::info!(fields = modified_data.len(), "executing with edited input");
                Ok(Decision::Execute(input.with_merged(&modified_data)))
            }
            InterventionAction::ResumeAuto => {
                self.manager.exit_manual_mode();
                Ok(Decision::Execute(input.clone()))
            }
        }
    }

    fn complete(
        &self,
        output: Output,
        started: Instant,
        step_index: usize,
        operation_name: &str,
        context: &ContextState,
        process: &ProcessContext,
    ) -> StepOutcome {
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.manager.create_checkpoint(
            operation_name,
            step_index,
            CheckpointKind::After,
            context,
            output.data(),
            format!("{}: after {operation_name}", process.process_name),
        );
        self.manager.record_step_completed();

        tracing::info!(duration_ms, "operation completed");
        self.manager.event_bus().publish(OrchestrationEvent::StepCompleted {
            process_name: process.process_name.clone(),
            operation_name: operation_name.to_string(),
            step_index,
            duration_ms,
        });

        StepOutcome::advance(process, step_index, output, StepResolution::Completed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
