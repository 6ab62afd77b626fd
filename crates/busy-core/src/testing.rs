//! Test doubles for operations and intervention interfaces.
//!
//! Compiled for this crate's own tests and, behind the `test-support`
//! feature, for downstream crates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use busy_types::context::ContextState;
use busy_types::error::{InterventionError, OperationError};
use busy_types::intervention::{InterventionAction, InterventionState};
use busy_types::operation::{DataSchema, Input, Output};
use serde_json::{Value, json};

use crate::operation::Operation;
use crate::orchestration::InterventionInterface;

// ---------------------------------------------------------------------------
// CallCounter
// ---------------------------------------------------------------------------

/// Shared execution counter that outlives boxing of the operation.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

// ---------------------------------------------------------------------------
// ScriptedInterface
// ---------------------------------------------------------------------------

/// Answers intervention prompts from a queue of canned actions.
///
/// Every state shown and every status line is recorded. An exhausted queue
/// answers with `InterventionError::Closed`.
#[derive(Debug, Default)]
pub struct ScriptedInterface {
    actions: Mutex<VecDeque<InterventionAction>>,
    states: Mutex<Vec<InterventionState>>,
    statuses: Mutex<Vec<String>>,
}

impl ScriptedInterface {
    pub fn new(actions: Vec<InterventionAction>) -> Self {
        Self {
            actions: Mutex::new(actions.into()),
            ..Self::default()
        }
    }

    /// Queue another action.
    pub fn push(&self, action: InterventionAction) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(action);
    }

    /// States shown so far, in order.
    pub fn states(&self) -> Vec<InterventionState> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Actions not yet consumed.
    pub fn remaining(&self) -> usize {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl InterventionInterface for ScriptedInterface {
    async fn show_intervention_menu(
        &self,
        state: &InterventionState,
    ) -> Result<InterventionAction, InterventionError> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(state.clone());
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or(InterventionError::Closed)
    }

    async fn edit_context_state(
        &self,
        context: ContextState,
        data: Value,
    ) -> Result<(ContextState, Value), InterventionError> {
        Ok((context, data))
    }

    fn show_status(&self, message: &str) {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Returns its input with `echoed_by` set to its name.
#[derive(Debug)]
pub struct EchoOperation {
    name: String,
    schema: DataSchema,
    calls: CallCounter,
}

impl EchoOperation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: DataSchema::any(),
            calls: CallCounter::default(),
        }
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl Operation for EchoOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Echo the input"
    }

    fn input_schema(&self) -> &DataSchema {
        &self.schema
    }

    fn output_schema(&self) -> &DataSchema {
        &self.schema
    }

    async fn execute(&self, input: Input) -> Result<Output, OperationError> {
        self.calls.bump();
        let mut data = match input.data() {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        data.insert("echoed_by".to_string(), json!(self.name));
        Ok(Output::new(Value::Object(data), self.schema.clone()))
    }
}

/// Always fails with `OperationError::Failed`.
#[derive(Debug)]
pub struct FailingOperation {
    name: String,
    schema: DataSchema,
    calls: CallCounter,
}

impl FailingOperation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: DataSchema::any(),
            calls: CallCounter::default(),
        }
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl Operation for FailingOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn input_schema(&self) -> &DataSchema {
        &self.schema
    }

    fn output_schema(&self) -> &DataSchema {
        &self.schema
    }

    async fn execute(&self, _input: Input) -> Result<Output, OperationError> {
        let attempt = self.calls.bump();
        Err(OperationError::Failed(format!("{} failed on attempt {attempt}", self.name)))
    }
}

/// Fails a fixed number of times, then echoes its input.
#[derive(Debug)]
pub struct FlakyOperation {
    name: String,
    failures: usize,
    schema: DataSchema,
    calls: CallCounter,
}

impl FlakyOperation {
    pub fn new(name: impl Into<String>, failures: usize) -> Self {
        Self {
            name: name.into(),
            failures,
            schema: DataSchema::any(),
            calls: CallCounter::default(),
        }
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl Operation for FlakyOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Fails a fixed number of times before succeeding"
    }

    fn input_schema(&self) -> &DataSchema {
        &self.schema
    }

    fn output_schema(&self) -> &DataSchema {
        &self.schema
    }

    async fn execute(&self, input: Input) -> Result<Output, OperationError> {
        let attempt = self.calls.bump();
        if attempt <= self.failures {
            return Err(OperationError::Failed(format!(
                "{} failed on attempt {attempt}",
                self.name
            )));
        }
        let mut data = input.data().clone();
        if let Value::Object(map) = &mut data {
            map.insert("attempts".to_string(), json!(attempt));
        }
        Ok(Output::new(data, self.schema.clone()))
    }
}
