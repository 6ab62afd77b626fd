//! Sample order-processing operations.
//!
//! A two-step playbook (`validate-order` -> `process-order`) used by the
//! `busy` CLI demo and the orchestration tests. Both operations check their
//! input against their schema before doing any work and fail with an
//! `OperationError` instead of producing partial output.

use busy_types::error::OperationError;
use busy_types::operation::{DataSchema, Input, Output};
use serde_json::{Map, Value, json};

use super::{BoxOperation, Operation};

pub const VALIDATE_ORDER: &str = "validate-order";
pub const PROCESS_ORDER: &str = "process-order";

/// Checks that an order reference is present and marks it validated.
pub struct ValidateOrder {
    input_schema: DataSchema,
    output_schema: DataSchema,
}

impl ValidateOrder {
    pub fn new() -> Self {
        Self {
            input_schema: DataSchema::new(json!({
                "type": "object",
                "required": ["orderId"],
                "properties": {
                    "orderId": { "type": "string", "minLength": 1 }
                }
            })),
            output_schema: DataSchema::new(json!({
                "type": "object",
                "required": ["orderId", "validated"],
                "properties": {
                    "orderId": { "type": "string" },
                    "validated": { "type": "boolean" }
                }
            })),
        }
    }
}

impl Default for ValidateOrder {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for ValidateOrder {
    fn name(&self) -> &str {
        VALIDATE_ORDER
    }

    fn description(&self) -> &str {
        "Validate that an order reference is well formed"
    }

    fn input_schema(&self) -> &DataSchema {
        &self.input_schema
    }

    fn output_schema(&self) -> &DataSchema {
        &self.output_schema
    }

    async fn execute(&self, input: Input) -> Result<Output, OperationError> {
        let fields = checked_fields(&input, &self.input_schema, "orderId")?;

        let mut data = fields;
        data.insert("validated".to_string(), Value::Bool(true));
        tracing::debug!(order_id = ?data.get("orderId"), "order validated");

        Ok(Output::new(Value::Object(data), self.output_schema.clone()))
    }
}

/// Processes a previously validated order.
pub struct ProcessOrder {
    input_schema: DataSchema,
    output_schema: DataSchema,
}

impl ProcessOrder {
    pub fn new() -> Self {
        Self {
            input_schema: DataSchema::new(json!({
                "type": "object",
                "required": ["orderId", "validated"],
                "properties": {
                    "orderId": { "type": "string", "minLength": 1 },
                    "validated": { "const": true }
                }
            })),
            output_schema: DataSchema::new(json!({
                "type": "object",
                "required": ["orderId", "validated", "processed"],
                "properties": {
                    "processed": { "type": "boolean" }
                }
            })),
        }
    }
}

impl Default for ProcessOrder {
    fn default() -> Self {
        Self::new()
    }
}

impl Operation for ProcessOrder {
    fn name(&self) -> &str {
        PROCESS_ORDER
    }

    fn description(&self) -> &str {
        "Process a validated order"
    }

    fn input_schema(&self) -> &DataSchema {
        &self.input_schema
    }

    fn output_schema(&self) -> &DataSchema {
        &self.output_schema
    }

    async fn execute(&self, input: Input) -> Result<Output, OperationError> {
        let mut data = checked_fields(&input, &self.input_schema, "orderId")?;
        data.insert("processed".to_string(), Value::Bool(true));
        tracing::debug!(order_id = ?data.get("orderId"), "order processed");

        Ok(Output::new(Value::Object(data), self.output_schema.clone()))
    }
}

/// The sample playbook in execution order.
pub fn order_operations() -> Vec<BoxOperation> {
    vec![
        BoxOperation::new(ValidateOrder::new()),
        BoxOperation::new(ProcessOrder::new()),
    ]
}

/// Validate `input` against `schema` and return its object fields.
///
/// A missing `key_field` is reported as `MissingField` so the intervention
/// prompt names the exact problem.
fn checked_fields(
    input: &Input,
    schema: &DataSchema,
    key_field: &str,
) -> Result<Map<String, Value>, OperationError> {
    let fields = match input.data() {
        Value::Object(map) => map.clone(),
        _ => return Err(OperationError::MissingField(key_field.to_string())),
    };
    if !fields.contains_key(key_field) {
        return Err(OperationError::MissingField(key_field.to_string()));
    }

    let report = schema.validate(input.data());
    if !report.is_valid {
        return Err(OperationError::InvalidInput(report.errors));
    }
    Ok(fields)
}
