//! Schema-typed data envelopes passed between operations.
//!
//! An [`Input`] or [`Output`] pairs a JSON payload with the [`DataSchema`]
//! that describes it. Envelopes are immutable once constructed: edits produce
//! a new envelope (see [`Input::with_merged`]).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

// ---------------------------------------------------------------------------
// DataSchema
// ---------------------------------------------------------------------------

/// A JSON Schema document describing an operation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSchema(Value);

impl DataSchema {
    /// Wrap an existing JSON Schema document.
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    /// A schema that accepts any payload.
    pub fn any() -> Self {
        Self(json!({}))
    }

    /// An object schema requiring the given properties to be present.
    pub fn object_with_required(required: &[&str]) -> Self {
        Self(json!({
            "type": "object",
            "required": required,
        }))
    }

    /// Derive a schema from a Rust type.
    pub fn for_type<T: JsonSchema>() -> Self {
        let schema = schemars::schema_for!(T);
        Self(serde_json::to_value(schema).unwrap_or_else(|_| json!({})))
    }

    /// The raw schema document.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Validate a payload against this schema.
    ///
    /// A schema that fails to compile is reported as a validation error
    /// rather than a panic.
    pub fn validate(&self, data: &Value) -> ValidationReport {
        let validator = match jsonschema::validator_for(&self.0) {
            Ok(validator) => validator,
            Err(err) => {
                return ValidationReport::invalid(vec![format!("invalid schema: {err}")]);
            }
        };

        if validator.is_valid(data) {
            return ValidationReport::valid();
        }

        let errors = validator
            .iter_errors(data)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        ValidationReport::invalid(errors)
    }
}

impl Default for DataSchema {
    fn default() -> Self {
        Self::any()
    }
}

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

/// Outcome of validating a payload against its schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Data handed to an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    data: Value,
    schema: DataSchema,
}

impl Input {
    pub fn new(data: Value, schema: DataSchema) -> Self {
        Self { data, schema }
    }

    /// An input accepted by any schema.
    pub fn untyped(data: Value) -> Self {
        Self::new(data, DataSchema::any())
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn schema(&self) -> &DataSchema {
        &self.schema
    }

    pub fn validate(&self) -> ValidationReport {
        self.schema.validate(&self.data)
    }

    /// Serialize the envelope (`{"data": .., "schema": ..}`) to a JSON string.
    pub fn serialize(&self) -> String {
        envelope_string(&self.data, &self.schema)
    }

    /// Return a new input with `patch` shallow-merged into the payload.
    ///
    /// Keys in `patch` overwrite existing keys. A payload that is not a JSON
    /// object is replaced by the patch.
    pub fn with_merged(&self, patch: &Map<String, Value>) -> Self {
        let data = match &self.data {
            Value::Object(existing) => {
                let mut merged = existing.clone();
                for (key, value) in patch {
                    merged.insert(key.clone(), value.clone());
                }
                Value::Object(merged)
            }
            _ => Value::Object(patch.clone()),
        };
        Self::new(data, self.schema.clone())
    }
}

/// Data produced by an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    data: Value,
    schema: DataSchema,
}

impl Output {
    pub fn new(data: Value, schema: DataSchema) -> Self {
        Self { data, schema }
    }

    /// Forward an input's payload unchanged (used when a step is skipped).
    pub fn passthrough(input: &Input) -> Self {
        Self::new(input.data.clone(), input.schema.clone())
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn schema(&self) -> &DataSchema {
        &self.schema
    }

    pub fn validate(&self) -> ValidationReport {
        self.schema.validate(&self.data)
    }

    /// Serialize the envelope (`{"data": .., "schema": ..}`) to a JSON string.
    pub fn serialize(&self) -> String {
        envelope_string(&self.data, &self.schema)
    }

    /// Feed this output forward as the next operation's input.
    pub fn into_input(self) -> Input {
        Input::new(self.data, self.schema)
    }
}

fn envelope_string(data: &Value, schema: &DataSchema) -> String {
    json!({ "data": data, "schema": schema }).to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
