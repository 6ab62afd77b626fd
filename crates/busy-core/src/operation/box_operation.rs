//! BoxOperation -- object-safe dynamic dispatch wrapper for `Operation`.
//!
//! 1. `OperationDyn` is an object-safe mirror of `Operation` with boxed futures
//! 2. Blanket-impl `OperationDyn` for all `T: Operation`
//! 3. `BoxOperation` wraps `Arc<dyn OperationDyn>` and delegates
//!
//! The `Arc` makes `BoxOperation` cheap to clone, which the capability
//! registries of child and spawned contexts rely on.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use busy_types::error::OperationError;
use busy_types::operation::{DataSchema, Input, Output};

use super::Operation;

/// Object-safe version of [`Operation`].
pub trait OperationDyn: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> &DataSchema;

    fn output_schema(&self) -> &DataSchema;

    fn execute_boxed(
        &self,
        input: Input,
    ) -> Pin<Box<dyn Future<Output = Result<Output, OperationError>> + Send + '_>>;
}

impl<T: Operation> OperationDyn for T {
    fn name(&self) -> &str {
        Operation::name(self)
    }

    fn description(&self) -> &str {
        Operation::description(self)
    }

    fn input_schema(&self) -> &DataSchema {
        Operation::input_schema(self)
    }

    fn output_schema(&self) -> &DataSchema {
        Operation::output_schema(self)
    }

    fn execute_boxed(
        &self,
        input: Input,
    ) -> Pin<Box<dyn Future<Output = Result<Output, OperationError>> + Send + '_>> {
        Box::pin(self.execute(input))
    }
}

/// Type-erased, shareable operation.
#[derive(Clone)]
pub struct BoxOperation {
    inner: Arc<dyn OperationDyn>,
}

impl BoxOperation {
    pub fn new<T: Operation + 'static>(operation: T) -> Self {
        Self {
            inner: Arc::new(operation),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn description(&self) -> &str {
        self.inner.description()
    }

    pub fn input_schema(&self) -> &DataSchema {
        self.inner.input_schema()
    }

    pub fn output_schema(&self) -> &DataSchema {
        self.inner.output_schema()
    }

    pub async fn execute(&self, input: Input) -> Result<Output, OperationError> {
        self.inner.execute_boxed(input).await
    }

    /// Whether two handles point at the same operation instance.
    pub fn ptr_eq(&self, other: &BoxOperation) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for BoxOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxOperation")
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper {
        schema: DataSchema,
    }

    impl Operation for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase the `text` field"
        }

        fn input_schema(&self) -> &DataSchema {
            &self.schema
        }

        fn output_schema(&self) -> &DataSchema {
            &self.schema
        }

        async fn execute(&self, input: Input) -> Result<Output, OperationError> {
            let text = input
                .data()
                .get("text")
                .and_then(|v| v.as_str())
                .ok_or_else(|| OperationError::MissingField("text".to_string()))?;
            Ok(Output::new(
                json!({ "text": text.to_uppercase() }),
                self.schema.clone(),
            ))
        }
    }

    fn upper() -> BoxOperation {
        BoxOperation::new(Upper {
            schema: DataSchema::any(),
        })
    }

    #[tokio::test]
    async fn test_boxed_operation_delegates_execute() {
        let op = upper();
        let output = op.execute(Input::untyped(json!({ "text": "abc" }))).await.unwrap();
        assert_eq!(output.data()["text"], json!("ABC"));
    }

    #[tokio::test]
    async fn test_boxed_operation_propagates_failure() {
        let op = upper();
        let err = op.execute(Input::untyped(json!({}))).await.unwrap_err();
        assert!(matches!(err, OperationError::MissingField(field) if field == "text"));
    }

    #[test]
    fn test_clones_share_the_instance() {
        let op = upper();
        let clone = op.clone();
        assert!(op.ptr_eq(&clone));
        assert_eq!(clone.name(), "upper");
        assert!(!op.ptr_eq(&upper()));
    }
}
