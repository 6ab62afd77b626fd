//! The operation contract and its type-erased form.
//!
//! - `Operation` -- the unit-of-work trait (native async fn in traits)
//! - `BoxOperation` -- clonable dynamic-dispatch wrapper for registries
//! - `order` -- sample order-processing operations

pub mod box_operation;
pub mod order;

use std::future::Future;

use busy_types::error::OperationError;
use busy_types::operation::{DataSchema, Input, Output};

pub use box_operation::BoxOperation;

/// A named, schema-typed unit of work.
///
/// Implementations are stateless from the orchestrator's point of view: the
/// same input may be executed any number of times (retry, rewind). A failure
/// is returned as an `OperationError`, never as a panic.
///
/// Uses RPITIT (return-position `impl Trait` in traits) for `execute`; wrap in
/// [`BoxOperation`] for dynamic dispatch.
pub trait Operation: Send + Sync {
    /// Name, unique within an operation set.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> &DataSchema;

    fn output_schema(&self) -> &DataSchema;

    /// Run the operation.
    fn execute(
        &self,
        input: Input,
    ) -> impl Future<Output = Result<Output, OperationError>> + Send;
}
