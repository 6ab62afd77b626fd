//! Observability setup for BUSY: structured logging and optional
//! OpenTelemetry span export.

pub mod tracing_setup;

pub use tracing_setup::{
    TracingError, TracingOptions, default_filter, init_tracing, shutdown_tracing,
};
