//! Adapter implementations for provisioning ports.

pub mod http;
pub mod memory;
pub mod postgres;

mod tracing_sink;

pub use tracing_sink::TracingEventSink;
