//! The executor capability trait and the registry of platform adapters.

mod capability;
mod registry;

pub use capability::{
    ExecutionError, ExecutionErrorKind, Executor, ExecutorInvocation, ExecutorOutcome,
    MetricSample,
};
pub use registry::{CapabilityKey, ExecutorRegistry};
