//! The executor capability: the platform adapter that performs a node's
//! actual work.
//!
//! The core never knows how a platform runs a node; it only sees this trait
//! and the structured error it returns. Retryability travels on the error so
//! the node runtime can decide between `Retrying` and `Failed` without
//! platform knowledge.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::dsl::model::{ConfigMap, ResourceRequirements};

/// Classification of an executor failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionErrorKind {
    /// The invocation exceeded its time budget.
    Timeout,
    /// The platform ran out of a resource (memory, quota, slots).
    ResourceExhausted,
    /// The platform itself was unreachable or degraded.
    PlatformUnavailable,
    /// The inputs or configuration were rejected by the platform.
    InvalidInput,
    /// Anything else.
    Internal,
}

/// A failure returned by an executor invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("Executor error ({kind:?}, retryable: {retryable}): {message}")]
pub struct ExecutionError {
    /// The failure classification.
    pub kind: ExecutionErrorKind,
    /// Whether the node runtime may retry this failure.
    pub retryable: bool,
    /// Human-readable detail.
    pub message: String,
}

impl ExecutionError {
    /// Creates a retryable error.
    #[must_use]
    pub fn retryable(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: true,
            message: message.into(),
        }
    }

    /// Creates a permanent error.
    #[must_use]
    pub fn permanent(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: false,
            message: message.into(),
        }
    }

    /// The error produced when an invocation outlives its timeout budget.
    #[must_use]
    pub fn timed_out(timeout_ms: u64) -> Self {
        Self::retryable(
            ExecutionErrorKind::Timeout,
            format!("invocation exceeded {timeout_ms}ms"),
        )
    }
}

/// A metric sample reported by an executor alongside its outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// The metric name (e.g. "rows_processed").
    pub name: String,
    /// The sampled value.
    pub value: f64,
    /// Optional unit (e.g. "ms", "bytes").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl MetricSample {
    /// Creates a unitless sample.
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: None,
        }
    }

    /// Sets the unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// The result of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorOutcome {
    /// The node's produced outputs.
    pub outputs: ConfigMap,
    /// Metrics sampled during the invocation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<MetricSample>,
}

impl ExecutorOutcome {
    /// Creates an outcome with outputs and no metrics.
    #[must_use]
    pub fn with_outputs(outputs: ConfigMap) -> Self {
        Self {
            outputs,
            metrics: Vec::new(),
        }
    }
}

/// Everything an executor receives for one invocation.
#[derive(Debug, Clone)]
pub struct ExecutorInvocation {
    /// The owning execution.
    pub execution_id: Uuid,
    /// The node being run.
    pub node_id: String,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Effective configuration (pipeline defaults overlaid by node config).
    pub effective_config: ConfigMap,
    /// Validated inputs.
    pub inputs: ConfigMap,
    /// Resolved secret values, keyed by binding name. Never recorded.
    pub secrets: BTreeMap<String, String>,
    /// Declared resource requirements.
    pub resources: ResourceRequirements,
}

/// The platform adapter capability.
///
/// Implementations perform external I/O; this is the only suspension point
/// in a node's lifecycle apart from retry backoff sleeps.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Performs the node's work.
    async fn execute(
        &self,
        invocation: ExecutorInvocation,
    ) -> Result<ExecutorOutcome, ExecutionError>;
}
