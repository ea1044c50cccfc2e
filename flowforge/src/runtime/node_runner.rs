//! The generic per-node lifecycle driver.
//!
//! One runner drives one node through
//! `VALIDATING -> RUNNING -> (RETRYING ->)* SUCCEEDED | FAILED`,
//! reusable across all node types. The runner owns no record state: every
//! transition is sent to the engine over its transition channel, and the
//! engine — the single writer for the execution — folds it into the record
//! and the event stream.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

use super::cancel::CancelSignal;
use super::rules::check_declarations;
use super::state::NodeStatus;
use crate::compiler::CompiledNode;
use crate::dsl::model::{ConfigMap, SecretRef};
use crate::executor::{
    ExecutionError, ExecutionErrorKind, Executor, ExecutorInvocation, MetricSample,
};

/// A node state transition reported to the engine.
#[derive(Debug, Clone)]
pub struct NodeTransition {
    /// The node that transitioned.
    pub node_id: String,
    /// The state entered.
    pub status: NodeStatus,
    /// 1-based attempt number at the time of the transition.
    pub attempt: u32,
    /// Captured outputs, present on success.
    pub outputs: Option<ConfigMap>,
    /// Metrics sampled by the executor, present on success.
    pub metrics: Vec<MetricSample>,
    /// Error detail, present on failure and retry transitions.
    pub error: Option<ExecutionError>,
    /// The scheduled backoff, present on retry transitions.
    pub retry_in: Option<Duration>,
}

impl NodeTransition {
    fn new(node_id: &str, status: NodeStatus, attempt: u32) -> Self {
        Self {
            node_id: node_id.to_string(),
            status,
            attempt,
            outputs: None,
            metrics: Vec::new(),
            error: None,
            retry_in: None,
        }
    }
}

/// Drives a single node's lifecycle within one execution.
pub struct NodeRunner {
    execution_id: Uuid,
    node: Arc<CompiledNode>,
    executor: Arc<dyn Executor>,
    cancel: CancelSignal,
    transitions: UnboundedSender<NodeTransition>,
}

impl NodeRunner {
    /// Creates a runner for one node.
    #[must_use]
    pub fn new(
        execution_id: Uuid,
        node: Arc<CompiledNode>,
        executor: Arc<dyn Executor>,
        cancel: CancelSignal,
        transitions: UnboundedSender<NodeTransition>,
    ) -> Self {
        Self {
            execution_id,
            node,
            executor,
            cancel,
            transitions,
        }
    }

    /// Runs the node to a terminal state and returns it.
    ///
    /// `inputs` are the merged outputs of the node's predecessors (plus the
    /// execution variables for entry nodes), already gated by the engine.
    pub async fn run(self, inputs: ConfigMap) -> NodeStatus {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            // Lifecycle boundary: checked before validating and again after
            // each backoff sleep.
            if self.cancel.is_cancelled() {
                self.send(NodeTransition::new(&self.node.id, NodeStatus::Cancelled, attempt));
                return NodeStatus::Cancelled;
            }

            self.send(NodeTransition::new(&self.node.id, NodeStatus::Validating, attempt));

            if let Err(violations) = check_declarations(&self.node.inputs, &inputs) {
                // A bad input shape is a configuration defect; retrying
                // cannot fix it.
                return self.fail(
                    attempt,
                    ExecutionError::permanent(
                        ExecutionErrorKind::InvalidInput,
                        format!("input validation failed: {}", join_violations(&violations)),
                    ),
                );
            }

            let secrets = match resolve_secrets(&self.node.secrets) {
                Ok(secrets) => secrets,
                Err(detail) => {
                    return self.fail(
                        attempt,
                        ExecutionError::permanent(ExecutionErrorKind::InvalidInput, detail),
                    );
                }
            };

            self.send(NodeTransition::new(&self.node.id, NodeStatus::Running, attempt));

            let invocation = ExecutorInvocation {
                execution_id: self.execution_id,
                node_id: self.node.id.clone(),
                attempt,
                effective_config: self.node.effective_config.clone(),
                inputs: inputs.clone(),
                secrets,
                resources: self.node.resources,
            };
            let result = self.invoke(invocation).await;

            // The invocation itself is never interrupted, but its result is
            // discarded if cancellation arrived while it was in flight.
            if self.cancel.is_cancelled() {
                self.send(NodeTransition::new(&self.node.id, NodeStatus::Cancelled, attempt));
                return NodeStatus::Cancelled;
            }

            match result {
                Ok(outcome) => {
                    if let Err(violations) =
                        check_declarations(&self.node.outputs, &outcome.outputs)
                    {
                        return self.fail(
                            attempt,
                            ExecutionError::permanent(
                                ExecutionErrorKind::InvalidInput,
                                format!(
                                    "output validation failed: {}",
                                    join_violations(&violations)
                                ),
                            ),
                        );
                    }

                    let mut transition =
                        NodeTransition::new(&self.node.id, NodeStatus::Succeeded, attempt);
                    transition.outputs = Some(outcome.outputs);
                    transition.metrics = outcome.metrics;
                    self.send(transition);
                    return NodeStatus::Succeeded;
                }
                Err(error) if error.retryable && attempt < self.node.retry.max_attempts() => {
                    let delay = self.node.retry.delay_before_retry(attempt);
                    debug!(
                        node_id = %self.node.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after transient executor failure"
                    );

                    let mut transition =
                        NodeTransition::new(&self.node.id, NodeStatus::Retrying, attempt);
                    transition.error = Some(error);
                    transition.retry_in = Some(delay);
                    self.send(transition);

                    tokio::time::sleep(delay).await;
                }
                Err(error) => return self.fail(attempt, error),
            }
        }
    }

    async fn invoke(
        &self,
        invocation: ExecutorInvocation,
    ) -> Result<crate::executor::ExecutorOutcome, ExecutionError> {
        match self.node.resources.timeout_ms {
            Some(timeout_ms) => {
                let budget = Duration::from_millis(timeout_ms);
                match tokio::time::timeout(budget, self.executor.execute(invocation)).await {
                    Ok(result) => result,
                    Err(_) => Err(ExecutionError::timed_out(timeout_ms)),
                }
            }
            None => self.executor.execute(invocation).await,
        }
    }

    fn fail(&self, attempt: u32, error: ExecutionError) -> NodeStatus {
        let mut transition = NodeTransition::new(&self.node.id, NodeStatus::Failed, attempt);
        transition.error = Some(error);
        self.send(transition);
        NodeStatus::Failed
    }

    fn send(&self, transition: NodeTransition) {
        // A closed channel means the engine is gone; nothing left to tell.
        let _ = self.transitions.send(transition);
    }
}

fn join_violations(violations: &[super::rules::RuleViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Resolves secret references to values immediately before invocation.
///
/// Values never travel through records, checkpoints, or events. Vault
/// sources need a platform-side provider and are rejected here.
fn resolve_secrets(secrets: &[SecretRef]) -> Result<BTreeMap<String, String>, String> {
    let mut resolved = BTreeMap::new();
    for secret in secrets {
        let value = match secret {
            SecretRef::Env { var } => std::env::var(var)
                .map_err(|_| format!("secret environment variable '{var}' is not set"))?,
            SecretRef::Inline { value } => value.clone(),
            SecretRef::Vault { path, key } => {
                return Err(format!(
                    "vault secret '{path}#{key}' requires a platform secret provider"
                ));
            }
        };
        resolved.insert(secret.binding_name(), value);
    }
    Ok(resolved)
}
