//! Mock executors for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::dsl::model::ConfigMap;
use crate::executor::{
    ExecutionError, ExecutionErrorKind, Executor, ExecutorInvocation, ExecutorOutcome,
};

/// An executor that succeeds with fixed outputs, recording every
/// invocation. Also tracks the concurrency high-water mark, so tests can
/// assert the engine's dispatch bound.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    outputs: ConfigMap,
    delay: Option<Duration>,
    invocations: Mutex<Vec<String>>,
    calls_per_node: Mutex<HashMap<String, u32>>,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl RecordingExecutor {
    /// Creates an executor returning empty outputs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor returning the given outputs.
    #[must_use]
    pub fn with_outputs(outputs: serde_json::Value) -> Self {
        Self {
            outputs: outputs.as_object().cloned().unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Adds an artificial invocation delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Node ids in invocation order.
    #[must_use]
    pub fn invocation_order(&self) -> Vec<String> {
        self.invocations.lock().clone()
    }

    /// Invocations of one node.
    #[must_use]
    pub fn calls_for(&self, node_id: &str) -> u32 {
        self.calls_per_node
            .lock()
            .get(node_id)
            .copied()
            .unwrap_or(0)
    }

    /// The highest number of simultaneous invocations observed.
    #[must_use]
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(
        &self,
        invocation: ExecutorInvocation,
    ) -> Result<ExecutorOutcome, ExecutionError> {
        self.invocations.lock().push(invocation.node_id.clone());
        *self
            .calls_per_node
            .lock()
            .entry(invocation.node_id.clone())
            .or_insert(0) += 1;

        let live = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(live, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        Ok(ExecutorOutcome::with_outputs(self.outputs.clone()))
    }
}

/// An executor that fails for specific nodes and succeeds for the rest.
#[derive(Debug)]
pub struct SelectiveFailExecutor {
    failing_nodes: Vec<String>,
    retryable: bool,
    outputs: ConfigMap,
}

impl SelectiveFailExecutor {
    /// Creates an executor that fails permanently for the listed nodes.
    #[must_use]
    pub fn failing(nodes: &[&str]) -> Self {
        Self {
            failing_nodes: nodes.iter().map(|n| (*n).to_string()).collect(),
            retryable: false,
            outputs: ConfigMap::new(),
        }
    }

    /// Makes the failures retryable.
    #[must_use]
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Sets the outputs of succeeding nodes.
    #[must_use]
    pub fn with_outputs(mut self, outputs: serde_json::Value) -> Self {
        self.outputs = outputs.as_object().cloned().unwrap_or_default();
        self
    }
}

#[async_trait]
impl Executor for SelectiveFailExecutor {
    async fn execute(
        &self,
        invocation: ExecutorInvocation,
    ) -> Result<ExecutorOutcome, ExecutionError> {
        if self.failing_nodes.contains(&invocation.node_id) {
            let error = if self.retryable {
                ExecutionError::retryable(
                    ExecutionErrorKind::PlatformUnavailable,
                    format!("node '{}' scripted to fail", invocation.node_id),
                )
            } else {
                ExecutionError::permanent(
                    ExecutionErrorKind::Internal,
                    format!("node '{}' scripted to fail", invocation.node_id),
                )
            };
            return Err(error);
        }
        Ok(ExecutorOutcome::with_outputs(self.outputs.clone()))
    }
}

/// An executor that fails transiently a fixed number of times per node,
/// then succeeds.
#[derive(Debug, Default)]
pub struct FlakyExecutor {
    failures_before_success: u32,
    attempts: Mutex<HashMap<String, u32>>,
}

impl FlakyExecutor {
    /// Creates an executor that fails `failures` times per node.
    #[must_use]
    pub fn new(failures: u32) -> Self {
        Self {
            failures_before_success: failures,
            attempts: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Executor for FlakyExecutor {
    async fn execute(
        &self,
        invocation: ExecutorInvocation,
    ) -> Result<ExecutorOutcome, ExecutionError> {
        let mut attempts = self.attempts.lock();
        let seen = attempts.entry(invocation.node_id.clone()).or_insert(0);
        *seen += 1;
        if *seen <= self.failures_before_success {
            return Err(ExecutionError::retryable(
                ExecutionErrorKind::PlatformUnavailable,
                format!("transient failure {seen}"),
            ));
        }
        Ok(ExecutorOutcome::default())
    }
}

/// An executor whose listed nodes block until [`GatedExecutor::release`]
/// is called. Used to hold a node mid-execution in pause and cancel tests.
#[derive(Debug)]
pub struct GatedExecutor {
    gated_nodes: Vec<String>,
    gate: Arc<Notify>,
    released: Mutex<bool>,
    waiting: AtomicUsize,
    calls_per_node: Mutex<HashMap<String, u32>>,
}

impl GatedExecutor {
    /// Creates an executor gating the listed nodes.
    #[must_use]
    pub fn gating(nodes: &[&str]) -> Self {
        Self {
            gated_nodes: nodes.iter().map(|n| (*n).to_string()).collect(),
            gate: Arc::new(Notify::new()),
            released: Mutex::new(false),
            waiting: AtomicUsize::new(0),
            calls_per_node: Mutex::new(HashMap::new()),
        }
    }

    /// Invocations of one node.
    #[must_use]
    pub fn calls_for(&self, node_id: &str) -> u32 {
        self.calls_per_node
            .lock()
            .get(node_id)
            .copied()
            .unwrap_or(0)
    }

    /// Lets every gated invocation proceed.
    pub fn release(&self) {
        *self.released.lock() = true;
        self.gate.notify_waiters();
    }

    /// Waits until a gated node is inside its invocation.
    pub async fn wait_until_entered(&self) {
        // Polling sidesteps the register-before-notify race; fine for tests.
        while self.waiting.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

#[async_trait]
impl Executor for GatedExecutor {
    async fn execute(
        &self,
        invocation: ExecutorInvocation,
    ) -> Result<ExecutorOutcome, ExecutionError> {
        *self
            .calls_per_node
            .lock()
            .entry(invocation.node_id.clone())
            .or_insert(0) += 1;

        if self.gated_nodes.contains(&invocation.node_id) {
            let notified = self.gate.notified();
            self.waiting.fetch_add(1, Ordering::SeqCst);
            if !*self.released.lock() {
                notified.await;
            }
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(ExecutorOutcome::default())
    }
}
