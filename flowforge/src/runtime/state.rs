//! Per-node lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of one node within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Waiting for predecessors to reach a terminal state.
    Pending,
    /// Checking declared input schemas and rules.
    Validating,
    /// Executor invocation in flight.
    Running,
    /// Waiting out a backoff delay before the next attempt.
    Retrying,
    /// Finished successfully; outputs captured.
    Succeeded,
    /// Finished unsuccessfully; error captured.
    Failed,
    /// Never ran: a false edge condition or a failed predecessor.
    Skipped,
    /// The execution was cancelled before the node finished.
    Cancelled,
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Validating => write!(f, "validating"),
            Self::Running => write!(f, "running"),
            Self::Retrying => write!(f, "retrying"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl NodeStatus {
    /// Returns true for states a node never leaves.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    /// Returns true if downstream nodes may consume this node's outputs.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if the node settled without producing outputs.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(NodeStatus::Succeeded.is_terminal());
        assert!(NodeStatus::Failed.is_terminal());
        assert!(NodeStatus::Skipped.is_terminal());
        assert!(NodeStatus::Cancelled.is_terminal());
        assert!(!NodeStatus::Pending.is_terminal());
        assert!(!NodeStatus::Validating.is_terminal());
        assert!(!NodeStatus::Running.is_terminal());
        assert!(!NodeStatus::Retrying.is_terminal());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&NodeStatus::Retrying).unwrap();
        assert_eq!(json, r#""retrying""#);
    }

    #[test]
    fn test_display() {
        assert_eq!(NodeStatus::Skipped.to_string(), "skipped");
    }
}
