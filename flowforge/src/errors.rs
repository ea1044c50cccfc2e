//! Error types for the flowforge engine.
//!
//! Validation, version resolution, and compilation errors are synchronous and
//! block execution start entirely. Node-level executor failures are recorded
//! on the execution record and escalate according to the pipeline's
//! continue-on-error policy. Checkpoint write failures are always fatal.

use thiserror::Error;

use crate::compiler::CompilationError;
use crate::engine::store::StoreError;
use crate::executor::ExecutionError;
use crate::version::VersionError;

/// The main error type for flowforge operations.
#[derive(Debug, Error)]
pub enum FlowforgeError {
    /// The DSL document could not be parsed.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// The pipeline graph violates a structural invariant.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A component version could not be resolved.
    #[error("{0}")]
    Version(#[from] VersionError),

    /// The validated graph could not be compiled.
    #[error("{0}")]
    Compilation(#[from] CompilationError),

    /// A node's executor invocation failed terminally.
    #[error("{0}")]
    Execution(#[from] ExecutionError),

    /// A checkpoint snapshot could not be persisted.
    ///
    /// Never swallowed: losing checkpoint state silently would break
    /// resume correctness.
    #[error("{0}")]
    CheckpointWrite(#[from] CheckpointWriteError),

    /// The record store rejected an operation.
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    /// The referenced execution does not exist.
    #[error("Unknown execution: {0}")]
    UnknownExecution(String),

    /// The requested control action is not legal in the current state.
    #[error("Illegal control action: {0}")]
    IllegalControl(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error raised when a DSL document is structurally malformed.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is neither valid JSON nor valid YAML.
    #[error("Document is not valid JSON or YAML: {0}")]
    Syntax(String),

    /// The document is missing the top-level `pipeline` object.
    #[error("Document has no top-level `pipeline` object")]
    MissingPipeline,

    /// A field failed to deserialize into the model.
    #[error("Malformed pipeline document: {0}")]
    Shape(String),

    /// A loose-typed field could not be normalized into its canonical form.
    #[error("Cannot normalize {field}: {detail}")]
    Normalize {
        /// The offending field path.
        field: String,
        /// What was wrong with it.
        detail: String,
    },
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct ValidationError {
    /// The specific invariant that was violated.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// Creates a validation error of the given kind.
    #[must_use]
    pub fn new(kind: ValidationErrorKind) -> Self {
        Self { kind }
    }
}

/// The structural invariants a pipeline graph can violate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    /// The graph declares no nodes.
    #[error("Pipeline graph has no nodes")]
    EmptyGraph,

    /// Two nodes share the same id.
    #[error("Duplicate node id: '{id}'")]
    DuplicateNodeId {
        /// The repeated node id.
        id: String,
    },

    /// An edge references a node id that does not exist.
    #[error("Edge '{source_id}' -> '{target}' references unknown node '{missing}'")]
    DanglingEdge {
        /// The edge's source id.
        source_id: String,
        /// The edge's target id.
        target: String,
        /// The endpoint that does not exist.
        missing: String,
    },

    /// The graph contains a dependency cycle.
    #[error("Cycle detected among nodes: {}", path.join(" -> "))]
    CycleDetected {
        /// Node ids participating in the cycle, sorted for stable output.
        path: Vec<String>,
    },
}

/// Error raised when a checkpoint snapshot cannot be persisted.
#[derive(Debug, Error)]
#[error("Checkpoint write failed for execution {execution_id}: {source}")]
pub struct CheckpointWriteError {
    /// The execution whose checkpoint was lost.
    pub execution_id: String,
    /// The underlying store failure.
    #[source]
    pub source: StoreError,
}

impl CheckpointWriteError {
    /// Wraps a store failure as a fatal checkpoint write error.
    #[must_use]
    pub fn new(execution_id: impl Into<String>, source: StoreError) -> Self {
        Self {
            execution_id: execution_id.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_names_nodes() {
        let err = ValidationError::new(ValidationErrorKind::CycleDetected {
            path: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        });
        assert!(err.to_string().contains("a -> b -> c"));
    }

    #[test]
    fn test_dangling_edge_message() {
        let kind = ValidationErrorKind::DanglingEdge {
            source_id: "a".to_string(),
            target: "ghost".to_string(),
            missing: "ghost".to_string(),
        };
        assert!(kind.to_string().contains("unknown node 'ghost'"));
    }

    #[test]
    fn test_checkpoint_write_is_loud() {
        let err = CheckpointWriteError::new(
            "exec-1",
            StoreError::Unavailable("disk full".to_string()),
        );
        assert!(err.to_string().contains("exec-1"));
        assert!(FlowforgeError::from(err).to_string().contains("Checkpoint"));
    }
}
