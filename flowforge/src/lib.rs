//! # Flowforge
//!
//! A declarative DAG pipeline engine with independently versioned
//! components, checkpointed execution, and a full per-run audit trail.
//!
//! Flowforge takes a pipeline definition (YAML or JSON), validates its
//! structure, resolves each node's component versions against a registry,
//! compiles the result into an immutable plan, and drives that plan to
//! completion with:
//!
//! - **Dependency-respecting scheduling**: sequential or bounded-parallel
//!   frontier dispatch
//! - **Retries with backoff**: per-node policies for transient executor
//!   failures
//! - **Checkpointing**: a resumable snapshot after every node settles
//! - **Control operations**: pause, resume, and cooperative cancel
//! - **Audit records**: frozen version snapshots, per-node attempts,
//!   outputs, errors, and metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowforge::prelude::*;
//!
//! let graph = import_document(yaml_text)?;
//! let service = ExecutionService::new(executors, versions, store, events);
//! let execution_id = service.start_execution(&graph, variables).await?;
//! service.control(execution_id, ControlAction::Pause).await?;
//! ```
//!
//! Platform adapters implement the [`executor::Executor`] capability;
//! persistence implements [`engine::RecordStore`]. The core never depends
//! on a concrete platform.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod compiler;
pub mod dsl;
pub mod engine;
pub mod errors;
pub mod events;
pub mod executor;
pub mod runtime;
pub mod testing;
pub mod utils;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::compiler::{compile, CompilationError, CompiledGraph, CompiledNode};
    pub use crate::dsl::{
        export_document, import_document, validate, ComponentRef, ConfigMap, DocumentFormat,
        ExecutionMode, ExecutionSettings, IoDeclaration, PipelineEdge, PipelineGraph,
        PipelineNode, SecretRef, ValidationRule,
    };
    pub use crate::engine::{
        CheckpointSnapshot, ControlAction, ExecutionRecord, ExecutionService, ExecutionStatus,
        InMemoryRecordStore, NodeExecutionRecord, NodeProgress, RecordStore, VersionSnapshot,
    };
    pub use crate::errors::{
        CheckpointWriteError, FlowforgeError, ParseError, ValidationError, ValidationErrorKind,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executor::{
        CapabilityKey, ExecutionError, ExecutionErrorKind, Executor, ExecutorInvocation,
        ExecutorOutcome, ExecutorRegistry, MetricSample,
    };
    pub use crate::runtime::{
        BackoffStrategy, CancelSignal, JitterStrategy, NodeStatus, RetryPolicy,
    };
    pub use crate::version::{
        ComponentKind, ResolvedVersions, SemanticVersion, VersionCatalog, VersionConstraint,
        VersionRegistry, VersionResolver,
    };
}
