//! The execution engine: records, checkpoints, the record store
//! collaborator, frontier scheduling, and the control surface.

pub mod checkpoint;
mod control;
#[allow(clippy::module_inception)]
mod engine;
pub mod frontier;
pub mod record;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use checkpoint::CheckpointSnapshot;
pub use control::{ControlAction, ExecutionService};
pub use engine::NodeProgress;
pub use record::{
    ExecutionErrorEntry, ExecutionMetric, ExecutionRecord, ExecutionStatus,
    NodeExecutionRecord, RecordError, VersionSnapshot,
};
pub use store::{InMemoryRecordStore, RecordStore, StoreError};
