//! Test utilities: mock executors and graph fixtures.

mod fixtures;
mod mocks;

pub use fixtures::{
    harness, independent_graph, linear_graph, test_node, test_version, TestHarness,
    TEST_EXECUTOR, TEST_PLATFORM,
};
pub use mocks::{FlakyExecutor, GatedExecutor, RecordingExecutor, SelectiveFailExecutor};
