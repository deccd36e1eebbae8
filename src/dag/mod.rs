// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] holds the immutable task graph and its stable ordering.
//! - [`scheduler`] walks the graph for one target and runs stale tasks.
//! - [`report`] holds what a build (or a dry run) did.

pub mod graph;
pub mod report;
pub mod scheduler;

pub use graph::TaskGraph;
pub use report::{BuildReport, ExecutedTask, PlanAction, PlanEntry};
pub use scheduler::Scheduler;
