//! costplan runtime: the group comparator and the run orchestrator.
//!
//! A run lists the groups to process, then for each one fetches the current
//! blueprint and the optimal plan, compares them and records the outcome.
//! Groups are processed strictly one after another.

pub mod comparator;
pub mod orchestrator;
pub mod types;

pub use comparator::{compare, ComparisonError, GroupComparison};
pub use orchestrator::RunOrchestrator;
pub use types::*;
