//! Planning module for stack changes.
//!
//! This module hashes declarations, compares them with recorded state and
//! turns the difference into an ordered plan.

mod diff;
mod executor;
mod hash;
mod plan;

pub use diff::{DiffDetail, DiffEngine, DiffResult, DiffType, ResourceDiff};
pub use executor::{ActionResult, ExecutionResult, PlanExecutor};
pub use hash::StackHasher;
pub use plan::{ActionType, PlannedAction, StackPlan};
