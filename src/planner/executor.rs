//! Plan executor for recording applied plans.
//!
//! The external engine does the provisioning; applying a plan here means
//! walking its actions in order and recording each one in the stack state,
//! so the next `plan` diffs against what was handed over.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::graph::ResourceGraph;
use crate::state::{ResourceState, StackHistoryEntry, StackOperation, StackState};

use super::plan::{ActionType, PlannedAction, StackPlan};

/// Executor for stack plans.
#[derive(Debug)]
pub struct PlanExecutor<'a> {
    /// Graph the plan was computed from.
    graph: &'a ResourceGraph,
}

/// Result of executing a single action.
#[derive(Debug)]
pub struct ActionResult {
    /// Action index.
    pub index: usize,
    /// Action that was executed.
    pub action: PlannedAction,
    /// Whether the action succeeded.
    pub success: bool,
    /// Error message (if failed).
    pub error: Option<String>,
}

/// Result of executing the entire plan.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Individual action results.
    pub results: Vec<ActionResult>,
    /// Number of successful actions.
    pub successful: usize,
    /// Number of failed actions.
    pub failed: usize,
    /// Whether the entire plan succeeded.
    pub success: bool,
}

impl<'a> PlanExecutor<'a> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(graph: &'a ResourceGraph) -> Self {
        Self { graph }
    }

    /// Records every action of `plan` in `state` and appends a history entry.
    ///
    /// An action whose resource is missing from the graph, or whose
    /// dependencies failed, is reported as failed and not recorded.
    pub fn execute(&self, plan: &StackPlan, state: &mut StackState) -> ExecutionResult {
        info!("Recording stack plan with {} actions", plan.actions.len());

        let operation = if state.resources.is_empty() {
            StackOperation::Create
        } else {
            StackOperation::Update
        };

        let mut results = Vec::with_capacity(plan.actions.len());
        let mut failed_indices: HashSet<usize> = HashSet::new();

        for (idx, action) in plan.actions.iter().enumerate() {
            if action.dependencies.iter().any(|dep| failed_indices.contains(dep)) {
                warn!("Skipping action {idx} due to failed dependencies");
                failed_indices.insert(idx);
                results.push(ActionResult {
                    index: idx,
                    action: action.clone(),
                    success: false,
                    error: Some(String::from("Skipped due to dependency failure")),
                });
                continue;
            }

            let outcome = self.record_action(action, state);
            if let Err(message) = &outcome {
                warn!("Action {idx} failed: {message}");
                failed_indices.insert(idx);
            } else {
                debug!("Recorded {action}");
            }

            results.push(ActionResult {
                index: idx,
                action: action.clone(),
                success: outcome.is_ok(),
                error: outcome.err(),
            });
        }

        // Positions follow the current declaration order, including unchanged resources.
        for (position, resource) in self.graph.iter().enumerate() {
            if let Some(recorded) = state.resources.get_mut(&resource.name) {
                recorded.position = position;
            }
        }

        let successful = results.iter().filter(|r| r.success).count();
        let failed = results.len() - successful;
        let touched: Vec<String> = results.iter().map(|r| r.action.resource_name.clone()).collect();

        let entry = if failed == 0 {
            StackHistoryEntry::new(operation, &plan.config_hash, touched)
        } else {
            StackHistoryEntry::failed(
                operation,
                &plan.config_hash,
                touched,
                &format!("{failed} action(s) failed"),
            )
        };
        state.add_history(entry);
        state.config_hash.clone_from(&plan.config_hash);

        ExecutionResult {
            results,
            successful,
            failed,
            success: failed == 0,
        }
    }

    /// Records a destroy: every resource is removed.
    pub fn destroy(state: &mut StackState) -> Vec<String> {
        let removed: Vec<String> = state
            .ordered_resources()
            .into_iter()
            .rev()
            .map(|r| r.name.clone())
            .collect();

        for name in &removed {
            state.remove_resource(name);
        }
        state.outputs.clear();
        state.stack_hash.clear();
        state.document = None;

        let config_hash = state.config_hash.clone();
        state.add_history(StackHistoryEntry::new(
            StackOperation::Destroy,
            &config_hash,
            removed.clone(),
        ));
        info!("Recorded destruction of {} resources", removed.len());
        removed
    }

    /// Applies one action to the state.
    fn record_action(&self, action: &PlannedAction, state: &mut StackState) -> Result<(), String> {
        match action.action_type {
            ActionType::Delete => {
                state.remove_resource(&action.resource_name);
                Ok(())
            }
            ActionType::Create | ActionType::Update | ActionType::Replace => {
                let position = self
                    .graph
                    .position(&action.resource_name)
                    .ok_or_else(|| format!("'{}' is not declared", action.resource_name))?;
                let hash = action
                    .new_hash
                    .as_deref()
                    .ok_or_else(|| format!("'{}' has no declaration hash", action.resource_name))?;

                if action.action_type == ActionType::Replace {
                    state.remove_resource(&action.resource_name);
                }
                state.set_resource(
                    ResourceState::new(&action.resource_name, &action.kind, hash, position)
                        .with_dependencies(action.references.clone()),
                );
                Ok(())
            }
        }
    }
}

impl ExecutionResult {
    /// Returns true if all actions succeeded.
    #[must_use]
    pub const fn all_successful(&self) -> bool {
        self.success
    }
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} recorded, {} failed",
            self.successful, self.failed
        )
    }
}
