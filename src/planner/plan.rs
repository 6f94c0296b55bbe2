//! Stack plan types and construction.
//!
//! A plan lists deletions first, in reverse recorded order, then every other
//! change in declaration order. Each action names the indices of earlier
//! actions it must wait for.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::diff::{DiffResult, DiffType};

/// A complete stack plan.
#[derive(Debug)]
pub struct StackPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Configuration hash this plan is based on.
    pub config_hash: String,
    /// Planned actions in execution order.
    pub actions: Vec<PlannedAction>,
}

/// A single planned action.
#[derive(Debug, Clone)]
pub struct PlannedAction {
    /// Action type.
    pub action_type: ActionType,
    /// Resource name.
    pub resource_name: String,
    /// Provider type token.
    pub kind: String,
    /// Reason for this action.
    pub reason: String,
    /// New declaration hash (if applicable).
    pub new_hash: Option<String>,
    /// Resources the declaration references (recorded ones for deletes).
    pub references: Vec<String>,
    /// Dependencies (action indices that must complete first).
    pub dependencies: Vec<usize>,
}

/// Types of actions in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Create a new resource.
    Create,
    /// Update a resource in place.
    Update,
    /// Replace a resource whose type changed.
    Replace,
    /// Delete a resource.
    Delete,
}

impl StackPlan {
    /// Creates a new plan from a diff result.
    #[must_use]
    pub fn from_diff(diff: &DiffResult, config_hash: &str) -> Self {
        let mut actions: Vec<PlannedAction> = Vec::new();
        // Resource name -> index of the action touching it.
        let mut index_of: HashMap<&str, usize> = HashMap::new();

        // Deletes come out of the diff already in reverse recorded order.
        // A delete waits for earlier deletes of resources that referenced it.
        for resource_diff in diff.diffs.iter().filter(|d| d.diff_type == DiffType::Delete) {
            let dependencies = actions
                .iter()
                .enumerate()
                .filter(|(_, a)| a.references.contains(&resource_diff.name))
                .map(|(i, _)| i)
                .collect();

            index_of.insert(resource_diff.name.as_str(), actions.len());
            actions.push(PlannedAction {
                action_type: ActionType::Delete,
                resource_name: resource_diff.name.clone(),
                kind: resource_diff.kind.clone(),
                reason: String::from("No longer declared"),
                new_hash: None,
                references: resource_diff.dependencies.clone(),
                dependencies,
            });
        }

        for resource_diff in &diff.diffs {
            let (action_type, reason) = match resource_diff.diff_type {
                DiffType::Create => (ActionType::Create, String::from("Newly declared")),
                DiffType::Update => (ActionType::Update, String::from("Declaration changed")),
                DiffType::Replace => (
                    ActionType::Replace,
                    resource_diff
                        .details
                        .first()
                        .and_then(|d| d.old_value.as_ref())
                        .map_or_else(
                            || String::from("Type changed"),
                            |old| format!("Type changed from {old}"),
                        ),
                ),
                DiffType::Delete | DiffType::NoChange => continue,
            };

            let mut dependencies: Vec<usize> = resource_diff
                .dependencies
                .iter()
                .filter_map(|dep| index_of.get(dep.as_str()).copied())
                .collect();
            dependencies.sort_unstable();

            index_of.insert(resource_diff.name.as_str(), actions.len());
            actions.push(PlannedAction {
                action_type,
                resource_name: resource_diff.name.clone(),
                kind: resource_diff.kind.clone(),
                reason,
                new_hash: resource_diff.new_hash.clone(),
                references: resource_diff.dependencies.clone(),
                dependencies,
            });
        }

        Self {
            created_at: Utc::now(),
            config_hash: config_hash.to_string(),
            actions,
        }
    }

    /// Creates an empty plan (no changes needed).
    #[must_use]
    pub fn empty(config_hash: &str) -> Self {
        Self {
            created_at: Utc::now(),
            config_hash: config_hash.to_string(),
            actions: vec![],
        }
    }

    /// Returns true if the plan is empty (no changes).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the number of actions.
    #[must_use]
    pub const fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Returns the number of actions of one type.
    #[must_use]
    pub fn count(&self, action_type: ActionType) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .count()
    }

    /// Returns actions that can be executed immediately (no dependencies).
    #[must_use]
    pub fn ready_actions(&self) -> Vec<&PlannedAction> {
        self.actions
            .iter()
            .filter(|a| a.dependencies.is_empty())
            .collect()
    }

    /// Gets actions that depend on a specific action index.
    #[must_use]
    pub fn dependent_actions(&self, action_idx: usize) -> Vec<(usize, &PlannedAction)> {
        self.actions
            .iter()
            .enumerate()
            .filter(|(_, a)| a.dependencies.contains(&action_idx))
            .collect()
    }
}

impl PlannedAction {
    /// Returns a human-readable description of the action.
    #[must_use]
    pub fn description(&self) -> String {
        match self.action_type {
            ActionType::Create => format!("Create {} '{}'", self.kind, self.resource_name),
            ActionType::Update => format!("Update {} '{}'", self.kind, self.resource_name),
            ActionType::Replace => format!("Replace {} '{}'", self.kind, self.resource_name),
            ActionType::Delete => format!("Delete {} '{}'", self.kind, self.resource_name),
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.action_type, self.resource_name)?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for StackPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.actions.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Stack Plan ({} actions):", self.actions.len())?;
        for (i, action) in self.actions.iter().enumerate() {
            write!(f, "  {i}. {action}")?;
            if !action.dependencies.is_empty() {
                let deps: Vec<String> = action.dependencies.iter().map(ToString::to_string).collect();
                write!(f, " after [{}]", deps.join(", "))?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Property, Resource, ResourceGraph, ResourceKind};
    use crate::planner::{DiffEngine, StackHasher};
    use crate::state::{ResourceState, StackState};

    fn declared() -> ResourceGraph {
        ResourceGraph::from_resources(vec![
            Resource::new(ResourceKind::Vpc, "vpc"),
            Resource::new(ResourceKind::InternetGateway, "igw").with("vpcId", Property::reference("vpc", "id")),
            Resource::new(ResourceKind::RouteTable, "public-rt")
                .with("vpcId", Property::reference("vpc", "id"))
                .with("gatewayId", Property::reference("igw", "id")),
        ])
        .expect("graph")
    }

    fn stale_state() -> StackState {
        let mut state = StackState::new("shop", "dev");
        state.set_resource(ResourceState::new("old-vpc", "aws:ec2/vpc:Vpc", "h1", 0));
        state.set_resource(
            ResourceState::new("old-subnet", "aws:ec2/subnet:Subnet", "h2", 1)
                .with_dependencies(vec![String::from("old-vpc")]),
        );
        state
    }

    #[test]
    fn test_plan_from_scratch_has_dependency_indices() {
        let diff = DiffEngine::new().compute_diff(&declared(), None);
        let plan = StackPlan::from_diff(&diff, "cfg");

        assert_eq!(plan.action_count(), 3);
        assert_eq!(plan.count(ActionType::Create), 3);
        assert!(plan.actions[0].dependencies.is_empty());
        assert_eq!(plan.actions[1].dependencies, vec![0]);
        assert_eq!(plan.actions[2].dependencies, vec![0, 1]);
        assert_eq!(plan.ready_actions().len(), 1);
        assert_eq!(plan.dependent_actions(0).len(), 2);
    }

    #[test]
    fn test_deletes_precede_creates() {
        let diff = DiffEngine::new().compute_diff(&declared(), Some(&stale_state()));
        let plan = StackPlan::from_diff(&diff, "cfg");

        let types: Vec<_> = plan.actions.iter().map(|a| a.action_type).collect();
        assert_eq!(
            types,
            vec![
                ActionType::Delete,
                ActionType::Delete,
                ActionType::Create,
                ActionType::Create,
                ActionType::Create
            ]
        );
        assert_eq!(plan.actions[0].resource_name, "old-subnet");
        // The VPC delete waits for the subnet that referenced it.
        assert_eq!(plan.actions[1].dependencies, vec![0]);
        // Creates never wait on deletes.
        assert!(plan.actions[2].dependencies.is_empty());
    }

    #[test]
    fn test_unchanged_graph_gives_empty_plan() {
        let graph = declared();
        let hasher = StackHasher::new();
        let mut state = StackState::new("shop", "dev");
        for (pos, r) in graph.iter().enumerate() {
            state.set_resource(ResourceState::new(&r.name, r.kind.type_token(), &hasher.hash_resource(r), pos));
        }
        let diff = DiffEngine::new().compute_diff(&graph, Some(&state));
        let plan = StackPlan::from_diff(&diff, "cfg");
        assert!(plan.is_empty());
        assert_eq!(plan.to_string(), "No changes required");
    }

    #[test]
    fn test_description() {
        let plan = StackPlan::from_diff(&DiffEngine::new().compute_diff(&declared(), None), "cfg");
        assert_eq!(plan.actions[0].description(), "Create aws:ec2/vpc:Vpc 'vpc'");
        assert!(StackPlan::empty("cfg").is_empty());
    }
}
