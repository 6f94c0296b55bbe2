//! Diff engine for comparing the declared graph with recorded state.
//!
//! The comparison works on hashes only: a resource whose hash matches its
//! record is unchanged, whatever the engine may have done to it since.

use std::collections::BTreeSet;
use tracing::debug;

use crate::graph::ResourceGraph;
use crate::state::StackState;

use super::hash::StackHasher;

/// Engine for computing diffs between the declared graph and recorded state.
#[derive(Debug, Default)]
pub struct DiffEngine {
    /// Resource hasher.
    hasher: StackHasher,
}

/// Difference for a single resource.
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    /// Resource name.
    pub name: String,
    /// Provider type token (the declared one unless deleted).
    pub kind: String,
    /// Type of difference.
    pub diff_type: DiffType,
    /// Details about the difference.
    pub details: Vec<DiffDetail>,
    /// Recorded hash (if any).
    pub old_hash: Option<String>,
    /// Declared hash (if any).
    pub new_hash: Option<String>,
    /// Resources this one references (declared, or recorded for deletes).
    pub dependencies: Vec<String>,
}

/// Type of difference detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffType {
    /// Resource is new.
    Create,
    /// Resource properties changed.
    Update,
    /// Resource type changed; the old one must go.
    Replace,
    /// Resource is no longer declared.
    Delete,
    /// Resource is unchanged.
    NoChange,
}

/// Detail about a specific difference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffDetail {
    /// Field that differs.
    pub field: String,
    /// Old value.
    pub old_value: Option<String>,
    /// New value.
    pub new_value: Option<String>,
}

/// Complete diff result.
#[derive(Debug)]
pub struct DiffResult {
    /// Declared resources in declaration order, then deletions in reverse recorded order.
    pub diffs: Vec<ResourceDiff>,
    /// Number of resources to create.
    pub creates: usize,
    /// Number of resources to update.
    pub updates: usize,
    /// Number of resources to replace.
    pub replaces: usize,
    /// Number of resources to delete.
    pub deletes: usize,
    /// Number of unchanged resources.
    pub unchanged: usize,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            hasher: StackHasher::new(),
        }
    }

    /// Computes the diff between the declared graph and recorded state.
    #[must_use]
    pub fn compute_diff(&self, graph: &ResourceGraph, state: Option<&StackState>) -> DiffResult {
        let mut diffs = Vec::with_capacity(graph.len());

        for resource in graph.iter() {
            let new_hash = self.hasher.hash_resource(resource);
            let kind = resource.kind.type_token().to_string();
            let dependencies: Vec<String> = resource
                .referenced_names()
                .into_iter()
                .map(String::from)
                .collect();
            let recorded = state.and_then(|s| s.get_resource(&resource.name));

            let (diff_type, details, old_hash) = match recorded {
                None => {
                    debug!("{} needs to be created", resource.name);
                    (DiffType::Create, Vec::new(), None)
                }
                Some(rec) if rec.kind != kind => {
                    debug!("{} changed type, replacing", resource.name);
                    let details = vec![DiffDetail {
                        field: String::from("type"),
                        old_value: Some(rec.kind.clone()),
                        new_value: Some(kind.clone()),
                    }];
                    (DiffType::Replace, details, Some(rec.hash.clone()))
                }
                Some(rec) if StackHasher::hashes_match(&rec.hash, &new_hash) => {
                    (DiffType::NoChange, Vec::new(), Some(rec.hash.clone()))
                }
                Some(rec) => {
                    debug!("{} needs update", resource.name);
                    let mut details = vec![DiffDetail {
                        field: String::from("properties"),
                        old_value: Some(self.hasher.short_hash(&rec.hash)),
                        new_value: Some(self.hasher.short_hash(&new_hash)),
                    }];
                    if rec.dependencies != dependencies {
                        details.push(DiffDetail {
                            field: String::from("dependencies"),
                            old_value: Some(rec.dependencies.join(", ")),
                            new_value: Some(dependencies.join(", ")),
                        });
                    }
                    (DiffType::Update, details, Some(rec.hash.clone()))
                }
            };

            diffs.push(ResourceDiff {
                name: resource.name.clone(),
                kind,
                diff_type,
                details,
                old_hash,
                new_hash: Some(new_hash),
                dependencies,
            });
        }

        if let Some(state) = state {
            let declared: BTreeSet<&str> = graph.iter().map(|r| r.name.as_str()).collect();
            for recorded in state.ordered_resources().into_iter().rev() {
                if declared.contains(recorded.name.as_str()) {
                    continue;
                }
                debug!("{} is no longer declared", recorded.name);
                diffs.push(ResourceDiff {
                    name: recorded.name.clone(),
                    kind: recorded.kind.clone(),
                    diff_type: DiffType::Delete,
                    details: Vec::new(),
                    old_hash: Some(recorded.hash.clone()),
                    new_hash: None,
                    dependencies: recorded.dependencies.clone(),
                });
            }
        }

        let count = |t: DiffType| diffs.iter().filter(|d| d.diff_type == t).count();
        let creates = count(DiffType::Create);
        let updates = count(DiffType::Update);
        let replaces = count(DiffType::Replace);
        let deletes = count(DiffType::Delete);
        let unchanged = count(DiffType::NoChange);

        DiffResult {
            diffs,
            creates,
            updates,
            replaces,
            deletes,
            unchanged,
        }
    }
}

impl DiffResult {
    /// Returns true if there are any changes.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }

    /// Returns the total number of changes.
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.creates + self.updates + self.replaces + self.deletes
    }

    /// Filters to only diffs that require action.
    #[must_use]
    pub fn actionable_diffs(&self) -> Vec<&ResourceDiff> {
        self.diffs
            .iter()
            .filter(|d| d.diff_type != DiffType::NoChange)
            .collect()
    }
}

impl std::fmt::Display for DiffType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::NoChange => "no change",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ResourceDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.diff_type)?;
        if !self.details.is_empty() {
            write!(f, " (")?;
            for (i, detail) in self.details.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", detail.field)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Property, Resource, ResourceKind};
    use crate::state::ResourceState;

    fn graph() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        let vpc = graph
            .declare(Resource::new(ResourceKind::Vpc, "vpc").with("cidrBlock", "10.0.0.0/16"))
            .expect("vpc");
        graph
            .declare(
                Resource::new(ResourceKind::Subnet, "public-subnet-0")
                    .with("vpcId", vpc.id())
                    .with("cidrBlock", "10.0.0.0/24"),
            )
            .expect("subnet");
        graph
    }

    fn record(graph: &ResourceGraph) -> StackState {
        let hasher = StackHasher::new();
        let mut state = StackState::new("shop", "dev");
        for (pos, resource) in graph.iter().enumerate() {
            state.set_resource(
                ResourceState::new(
                    &resource.name,
                    resource.kind.type_token(),
                    &hasher.hash_resource(resource),
                    pos,
                )
                .with_dependencies(resource.referenced_names().into_iter().map(String::from).collect()),
            );
        }
        state
    }

    #[test]
    fn test_everything_created_without_state() {
        let diff = DiffEngine::new().compute_diff(&graph(), None);
        assert_eq!(diff.creates, 2);
        assert!(diff.has_changes());
    }

    #[test]
    fn test_diff_against_own_state_is_empty() {
        let graph = graph();
        let state = record(&graph);
        let diff = DiffEngine::new().compute_diff(&graph, Some(&state));
        assert!(!diff.has_changes());
        assert_eq!(diff.unchanged, 2);
        assert!(diff.actionable_diffs().is_empty());
    }

    #[test]
    fn test_changed_property_is_update() {
        let state = record(&graph());
        let changed = ResourceGraph::from_resources(vec![
            Resource::new(ResourceKind::Vpc, "vpc").with("cidrBlock", "10.0.0.0/16"),
            Resource::new(ResourceKind::Subnet, "public-subnet-0")
                .with("vpcId", Property::reference("vpc", "id"))
                .with("cidrBlock", "10.0.7.0/24"),
        ])
        .expect("graph");

        let diff = DiffEngine::new().compute_diff(&changed, Some(&state));
        assert_eq!(diff.updates, 1);
        let update = &diff.actionable_diffs()[0];
        assert_eq!(update.name, "public-subnet-0");
        assert_eq!(update.details[0].field, "properties");
    }

    #[test]
    fn test_changed_type_is_replace() {
        let mut state = record(&graph());
        if let Some(vpc) = state.resources.get_mut("vpc") {
            vpc.kind = String::from("aws:ec2/defaultVpc:DefaultVpc");
        }
        let diff = DiffEngine::new().compute_diff(&graph(), Some(&state));
        assert_eq!(diff.replaces, 1);
        assert_eq!(diff.updates, 0);
    }

    #[test]
    fn test_removed_resources_deleted_in_reverse_order() {
        let state = record(&graph());
        let empty = ResourceGraph::new();
        let diff = DiffEngine::new().compute_diff(&empty, Some(&state));

        let names: Vec<_> = diff.diffs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["public-subnet-0", "vpc"]);
        assert_eq!(diff.deletes, 2);
        assert_eq!(diff.diffs[0].dependencies, vec!["vpc"]);
    }
}
