//! State types for tracking rendered stacks.
//!
//! The state records what the last `apply` rendered: one entry per declared
//! resource with its type, property hash and declaration position. The
//! planner diffs the next declaration pass against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// Number of history entries kept.
pub const MAX_HISTORY: usize = 100;

/// The complete recorded state of a stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackState {
    /// State format version.
    pub version: String,
    /// Project name.
    pub project: String,
    /// Environment name.
    pub environment: String,
    /// Hash of the last applied configuration.
    pub config_hash: String,
    /// Hash of the last rendered graph.
    #[serde(default)]
    pub stack_hash: String,
    /// Recorded resources by logical name.
    pub resources: BTreeMap<String, ResourceState>,
    /// Names of the published outputs.
    #[serde(default)]
    pub outputs: Vec<String>,
    /// The stack document written by the last apply.
    #[serde(default)]
    pub document: Option<DocumentRecord>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Recent operations, oldest first.
    #[serde(default)]
    pub history: Vec<StackHistoryEntry>,
}

/// Recorded state of a single resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceState {
    /// Logical name.
    pub name: String,
    /// Provider type token.
    pub kind: String,
    /// Hash of the declaration.
    pub hash: String,
    /// Position in declaration order.
    pub position: usize,
    /// Names of the resources this one referenced.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// When the resource was first recorded.
    pub created_at: DateTime<Utc>,
    /// When the declaration last changed.
    pub updated_at: DateTime<Utc>,
}

/// Where and what the last apply rendered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Path the document was written to.
    pub path: String,
    /// `json` or `yaml`.
    pub format: String,
    /// Graph hash embedded in the document.
    pub stack_hash: String,
    /// When it was written.
    pub written_at: DateTime<Utc>,
}

/// A single entry in the stack history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackHistoryEntry {
    /// When the operation occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of operation.
    pub operation: StackOperation,
    /// Configuration hash at the time.
    pub config_hash: String,
    /// Resources affected.
    pub resources: Vec<String>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Optional error message.
    #[serde(default)]
    pub error: Option<String>,
}

/// Types of recorded operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StackOperation {
    /// First apply.
    Create,
    /// Later apply.
    Update,
    /// Destruction.
    Destroy,
}

impl StackState {
    /// Creates a new empty state.
    #[must_use]
    pub fn new(project: &str, environment: &str) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            project: project.to_string(),
            environment: environment.to_string(),
            config_hash: String::new(),
            stack_hash: String::new(),
            resources: BTreeMap::new(),
            outputs: Vec::new(),
            document: None,
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Gets a resource by name.
    #[must_use]
    pub fn get_resource(&self, name: &str) -> Option<&ResourceState> {
        self.resources.get(name)
    }

    /// Adds or replaces a resource.
    ///
    /// The original creation time survives when the resource was already recorded.
    pub fn set_resource(&mut self, mut resource: ResourceState) {
        if let Some(existing) = self.resources.get(&resource.name) {
            resource.created_at = existing.created_at;
        }
        self.resources.insert(resource.name.clone(), resource);
        self.last_updated = Utc::now();
    }

    /// Removes a resource by name.
    pub fn remove_resource(&mut self, name: &str) -> Option<ResourceState> {
        let result = self.resources.remove(name);
        if result.is_some() {
            self.last_updated = Utc::now();
        }
        result
    }

    /// Returns recorded resources in declaration order.
    #[must_use]
    pub fn ordered_resources(&self) -> Vec<&ResourceState> {
        let mut resources: Vec<_> = self.resources.values().collect();
        resources.sort_by_key(|r| r.position);
        resources
    }

    /// Adds a history entry, dropping the oldest past [`MAX_HISTORY`].
    pub fn add_history(&mut self, entry: StackHistoryEntry) {
        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(entry);
    }

    /// Records a freshly written document.
    ///
    /// Returns false when the same graph was already rendered to the same path.
    pub fn record_document(&mut self, path: &Path, format: &str, stack_hash: &str) -> bool {
        let path = path.display().to_string();
        let unchanged = self.document.as_ref().is_some_and(|d| {
            d.path == path && d.format == format && d.stack_hash == stack_hash
        });

        self.document = Some(DocumentRecord {
            path,
            format: format.to_string(),
            stack_hash: stack_hash.to_string(),
            written_at: Utc::now(),
        });
        self.stack_hash = stack_hash.to_string();
        !unchanged
    }

    /// Returns true if this state belongs to the given project and environment.
    #[must_use]
    pub fn belongs_to(&self, project: &str, environment: &str) -> bool {
        self.project == project && self.environment == environment
    }
}

impl ResourceState {
    /// Creates a new resource record.
    #[must_use]
    pub fn new(name: &str, kind: &str, hash: &str, position: usize) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            hash: hash.to_string(),
            position,
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the recorded dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

impl StackHistoryEntry {
    /// Creates a new history entry.
    #[must_use]
    pub fn new(operation: StackOperation, config_hash: &str, resources: Vec<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            config_hash: config_hash.to_string(),
            resources,
            success: true,
            error: None,
        }
    }

    /// Creates a failed history entry.
    #[must_use]
    pub fn failed(
        operation: StackOperation,
        config_hash: &str,
        resources: Vec<String>,
        error: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            config_hash: config_hash.to_string(),
            resources,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

impl std::fmt::Display for StackOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        };
        write!(f, "{op}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_capped() {
        let mut state = StackState::new("shop", "dev");
        for i in 0..(MAX_HISTORY + 5) {
            state.add_history(StackHistoryEntry::new(
                StackOperation::Update,
                &format!("hash-{i}"),
                Vec::new(),
            ));
        }
        assert_eq!(state.history.len(), MAX_HISTORY);
        assert_eq!(state.history[0].config_hash, "hash-5");
    }

    #[test]
    fn test_set_resource_keeps_creation_time() {
        let mut state = StackState::new("shop", "dev");
        let first = ResourceState::new("vpc", "aws:ec2/vpc:Vpc", "aaa", 0);
        let created = first.created_at;
        state.set_resource(first);
        state.set_resource(ResourceState::new("vpc", "aws:ec2/vpc:Vpc", "bbb", 0));

        let recorded = state.get_resource("vpc").expect("vpc");
        assert_eq!(recorded.created_at, created);
        assert_eq!(recorded.hash, "bbb");
    }

    #[test]
    fn test_ordered_resources() {
        let mut state = StackState::new("shop", "dev");
        state.set_resource(ResourceState::new("b", "t", "h", 1));
        state.set_resource(ResourceState::new("z", "t", "h", 0));
        let names: Vec<_> = state.ordered_resources().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["z", "b"]);
        assert!(state.belongs_to("shop", "dev"));
        assert!(!state.belongs_to("shop", "prod"));
    }

    #[test]
    fn test_failed_entry() {
        let entry = StackHistoryEntry::failed(StackOperation::Destroy, "h", vec![], "boom");
        assert!(!entry.success);
        assert_eq!(entry.error.as_deref(), Some("boom"));
        assert_eq!(entry.operation.to_string(), "destroy");
    }

    #[test]
    fn test_record_document_reports_rerender() {
        let mut state = StackState::new("shop", "dev");
        let path = Path::new(".stratus/stack.json");

        assert!(state.record_document(path, "json", "g1"));
        assert_eq!(state.stack_hash, "g1");
        assert!(!state.record_document(path, "json", "g1"));
        assert!(state.record_document(path, "json", "g2"));
        assert!(state.record_document(Path::new("out/stack.yaml"), "yaml", "g2"));
        assert_eq!(state.document.as_ref().map(|d| d.format.as_str()), Some("yaml"));
    }
}
