//! The ordered resource graph.
//!
//! Resources are declared one at a time. A declaration may only reference
//! resources declared before it, so a graph built with [`ResourceGraph::declare`]
//! is acyclic and its declaration order is already a valid build order.

use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::error::GraphError;

use super::resource::{Property, Resource};

/// Handle to a declared resource, used to build references to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    name: String,
}

impl ResourceHandle {
    /// Returns the logical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a reference to the resource's `id` attribute.
    #[must_use]
    pub fn id(&self) -> Property {
        self.attr("id")
    }

    /// Returns a reference to the resource's `arn` attribute.
    #[must_use]
    pub fn arn(&self) -> Property {
        self.attr("arn")
    }

    /// Returns a reference to an arbitrary attribute.
    #[must_use]
    pub fn attr(&self, attribute: &str) -> Property {
        Property::reference(self.name.clone(), attribute)
    }
}

/// Resources in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
}

impl ResourceGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from resources in any order.
    ///
    /// Forward references are allowed here; the result is still required to be
    /// acyclic and fully resolved.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate names, unresolved references or cycles.
    #[cfg(test)]
    pub(crate) fn from_resources(resources: Vec<Resource>) -> Result<Self, GraphError> {
        let mut index = HashMap::with_capacity(resources.len());
        for (pos, resource) in resources.iter().enumerate() {
            if index.insert(resource.name.clone(), pos).is_some() {
                return Err(GraphError::DuplicateResource {
                    name: resource.name.clone(),
                });
            }
        }

        let graph = Self { resources, index };
        graph.validate()?;
        Ok(graph)
    }

    /// Declares a resource after everything it references.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a referenced resource has not
    /// been declared yet.
    pub fn declare(&mut self, resource: Resource) -> Result<ResourceHandle, GraphError> {
        if self.index.contains_key(&resource.name) {
            return Err(GraphError::DuplicateResource {
                name: resource.name,
            });
        }

        if let Some(target) = resource
            .referenced_names()
            .into_iter()
            .find(|target| !self.index.contains_key(*target))
        {
            return Err(GraphError::UndeclaredReference {
                resource: resource.name.clone(),
                target: target.to_string(),
            });
        }

        debug!("Declared {} ({})", resource.name, resource.kind);
        let handle = ResourceHandle {
            name: resource.name.clone(),
        };
        self.index.insert(resource.name.clone(), self.resources.len());
        self.resources.push(resource);
        Ok(handle)
    }

    /// Returns the number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Iterates resources in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Returns the resources in declaration order.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Looks up a resource by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.index.get(name).map(|&pos| &self.resources[pos])
    }

    /// Returns the declaration position of a resource.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Returns the direct dependencies of `name`, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is unknown.
    pub fn dependencies(&self, name: &str) -> Result<Vec<&str>, GraphError> {
        let resource = self.get(name).ok_or_else(|| GraphError::UnknownResource {
            name: name.to_string(),
        })?;

        let mut deps: Vec<&str> = resource.referenced_names().into_iter().collect();
        deps.sort_by_key(|dep| self.position(dep));
        Ok(deps)
    }

    /// Returns the resources that reference `name` directly, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is unknown.
    pub fn dependents(&self, name: &str) -> Result<Vec<&str>, GraphError> {
        if !self.index.contains_key(name) {
            return Err(GraphError::UnknownResource {
                name: name.to_string(),
            });
        }

        Ok(self
            .resources
            .iter()
            .filter(|r| r.referenced_names().contains(name))
            .map(|r| r.name.as_str())
            .collect())
    }

    /// Computes a build order, preferring declaration order among ready resources.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference is unresolved or the graph has a cycle.
    pub fn topological_order(&self) -> Result<Vec<&str>, GraphError> {
        let count = self.resources.len();
        let mut in_degree = vec![0usize; count];
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); count];

        for (pos, resource) in self.resources.iter().enumerate() {
            for target in resource.referenced_names() {
                let dep = self.index.get(target).copied().ok_or_else(|| {
                    GraphError::UndeclaredReference {
                        resource: resource.name.clone(),
                        target: target.to_string(),
                    }
                })?;
                edges[dep].push(pos);
                in_degree[pos] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(pos) = ready.pop_first() {
            order.push(self.resources[pos].name.as_str());
            for &next in &edges[pos] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() < count {
            let cycle: Vec<&str> = (0..count)
                .filter(|&i| in_degree[i] > 0)
                .map(|i| self.resources[i].name.as_str())
                .collect();
            return Err(GraphError::CircularDependency {
                cycle: cycle.join(" -> "),
            });
        }

        Ok(order)
    }

    /// Checks that every reference resolves and the graph is acyclic.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.topological_order().map(|_| ())
    }

    /// Returns every secret environment variable the graph needs.
    #[must_use]
    pub fn secrets(&self) -> BTreeSet<&str> {
        self.resources.iter().flat_map(Resource::secrets).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::resource::ResourceKind;

    fn sg(name: &str) -> Resource {
        Resource::new(ResourceKind::SecurityGroup, name).with("vpcId", Property::reference("vpc", "id"))
    }

    fn sg_from(name: &str, source: &str) -> Resource {
        sg(name).with(
            "ingress",
            Property::list([Property::map([(
                "securityGroups",
                Property::list([Property::reference(source, "id")]),
            )])]),
        )
    }

    #[test]
    fn test_declare_in_order() {
        let mut graph = ResourceGraph::new();
        let vpc = graph
            .declare(Resource::new(ResourceKind::Vpc, "vpc"))
            .expect("vpc");
        graph
            .declare(Resource::new(ResourceKind::Subnet, "subnet-0").with("vpcId", vpc.id()))
            .expect("subnet");

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.dependencies("subnet-0").expect("deps"), vec!["vpc"]);
        assert_eq!(graph.dependents("vpc").expect("dependents"), vec!["subnet-0"]);
    }

    #[test]
    fn test_forward_reference_rejected() {
        let mut graph = ResourceGraph::new();
        let err = graph
            .declare(Resource::new(ResourceKind::Subnet, "subnet-0").with("vpcId", Property::reference("vpc", "id")))
            .expect_err("should fail");
        assert_eq!(
            err,
            GraphError::UndeclaredReference {
                resource: String::from("subnet-0"),
                target: String::from("vpc"),
            }
        );
        assert!(graph.is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut graph = ResourceGraph::new();
        graph.declare(Resource::new(ResourceKind::Vpc, "vpc")).expect("vpc");
        assert!(matches!(
            graph.declare(Resource::new(ResourceKind::Vpc, "vpc")),
            Err(GraphError::DuplicateResource { .. })
        ));
    }

    #[test]
    fn test_security_group_chain_is_acyclic() {
        let mut graph = ResourceGraph::new();
        graph.declare(Resource::new(ResourceKind::Vpc, "vpc")).expect("vpc");
        graph.declare(sg("lb-sg")).expect("lb");
        graph.declare(sg_from("app-sg", "lb-sg")).expect("app");
        graph.declare(sg_from("db-sg", "app-sg")).expect("db");

        assert_eq!(
            graph.topological_order().expect("order"),
            vec!["vpc", "lb-sg", "app-sg", "db-sg"]
        );
    }

    #[test]
    fn test_mutual_security_group_references_rejected() {
        let mut graph = ResourceGraph::new();
        graph.declare(Resource::new(ResourceKind::Vpc, "vpc")).expect("vpc");
        assert!(graph.declare(sg_from("app-sg", "db-sg")).is_err());

        let cyclic = ResourceGraph::from_resources(vec![
            Resource::new(ResourceKind::Vpc, "vpc"),
            sg_from("app-sg", "db-sg"),
            sg_from("db-sg", "app-sg"),
        ]);
        match cyclic {
            Err(GraphError::CircularDependency { cycle }) => {
                assert!(cycle.contains("app-sg"));
                assert!(cycle.contains("db-sg"));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_from_resources_orders_forward_references() {
        let graph = ResourceGraph::from_resources(vec![
            Resource::new(ResourceKind::Subnet, "subnet-0").with("vpcId", Property::reference("vpc", "id")),
            Resource::new(ResourceKind::Vpc, "vpc"),
        ])
        .expect("graph");

        assert_eq!(graph.topological_order().expect("order"), vec!["vpc", "subnet-0"]);
    }

    #[test]
    fn test_from_resources_rejects_dangling_reference() {
        let result = ResourceGraph::from_resources(vec![
            Resource::new(ResourceKind::Subnet, "subnet-0").with("vpcId", Property::reference("vpc", "id")),
        ]);
        assert!(matches!(result, Err(GraphError::UndeclaredReference { .. })));
    }

    #[test]
    fn test_secrets_collected() {
        let mut graph = ResourceGraph::new();
        graph
            .declare(Resource::new(ResourceKind::DbInstance, "db").with("password", Property::secret("DB_PASSWORD")))
            .expect("db");
        assert!(graph.secrets().contains("DB_PASSWORD"));
    }
}
