//! Hashing for change detection.
//!
//! Each declared resource is hashed over its canonical JSON form (type plus
//! properties in key order). The stack hash covers every resource hash in
//! declaration order, so reordering declarations changes it.

use sha2::{Digest, Sha256};

use crate::config::StackConfig;
use crate::graph::{Resource, ResourceGraph};

/// Hasher for resources, stacks and configurations.
#[derive(Debug, Default)]
pub struct StackHasher;

impl StackHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the hash of a single resource.
    ///
    /// The logical name is part of the hash so that renames show up as
    /// delete plus create rather than as an update.
    #[must_use]
    pub fn hash_resource(&self, resource: &Resource) -> String {
        let mut hasher = Sha256::new();
        hasher.update(resource.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(resource.kind.type_token().as_bytes());
        hasher.update([0u8]);
        // Property maps are BTreeMaps, so serialization order is stable.
        let canonical = serde_json::to_vec(&resource.properties).unwrap_or_default();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }

    /// Computes the hash of a whole graph.
    #[must_use]
    pub fn hash_graph(&self, graph: &ResourceGraph) -> String {
        let mut hasher = Sha256::new();
        for resource in graph.iter() {
            hasher.update(self.hash_resource(resource).as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Computes the hash of a configuration.
    #[must_use]
    pub fn hash_config(&self, config: &StackConfig) -> String {
        let canonical = serde_json::to_vec(config).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes to determine if they are equal.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Property, ResourceKind};

    fn subnet(name: &str, cidr: &str) -> Resource {
        Resource::new(ResourceKind::Subnet, name)
            .with("cidrBlock", cidr)
            .with("vpcId", Property::reference("vpc", "id"))
    }

    #[test]
    fn test_resource_hash_deterministic() {
        let hasher = StackHasher::new();
        let a = subnet("public-subnet-0", "10.0.0.0/24");
        assert_eq!(hasher.hash_resource(&a), hasher.hash_resource(&a.clone()));
    }

    #[test]
    fn test_property_change_changes_hash() {
        let hasher = StackHasher::new();
        let a = subnet("public-subnet-0", "10.0.0.0/24");
        let b = subnet("public-subnet-0", "10.0.1.0/24");
        assert_ne!(hasher.hash_resource(&a), hasher.hash_resource(&b));
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let hasher = StackHasher::new();
        let a = Resource::new(ResourceKind::Vpc, "vpc")
            .with("cidrBlock", "10.0.0.0/16")
            .with("enableDnsHostnames", true);
        let b = Resource::new(ResourceKind::Vpc, "vpc")
            .with("enableDnsHostnames", true)
            .with("cidrBlock", "10.0.0.0/16");
        assert_eq!(hasher.hash_resource(&a), hasher.hash_resource(&b));
    }

    #[test]
    fn test_graph_hash_depends_on_order() {
        let hasher = StackHasher::new();
        let vpc = Resource::new(ResourceKind::Vpc, "vpc");
        let igw = Resource::new(ResourceKind::InternetGateway, "igw");
        let forward = ResourceGraph::from_resources(vec![vpc.clone(), igw.clone()]).expect("graph");
        let backward = ResourceGraph::from_resources(vec![igw, vpc]).expect("graph");
        assert_ne!(hasher.hash_graph(&forward), hasher.hash_graph(&backward));
    }

    #[test]
    fn test_short_hash() {
        let hasher = StackHasher::new();
        let full_hash = "abcdef1234567890abcdef1234567890";
        let short = hasher.short_hash(full_hash);

        assert_eq!(short, "abcdef12");
        assert_eq!(short.len(), 8);
    }

    #[test]
    fn test_hashes_match() {
        assert!(StackHasher::hashes_match("abc123", "abc123"));
        assert!(!StackHasher::hashes_match("abc123", "abc124"));
        assert!(!StackHasher::hashes_match("abc123", "abc12"));
    }
}
