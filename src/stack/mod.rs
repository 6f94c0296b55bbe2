//! Stack declaration.
//!
//! [`declare_stack`] is the single declaration pass: it selects zones, derives
//! the subnet layout and declares every resource in dependency order. Each
//! submodule declares one part of the stack and hands back the handles later
//! parts reference.

mod compute;
mod database;
mod dns;
mod document;
mod network;
mod notifications;
mod outputs;
mod security;

pub use document::{DocumentFormat, StackDocument};

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::StackConfig;
use crate::error::{GraphError, Result};
use crate::graph::{Property, Resource, ResourceGraph, ResourceHandle};
use crate::network::{plan_subnets, select_zones, SubnetAllocator, SubnetLayout, ZoneSource};

/// The result of a declaration pass.
#[derive(Debug, Clone)]
pub struct DeclaredStack {
    /// Zones the stack spreads across, in provider order.
    pub zones: Vec<String>,
    /// Derived subnet blocks.
    pub layout: SubnetLayout,
    /// Every declared resource, in declaration order.
    pub graph: ResourceGraph,
    /// Published outputs.
    pub outputs: BTreeMap<String, Property>,
}

/// Accumulates declarations, merging project tags into taggable resources.
#[derive(Debug)]
pub(crate) struct StackBuilder {
    graph: ResourceGraph,
    tags: BTreeMap<String, String>,
    outputs: BTreeMap<String, Property>,
}

impl StackBuilder {
    pub(crate) fn new(tags: BTreeMap<String, String>) -> Self {
        Self {
            graph: ResourceGraph::new(),
            tags,
            outputs: BTreeMap::new(),
        }
    }

    /// Declares a resource after merging project tags into it.
    ///
    /// Tags set on the resource itself win over project tags.
    pub(crate) fn declare(&mut self, mut resource: Resource) -> Result<ResourceHandle> {
        if resource.kind.is_taggable() {
            let mut tags: BTreeMap<String, Property> = self
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), Property::str(v.clone())))
                .collect();
            if let Some(Property::Map(own)) = resource.properties.remove("tags") {
                tags.extend(own);
            }
            resource.properties.insert(String::from("tags"), Property::Map(tags));
        }

        Ok(self.graph.declare(resource)?)
    }

    /// Publishes an output; it may only reference declared resources.
    pub(crate) fn output(&mut self, name: &str, value: Property) -> Result<()> {
        let mut refs = Vec::new();
        value.collect_refs(&mut refs);
        if let Some(missing) = refs.iter().find(|r| self.graph.get(&r.resource).is_none()) {
            return Err(GraphError::UndeclaredReference {
                resource: format!("output:{name}"),
                target: missing.resource.clone(),
            }
            .into());
        }

        self.outputs.insert(name.to_string(), value);
        Ok(())
    }
}

/// Builds a `{ Name = name }` tag map.
pub(crate) fn name_tag(name: &str) -> Property {
    Property::map([("Name", Property::str(name))])
}

/// Builds a list of `id` references.
pub(crate) fn ids(handles: &[ResourceHandle]) -> Property {
    Property::list(handles.iter().map(ResourceHandle::id))
}

/// Selects zones and derives the subnet layout.
///
/// # Errors
///
/// Returns an error if no zone is available or an address cannot be derived.
pub fn plan_layout(config: &StackConfig, source: &dyn ZoneSource) -> Result<(Vec<String>, SubnetLayout)> {
    let zones = select_zones(source, config.network.max_zones)?;
    let allocator = SubnetAllocator::new(config.network.vpc_cidr, config.network.subnet_mask)?;
    let layout = plan_subnets(&allocator, &zones)?;
    Ok((zones, layout))
}

/// Runs the declaration pass.
///
/// # Errors
///
/// Returns an error if zone selection or subnet allocation fails, or a
/// declaration breaks the ordering contract. Nothing is returned on failure.
pub fn declare_stack(config: &StackConfig, source: &dyn ZoneSource) -> Result<DeclaredStack> {
    info!("Declaring stack {}", config.qualified_name());

    let (zones, layout) = plan_layout(config, source)?;
    let mut builder = StackBuilder::new(config.default_tags());

    let net = network::declare(&mut builder, &config.network, &layout)?;
    let groups = security::declare(&mut builder, config, &net)?;
    let pipeline = config
        .notifications
        .as_ref()
        .map(|n| notifications::declare(&mut builder, n))
        .transpose()?;
    let db = match (&config.database, &groups.database) {
        (Some(db_config), Some(db_group)) => {
            Some(database::declare(&mut builder, db_config, &net, db_group)?)
        }
        _ => None,
    };
    let app = config
        .compute
        .as_ref()
        .map(|compute| {
            compute::declare(
                &mut builder,
                config,
                compute,
                &compute::Inputs {
                    network: &net,
                    groups: &groups,
                    database: db.as_ref(),
                    topic: pipeline.as_ref().map(|p| &p.topic),
                },
            )
        })
        .transpose()?;
    let record = match (&config.dns, &app) {
        (Some(dns_config), Some(app)) => Some(dns::declare(&mut builder, dns_config, app)?),
        _ => None,
    };

    outputs::publish(
        &mut builder,
        &outputs::Declared {
            network: &net,
            groups: &groups,
            pipeline: pipeline.as_ref(),
            database: db.as_ref(),
            app: app.as_ref(),
            record: record.as_ref(),
        },
    )?;

    let StackBuilder { graph, outputs, .. } = builder;
    graph.validate()?;
    debug!("Declared {} resources and {} outputs", graph.len(), outputs.len());

    Ok(DeclaredStack {
        zones,
        layout,
        graph,
        outputs,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::config::{ConfigParser, StackConfig};

    pub(crate) const MINIMAL: &str = r"
project:
  name: shop
  region: us-east-1
network:
  vpc_name: shop-vpc
  vpc_cidr: 10.0.0.0/16
  availability_zones: [us-east-1a, us-east-1b, us-east-1c, us-east-1d]
";

    pub(crate) const FULL: &str = r"
project:
  name: shop
  environment: prod
  region: us-east-1
network:
  vpc_name: shop-vpc
  vpc_cidr: 10.0.0.0/16
  availability_zones: [us-east-1a, us-east-1b, us-east-1c]
security:
  application_port: 3000
  ssh_cidr: 203.0.113.0/24
database:
  identifier: shop-db
  engine_version: '15.4'
  db_name: shop
  username: shop
  parameter_group_name: shop-pg
  parameter_group_family: postgres15
  subnet_group_name: shop-db-subnets
compute:
  ami_id: ami-0123456789abcdef0
  key_name: deploy
autoscaling:
  scale_up_threshold: 70
  scale_down_threshold: 20
dns:
  zone_id: Z123
  record_name: shop.example.com
notifications:
  package_path: dist/handler.zip
  mail_domain: mail.example.com
  bucket_name: shop-submissions
  gcp_project: shop-gcp
  service_account_id: shop-lambda
tags:
  Team: storefront
";

    pub(crate) fn config(yaml: &str) -> StackConfig {
        ConfigParser::new().parse_yaml(yaml, None).expect("parse")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{config, FULL, MINIMAL};
    use super::*;
    use crate::error::{AllocationError, StratusError};
    use crate::graph::ResourceKind;
    use crate::network::zones::MockZoneSource;
    use crate::network::ConfiguredZones;
    use crate::planner::StackHasher;

    fn zones_of(config: &StackConfig) -> ConfiguredZones {
        ConfiguredZones::new(config.network.availability_zones.clone())
    }

    fn names(stack: &DeclaredStack) -> Vec<&str> {
        stack.graph.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_minimal_stack_declaration_order() {
        let config = config(MINIMAL);
        let stack = declare_stack(&config, &zones_of(&config)).expect("stack");

        assert_eq!(stack.zones, vec!["us-east-1a", "us-east-1b", "us-east-1c"]);
        assert_eq!(
            &names(&stack)[..9],
            &[
                "shop-vpc",
                "public-subnet-0",
                "private-subnet-0",
                "public-subnet-1",
                "private-subnet-1",
                "public-subnet-2",
                "private-subnet-2",
                "internet-gateway",
                "public-rt",
            ]
        );
        assert!(names(&stack).contains(&"private-rt-2"));
        assert!(stack.graph.get("db-sg").is_none());
        assert!(stack.outputs.contains_key("vpcId"));
        assert!(!stack.outputs.contains_key("instancePublicIp"));
    }

    #[test]
    fn test_subnet_blocks_follow_allocation_policy() {
        let config = config(MINIMAL);
        let stack = declare_stack(&config, &zones_of(&config)).expect("stack");

        let cidr = |name: &str| {
            stack
                .graph
                .get(name)
                .and_then(|r| r.properties.get("cidrBlock"))
                .cloned()
        };
        assert_eq!(cidr("public-subnet-0"), Some(Property::str("10.0.0.0/24")));
        assert_eq!(cidr("public-subnet-2"), Some(Property::str("10.0.2.0/24")));
        assert_eq!(cidr("private-subnet-0"), Some(Property::str("10.0.3.0/24")));
        assert_eq!(cidr("private-subnet-2"), Some(Property::str("10.0.5.0/24")));
    }

    #[test]
    fn test_allocation_overflow_aborts_declaration() {
        let mut config = config(MINIMAL);
        config.network.vpc_cidr = "10.0.251.0/16".parse().expect("cidr");
        let err = declare_stack(&config, &zones_of(&config)).expect_err("overflow");
        assert!(matches!(
            err,
            StratusError::Allocation(AllocationError::AddressSpaceExhausted { octet: 256, .. })
        ));
    }

    #[test]
    fn test_zone_source_is_consulted_once() {
        let config = config(MINIMAL);
        let mut source = MockZoneSource::new();
        source
            .expect_available_zones()
            .times(1)
            .returning(|| Ok(vec![String::from("eu-west-1b"), String::from("eu-west-1a")]));

        let stack = declare_stack(&config, &source).expect("stack");
        assert_eq!(stack.layout.zones[0].zone, "eu-west-1b");
        // Two zones: private subnets start at index 2.
        assert_eq!(stack.layout.zones[0].private.to_string(), "10.0.2.0/24");
    }

    #[test]
    fn test_project_tags_merged_into_taggable_resources() {
        let config = config(FULL);
        let stack = declare_stack(&config, &zones_of(&config)).expect("stack");

        for resource in stack.graph.iter() {
            let tags = resource.properties.get("tags");
            if resource.kind.is_taggable() {
                let Some(Property::Map(tags)) = tags else {
                    panic!("{} has no tags", resource.name);
                };
                assert_eq!(tags.get("Team"), Some(&Property::str("storefront")));
                assert_eq!(tags.get("Environment"), Some(&Property::str("prod")));
            } else {
                assert!(tags.is_none(), "{} should not carry tags", resource.name);
            }
        }

        let vpc = stack.graph.get("shop-vpc").expect("vpc");
        let Some(Property::Map(tags)) = vpc.properties.get("tags") else {
            panic!("vpc tags");
        };
        assert_eq!(tags.get("Name"), Some(&Property::str("shop-vpc")));
    }

    #[test]
    fn test_full_stack_is_valid_and_ordered() {
        let config = config(FULL);
        let stack = declare_stack(&config, &zones_of(&config)).expect("stack");
        let order = stack.graph.topological_order().expect("order");
        assert_eq!(order, names(&stack));

        let position = |name: &str| stack.graph.position(name).expect(name);
        assert!(position("lb-sg") < position("app-sg"));
        assert!(position("app-sg") < position("db-sg"));
        assert!(position("db-sg") < position("shop-db"));
        assert!(position("app-notifications") < position("app-launch-template"));
        assert!(position("app-lb") < position("dns-record"));

        assert_eq!(
            stack.graph.secrets().into_iter().collect::<Vec<_>>(),
            vec!["STRATUS_DB_PASSWORD", "STRATUS_MAIL_API_KEY"]
        );
        for key in [
            "loadBalancerDnsName",
            "databaseEndpoint",
            "dnsRecordName",
            "dnsRecordType",
            "snsTopicArn",
            "bucketName",
            "serviceAccountEmail",
        ] {
            assert!(stack.outputs.contains_key(key), "missing output {key}");
        }
        assert!(!stack.outputs.contains_key("instancePublicIp"));
    }

    #[test]
    fn test_declaration_is_deterministic() {
        let config = config(FULL);
        let hasher = StackHasher::new();
        let first = declare_stack(&config, &zones_of(&config)).expect("stack");
        let second = declare_stack(&config, &zones_of(&config)).expect("stack");
        assert_eq!(hasher.hash_graph(&first.graph), hasher.hash_graph(&second.graph));
    }

    #[test]
    fn test_output_must_reference_declared_resource() {
        let mut builder = StackBuilder::new(BTreeMap::new());
        let err = builder
            .output("vpcId", Property::reference("missing", "id"))
            .expect_err("undeclared");
        assert!(err.to_string().contains("output:vpcId"));
    }

    #[test]
    fn test_own_tags_win_over_project_tags() {
        let tags = BTreeMap::from([(String::from("Name"), String::from("project"))]);
        let mut builder = StackBuilder::new(tags);
        builder
            .declare(Resource::new(ResourceKind::Vpc, "vpc").with("tags", name_tag("own")))
            .expect("vpc");
        let Some(Property::Map(tags)) = builder.graph.get("vpc").and_then(|r| r.properties.get("tags")) else {
            panic!("tags");
        };
        assert_eq!(tags.get("Name"), Some(&Property::str("own")));
    }
}
