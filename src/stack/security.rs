//! Security groups.
//!
//! Groups are declared load balancer first, then application, then database,
//! each admitting traffic only from the group before it. A standalone
//! instance has no load balancer in front of it, so its group opens the
//! application port to everyone instead. Rules name their source group by id,
//! so the chain must never loop back.

use crate::config::StackConfig;
use crate::error::Result;
use crate::graph::{Property, Resource, ResourceHandle, ResourceKind};
use crate::network::AddressBlock;

use super::network::Network;
use super::{name_tag, StackBuilder};

const SSH_PORT: u16 = 22;

/// Handles to the declared security groups.
#[derive(Debug, Clone)]
pub(crate) struct SecurityGroups {
    pub load_balancer: ResourceHandle,
    pub application: ResourceHandle,
    pub database: Option<ResourceHandle>,
}

impl SecurityGroups {
    /// Every declared group, in declaration order.
    pub(crate) fn all(&self) -> Vec<ResourceHandle> {
        let mut groups = vec![self.load_balancer.clone(), self.application.clone()];
        groups.extend(self.database.clone());
        groups
    }
}

fn tcp_from_cidr(port: u16, cidr: AddressBlock, description: &str) -> Property {
    Property::map([
        ("description", Property::str(description)),
        ("protocol", Property::str("tcp")),
        ("fromPort", Property::from(port)),
        ("toPort", Property::from(port)),
        ("cidrBlocks", Property::list([Property::str(cidr.to_string())])),
    ])
}

fn tcp_from_group(port: u16, group: &ResourceHandle, description: &str) -> Property {
    Property::map([
        ("description", Property::str(description)),
        ("protocol", Property::str("tcp")),
        ("fromPort", Property::from(port)),
        ("toPort", Property::from(port)),
        ("securityGroups", Property::list([group.id()])),
    ])
}

fn allow_all_egress() -> Property {
    Property::list([Property::map([
        ("protocol", Property::str("-1")),
        ("fromPort", Property::lit(0)),
        ("toPort", Property::lit(0)),
        (
            "cidrBlocks",
            Property::list([Property::str(AddressBlock::ANYWHERE.to_string())]),
        ),
    ])])
}

fn group(name: &str, vpc: &ResourceHandle, description: &str, ingress: Vec<Property>) -> Resource {
    Resource::new(ResourceKind::SecurityGroup, name)
        .with("vpcId", vpc.id())
        .with("description", description)
        .with("ingress", Property::List(ingress))
        .with("egress", allow_all_egress())
        .with("tags", name_tag(name))
}

pub(crate) fn declare(
    builder: &mut StackBuilder,
    config: &StackConfig,
    network: &Network,
) -> Result<SecurityGroups> {
    let security = &config.security;

    let load_balancer = builder.declare(group(
        &security.load_balancer_group,
        &network.vpc,
        "Load balancer ingress",
        vec![
            tcp_from_cidr(80, AddressBlock::ANYWHERE, "HTTP"),
            tcp_from_cidr(443, AddressBlock::ANYWHERE, "HTTPS"),
        ],
    ))?;

    // Without a load balancer the instance serves the app port directly.
    let mut app_ingress = vec![if config.uses_autoscaling() {
        tcp_from_group(
            security.application_port,
            &load_balancer,
            "Application traffic from the load balancer",
        )
    } else {
        tcp_from_cidr(
            security.application_port,
            AddressBlock::ANYWHERE,
            "Application traffic from anywhere",
        )
    }];
    if let Some(cidr) = security.ssh_cidr {
        app_ingress.push(tcp_from_cidr(SSH_PORT, cidr, "SSH"));
    }
    let application = builder.declare(group(
        &security.application_group,
        &network.vpc,
        "Application instances",
        app_ingress,
    ))?;

    let database = config
        .database
        .as_ref()
        .map(|db| {
            builder.declare(group(
                &security.database_group,
                &network.vpc,
                "Database access from the application",
                vec![tcp_from_group(
                    db.effective_port(),
                    &application,
                    "Database traffic from the application",
                )],
            ))
        })
        .transpose()?;

    Ok(SecurityGroups {
        load_balancer,
        application,
        database,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{plan_subnets, SubnetAllocator};
    use crate::stack::fixtures::{config, FULL};
    use crate::stack::network;
    use std::collections::BTreeMap;

    #[test]
    fn test_groups_chain_by_id() {
        let config = config(FULL);
        let allocator = SubnetAllocator::new(config.network.vpc_cidr, 24).expect("allocator");
        let layout = plan_subnets(&allocator, &[String::from("a")]).expect("layout");
        let mut builder = StackBuilder::new(BTreeMap::new());
        let net = network::declare(&mut builder, &config.network, &layout).expect("network");

        let groups = declare(&mut builder, &config, &net).expect("groups");
        assert_eq!(groups.all().len(), 3);

        let graph = &builder.graph;
        assert_eq!(graph.dependencies("app-sg").expect("deps"), vec!["shop-vpc", "lb-sg"]);
        assert_eq!(graph.dependencies("db-sg").expect("deps"), vec!["shop-vpc", "app-sg"]);

        let Some(Property::List(ingress)) = graph.get("app-sg").and_then(|r| r.properties.get("ingress")) else {
            panic!("ingress");
        };
        assert_eq!(ingress.len(), 2);
        let Property::Map(app_rule) = &ingress[0] else {
            panic!("rule");
        };
        assert_eq!(app_rule.get("fromPort"), Some(&Property::from(3000u16)));

        let Some(Property::List(db_ingress)) = graph.get("db-sg").and_then(|r| r.properties.get("ingress")) else {
            panic!("ingress");
        };
        let Property::Map(db_rule) = &db_ingress[0] else {
            panic!("rule");
        };
        assert_eq!(db_rule.get("toPort"), Some(&Property::from(5432u16)));
    }

    #[test]
    fn test_standalone_app_port_is_public() {
        let mut config = config(FULL);
        config.autoscaling = None;
        let allocator = SubnetAllocator::new(config.network.vpc_cidr, 24).expect("allocator");
        let layout = plan_subnets(&allocator, &[String::from("a")]).expect("layout");
        let mut builder = StackBuilder::new(BTreeMap::new());
        let net = network::declare(&mut builder, &config.network, &layout).expect("network");

        declare(&mut builder, &config, &net).expect("groups");

        let graph = &builder.graph;
        assert_eq!(graph.dependencies("app-sg").expect("deps"), vec!["shop-vpc"]);
        let Some(Property::List(ingress)) = graph.get("app-sg").and_then(|r| r.properties.get("ingress")) else {
            panic!("ingress");
        };
        let Property::Map(app_rule) = &ingress[0] else {
            panic!("rule");
        };
        assert_eq!(app_rule.get("fromPort"), Some(&Property::from(3000u16)));
        assert_eq!(
            app_rule.get("cidrBlocks"),
            Some(&Property::list([Property::str("0.0.0.0/0")]))
        );
        assert!(app_rule.get("securityGroups").is_none());
    }
}
