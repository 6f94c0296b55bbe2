//! VPC, subnets, internet gateway and route tables.

use crate::config::NetworkConfig;
use crate::error::Result;
use crate::graph::{Property, Resource, ResourceHandle, ResourceKind};
use crate::network::SubnetLayout;

use super::{name_tag, StackBuilder};

/// Handles to the declared network.
#[derive(Debug, Clone)]
pub(crate) struct Network {
    pub vpc: ResourceHandle,
    pub public_subnets: Vec<ResourceHandle>,
    pub private_subnets: Vec<ResourceHandle>,
    pub internet_gateway: ResourceHandle,
    pub public_route_table: ResourceHandle,
    pub private_route_table: ResourceHandle,
}

fn subnet(
    name: String,
    vpc: &ResourceHandle,
    cidr: String,
    zone: &str,
    public: bool,
) -> Resource {
    let resource = Resource::new(ResourceKind::Subnet, name.as_str())
        .with("vpcId", vpc.id())
        .with("cidrBlock", cidr)
        .with("availabilityZone", zone)
        .with("tags", name_tag(&name));
    if public {
        resource.with("mapPublicIpOnLaunch", true)
    } else {
        resource
    }
}

fn associate(
    builder: &mut StackBuilder,
    prefix: &str,
    table: &ResourceHandle,
    subnets: &[ResourceHandle],
) -> Result<()> {
    for (i, subnet) in subnets.iter().enumerate() {
        builder.declare(
            Resource::new(ResourceKind::RouteTableAssociation, format!("{prefix}-{i}"))
                .with("subnetId", subnet.id())
                .with("routeTableId", table.id()),
        )?;
    }
    Ok(())
}

pub(crate) fn declare(
    builder: &mut StackBuilder,
    config: &NetworkConfig,
    layout: &SubnetLayout,
) -> Result<Network> {
    let vpc = builder.declare(
        Resource::new(ResourceKind::Vpc, config.vpc_name.as_str())
            .with("cidrBlock", config.vpc_cidr.to_string())
            .with("enableDnsHostnames", true)
            .with("enableDnsSupport", true)
            .with("tags", name_tag(&config.vpc_name)),
    )?;

    let mut public_subnets = Vec::with_capacity(layout.zones.len());
    let mut private_subnets = Vec::with_capacity(layout.zones.len());
    for zone in &layout.zones {
        let i = zone.index;
        public_subnets.push(builder.declare(subnet(
            format!("{}-{i}", config.public_subnet_name),
            &vpc,
            zone.public.to_string(),
            &zone.zone,
            true,
        ))?);
        private_subnets.push(builder.declare(subnet(
            format!("{}-{i}", config.private_subnet_name),
            &vpc,
            zone.private.to_string(),
            &zone.zone,
            false,
        ))?);
    }

    let internet_gateway = builder.declare(
        Resource::new(ResourceKind::InternetGateway, config.internet_gateway_name.as_str())
            .with("vpcId", vpc.id())
            .with("tags", name_tag(&config.internet_gateway_name)),
    )?;

    let public_route_table = builder.declare(
        Resource::new(ResourceKind::RouteTable, config.public_route_table_name.as_str())
            .with("vpcId", vpc.id())
            .with(
                "routes",
                Property::list([Property::map([
                    ("cidrBlock", Property::str(config.public_route_cidr.to_string())),
                    ("gatewayId", internet_gateway.id()),
                ])]),
            )
            .with("tags", name_tag(&config.public_route_table_name)),
    )?;
    associate(
        builder,
        &config.public_route_table_name,
        &public_route_table,
        &public_subnets,
    )?;

    // No default route: private subnets stay unreachable from outside.
    let private_route_table = builder.declare(
        Resource::new(ResourceKind::RouteTable, config.private_route_table_name.as_str())
            .with("vpcId", vpc.id())
            .with("tags", name_tag(&config.private_route_table_name)),
    )?;
    associate(
        builder,
        &config.private_route_table_name,
        &private_route_table,
        &private_subnets,
    )?;

    Ok(Network {
        vpc,
        public_subnets,
        private_subnets,
        internet_gateway,
        public_route_table,
        private_route_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{plan_subnets, SubnetAllocator};
    use crate::stack::fixtures::{config, MINIMAL};
    use std::collections::BTreeMap;

    #[test]
    fn test_route_table_associations_reference_subnets() {
        let config = config(MINIMAL);
        let allocator = SubnetAllocator::new(config.network.vpc_cidr, 24).expect("allocator");
        let layout = plan_subnets(&allocator, &[String::from("a"), String::from("b")]).expect("layout");
        let mut builder = StackBuilder::new(BTreeMap::new());

        let net = declare(&mut builder, &config.network, &layout).expect("network");
        assert_eq!(net.public_subnets.len(), 2);
        assert_eq!(net.private_subnets[1].name(), "private-subnet-1");

        let graph = &builder.graph;
        assert_eq!(
            graph.dependencies("private-rt-1").expect("deps"),
            vec!["private-subnet-1", "private-rt"]
        );
        assert_eq!(
            graph.dependencies("public-rt").expect("deps"),
            vec!["shop-vpc", "internet-gateway"]
        );
        let public = graph.get("public-subnet-0").expect("subnet");
        assert_eq!(public.properties.get("mapPublicIpOnLaunch"), Some(&Property::lit(true)));
        let private = graph.get("private-subnet-0").expect("subnet");
        assert!(!private.properties.contains_key("mapPublicIpOnLaunch"));
        assert_eq!(private.properties.get("availabilityZone"), Some(&Property::str("a")));
    }
}
