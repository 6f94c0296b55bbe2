//! Published stack outputs.

use crate::error::Result;
use crate::graph::ResourceHandle;

use super::compute::App;
use super::network::Network;
use super::notifications::Pipeline;
use super::security::SecurityGroups;
use super::{ids, StackBuilder};

/// Everything the outputs may point at.
pub(crate) struct Declared<'a> {
    pub network: &'a Network,
    pub groups: &'a SecurityGroups,
    pub pipeline: Option<&'a Pipeline>,
    pub database: Option<&'a ResourceHandle>,
    pub app: Option<&'a App>,
    pub record: Option<&'a ResourceHandle>,
}

pub(crate) fn publish(builder: &mut StackBuilder, declared: &Declared<'_>) -> Result<()> {
    let network = declared.network;
    builder.output("vpcId", network.vpc.id())?;
    builder.output("publicSubnetIds", ids(&network.public_subnets))?;
    builder.output("privateSubnetIds", ids(&network.private_subnets))?;
    builder.output("internetGatewayId", network.internet_gateway.id())?;
    builder.output("publicRouteTableId", network.public_route_table.id())?;
    builder.output("privateRouteTableId", network.private_route_table.id())?;
    builder.output("securityGroupIds", ids(&declared.groups.all()))?;

    match declared.app {
        Some(App::Standalone { instance }) => {
            builder.output("instancePublicIp", instance.attr("publicIp"))?;
        }
        Some(App::Balanced { load_balancer }) => {
            builder.output("loadBalancerDnsName", load_balancer.attr("dnsName"))?;
        }
        None => {}
    }

    if let Some(db) = declared.database {
        builder.output("databaseEndpoint", db.attr("endpoint"))?;
    }

    if let Some(record) = declared.record {
        builder.output("dnsRecordName", record.attr("name"))?;
        builder.output("dnsRecordType", record.attr("type"))?;
    }

    if let Some(pipeline) = declared.pipeline {
        builder.output("snsTopicArn", pipeline.topic.arn())?;
        builder.output("bucketName", pipeline.bucket.attr("name"))?;
        builder.output("serviceAccountEmail", pipeline.service_account.attr("email"))?;
    }

    Ok(())
}
