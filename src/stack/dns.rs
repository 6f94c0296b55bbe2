//! Route53 record for the application.

use crate::config::DnsConfig;
use crate::error::Result;
use crate::graph::{Property, Resource, ResourceHandle, ResourceKind};

use super::compute::App;
use super::StackBuilder;

/// Logical name of the application record.
const RECORD_NAME: &str = "dns-record";

/// Declares the record: an alias to the load balancer, or a plain record
/// pointing at the instance's public address.
pub(crate) fn declare(builder: &mut StackBuilder, config: &DnsConfig, app: &App) -> Result<ResourceHandle> {
    let record = Resource::new(ResourceKind::DnsRecord, RECORD_NAME)
        .with("zoneId", config.zone_id.as_str())
        .with("name", config.record_name.as_str());

    let record = match app {
        App::Balanced { load_balancer } => record.with("type", "A").with(
            "aliases",
            Property::list([Property::map([
                ("name", load_balancer.attr("dnsName")),
                ("zoneId", load_balancer.attr("zoneId")),
                ("evaluateTargetHealth", Property::lit(true)),
            ])]),
        ),
        App::Standalone { instance } => record
            .with("type", config.record_type.as_str())
            .with("ttl", config.ttl)
            .with("records", Property::list([instance.attr("publicIp")])),
    };

    builder.declare(record)
}
