//! RDS database in the private subnets.

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::graph::{Property, Resource, ResourceHandle, ResourceKind};

use super::network::Network;
use super::{ids, name_tag, StackBuilder};

pub(crate) fn declare(
    builder: &mut StackBuilder,
    config: &DatabaseConfig,
    network: &Network,
    group: &ResourceHandle,
) -> Result<ResourceHandle> {
    let parameters = builder.declare(
        Resource::new(ResourceKind::DbParameterGroup, config.parameter_group_name.as_str())
            .with("name", config.parameter_group_name.as_str())
            .with("family", config.parameter_group_family.as_str())
            .with("tags", name_tag(&config.parameter_group_name)),
    )?;

    let subnets = builder.declare(
        Resource::new(ResourceKind::DbSubnetGroup, config.subnet_group_name.as_str())
            .with("name", config.subnet_group_name.as_str())
            .with("subnetIds", ids(&network.private_subnets))
            .with("tags", name_tag(&config.subnet_group_name)),
    )?;

    let instance = builder.declare(
        Resource::new(ResourceKind::DbInstance, config.identifier.as_str())
            .with("identifier", config.identifier.as_str())
            .with("engine", config.engine.to_string())
            .with("engineVersion", config.engine_version.as_str())
            .with("instanceClass", config.instance_class.as_str())
            .with("allocatedStorage", config.allocated_storage)
            .with("dbName", config.db_name.as_str())
            .with("username", config.username.as_str())
            .with("password", Property::secret(config.password_env.as_str()))
            .with("port", config.effective_port())
            .with("multiAz", config.multi_az)
            .with("parameterGroupName", parameters.attr("name"))
            .with("dbSubnetGroupName", subnets.attr("name"))
            .with("vpcSecurityGroupIds", ids(std::slice::from_ref(group)))
            .with("publiclyAccessible", false)
            .with("skipFinalSnapshot", true)
            .with("tags", name_tag(&config.identifier)),
    )?;

    Ok(instance)
}

#[cfg(test)]
mod tests {
    use crate::network::ConfiguredZones;
    use crate::stack::declare_stack;
    use crate::stack::fixtures::{config, FULL};

    #[test]
    fn test_database_uses_private_subnets_and_secret_password() {
        let config = config(FULL);
        let zones = ConfiguredZones::new(config.network.availability_zones.clone());
        let stack = declare_stack(&config, &zones).expect("stack");

        assert_eq!(
            stack.graph.dependencies("shop-db-subnets").expect("deps"),
            vec!["private-subnet-0", "private-subnet-1", "private-subnet-2"]
        );
        assert_eq!(
            stack.graph.dependencies("shop-db").expect("deps"),
            vec!["db-sg", "shop-pg", "shop-db-subnets"]
        );

        let db = stack.graph.get("shop-db").expect("db");
        let rendered = serde_json::to_string(&db.properties).expect("json");
        assert!(rendered.contains(r#""password":{"fn::secret":{"env":"STRATUS_DB_PASSWORD"}}"#));
        assert!(rendered.contains(r#""engine":"postgres""#));
    }
}
