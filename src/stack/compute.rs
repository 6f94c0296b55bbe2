//! Application compute.
//!
//! With an autoscaling section the application runs as an autoscaling group
//! behind an application load balancer, scaled by CPU alarms. Without one it
//! is a single instance in the first public subnet.

use crate::config::{AutoscalingConfig, ComputeConfig, StackConfig};
use crate::error::{Result, StratusError};
use crate::graph::{Property, Resource, ResourceHandle, ResourceKind};

use super::network::Network;
use super::notifications::{allow_policy, assume_role_policy};
use super::security::SecurityGroups;
use super::{ids, name_tag, StackBuilder};

const CLOUDWATCH_AGENT_POLICY: &str = "arn:aws:iam::aws:policy/CloudWatchAgentServerPolicy";
const ROOT_DEVICE: &str = "/dev/xvda";

/// Resources compute may reference.
pub(crate) struct Inputs<'a> {
    pub network: &'a Network,
    pub groups: &'a SecurityGroups,
    pub database: Option<&'a ResourceHandle>,
    pub topic: Option<&'a ResourceHandle>,
}

/// How the application is exposed.
#[derive(Debug, Clone)]
pub(crate) enum App {
    /// Autoscaling group behind a load balancer.
    Balanced { load_balancer: ResourceHandle },
    /// A single public instance.
    Standalone { instance: ResourceHandle },
}

fn root_volume(size: u32) -> Property {
    Property::map([
        ("volumeSize", Property::from(size)),
        ("volumeType", Property::str("gp3")),
    ])
}

/// Boot script exporting connection settings to the application.
fn user_data(port: u16, inputs: &Inputs<'_>) -> Property {
    let mut parts = vec![Property::str(format!(
        "#!/bin/bash\nset -euo pipefail\ncat >> /etc/environment <<'EOF'\nAPP_PORT={port}\n"
    ))];
    if let Some(db) = inputs.database {
        parts.extend([
            Property::str("DB_HOST="),
            db.attr("address"),
            Property::str("\nDB_PORT="),
            db.attr("port"),
            Property::str("\n"),
        ]);
    }
    if let Some(topic) = inputs.topic {
        parts.extend([Property::str("SNS_TOPIC_ARN="), topic.arn(), Property::str("\n")]);
    }
    parts.push(Property::str("EOF\n"));
    Property::Concat(parts)
}

/// Declares the instance role and profile.
fn declare_profile(
    builder: &mut StackBuilder,
    config: &ComputeConfig,
    topic: Option<&ResourceHandle>,
) -> Result<ResourceHandle> {
    let role_name = &config.role_name;
    let role = builder.declare(
        Resource::new(ResourceKind::IamRole, role_name.as_str())
            .with("name", role_name.as_str())
            .with("assumeRolePolicy", assume_role_policy("ec2.amazonaws.com"))
            .with("tags", name_tag(role_name)),
    )?;
    builder.declare(
        Resource::new(ResourceKind::IamRolePolicyAttachment, format!("{role_name}-cloudwatch-agent"))
            .with("role", role.attr("name"))
            .with("policyArn", CLOUDWATCH_AGENT_POLICY),
    )?;

    if let Some(topic) = topic {
        let publish = builder.declare(
            Resource::new(ResourceKind::IamPolicy, format!("{role_name}-sns-publish"))
                .with("policy", allow_policy(&["sns:Publish"], topic.arn())),
        )?;
        builder.declare(
            Resource::new(ResourceKind::IamRolePolicyAttachment, format!("{role_name}-sns-publish-attachment"))
                .with("role", role.attr("name"))
                .with("policyArn", publish.arn()),
        )?;
    }

    builder.declare(
        Resource::new(ResourceKind::InstanceProfile, format!("{role_name}-profile"))
            .with("role", role.attr("name"))
            .with("tags", name_tag(role_name)),
    )
}

fn cpu_alarm(
    name: String,
    scaling: &AutoscalingConfig,
    group: &ResourceHandle,
    high: bool,
    actions: Vec<Property>,
) -> Resource {
    let (operator, threshold) = if high {
        ("GreaterThanOrEqualToThreshold", scaling.scale_up_threshold)
    } else {
        ("LessThanOrEqualToThreshold", scaling.scale_down_threshold)
    };
    Resource::new(ResourceKind::MetricAlarm, name.as_str())
        .with("comparisonOperator", operator)
        .with("evaluationPeriods", scaling.evaluation_periods)
        .with("metricName", "CPUUtilization")
        .with("namespace", "AWS/EC2")
        .with("period", scaling.period)
        .with("statistic", "Average")
        .with("threshold", threshold)
        .with(
            "dimensions",
            Property::map([("AutoScalingGroupName", group.attr("name"))]),
        )
        .with("alarmActions", Property::List(actions))
        .with("tags", name_tag(&name))
}

fn scaling_policy(name: String, scaling: &AutoscalingConfig, group: &ResourceHandle, step: i32) -> Resource {
    Resource::new(ResourceKind::AutoscalingPolicy, name)
        .with("autoscalingGroupName", group.attr("name"))
        .with("adjustmentType", "ChangeInCapacity")
        .with("scalingAdjustment", Property::lit(step))
        .with("cooldown", scaling.cooldown)
}

fn declare_balanced(
    builder: &mut StackBuilder,
    config: &StackConfig,
    compute: &ComputeConfig,
    scaling: &AutoscalingConfig,
    profile: &ResourceHandle,
    inputs: &Inputs<'_>,
) -> Result<App> {
    let port = config.security.application_port;
    let lb_config = &scaling.load_balancer;

    let template = builder.declare(
        Resource::new(ResourceKind::LaunchTemplate, scaling.launch_template_name.as_str())
            .with("namePrefix", format!("{}-", scaling.launch_template_name))
            .with("imageId", compute.ami_id.as_str())
            .with("instanceType", compute.instance_type.as_str())
            .with_opt("keyName", compute.key_name.as_deref())
            .with("iamInstanceProfile", Property::map([("arn", profile.arn())]))
            .with("vpcSecurityGroupIds", ids(std::slice::from_ref(&inputs.groups.application)))
            .with("userData", user_data(port, inputs))
            .with(
                "blockDeviceMappings",
                Property::list([Property::map([
                    ("deviceName", Property::str(ROOT_DEVICE)),
                    ("ebs", root_volume(compute.root_volume_size)),
                ])]),
            )
            .with("tags", name_tag(&scaling.launch_template_name)),
    )?;

    let target_group = builder.declare(
        Resource::new(ResourceKind::TargetGroup, lb_config.target_group_name.as_str())
            .with("port", port)
            .with("protocol", "HTTP")
            .with("vpcId", inputs.network.vpc.id())
            .with(
                "healthCheck",
                Property::map([
                    ("path", Property::str(lb_config.health_check_path.as_str())),
                    ("matcher", Property::str("200")),
                ]),
            )
            .with("tags", name_tag(&lb_config.target_group_name)),
    )?;

    let load_balancer = builder.declare(
        Resource::new(ResourceKind::LoadBalancer, lb_config.name.as_str())
            .with("loadBalancerType", "application")
            .with("internal", false)
            .with("securityGroups", ids(std::slice::from_ref(&inputs.groups.load_balancer)))
            .with("subnets", ids(&inputs.network.public_subnets))
            .with("tags", name_tag(&lb_config.name)),
    )?;

    builder.declare(
        Resource::new(ResourceKind::Listener, format!("{}-listener", lb_config.name))
            .with("loadBalancerArn", load_balancer.arn())
            .with("port", lb_config.listener_port)
            .with("protocol", "HTTP")
            .with(
                "defaultActions",
                Property::list([Property::map([
                    ("type", Property::str("forward")),
                    ("targetGroupArn", target_group.arn()),
                ])]),
            )
            .with("tags", name_tag(&format!("{}-listener", lb_config.name))),
    )?;

    let group_name = &scaling.group_name;
    let group = builder.declare(
        Resource::new(ResourceKind::AutoscalingGroup, group_name.as_str())
            .with("minSize", scaling.min_size)
            .with("maxSize", scaling.max_size)
            .with("desiredCapacity", scaling.desired_capacity)
            .with("defaultCooldown", scaling.cooldown)
            .with("healthCheckType", "ELB")
            .with("vpcZoneIdentifiers", ids(&inputs.network.public_subnets))
            .with("targetGroupArns", Property::list([target_group.arn()]))
            .with(
                "launchTemplate",
                Property::map([
                    ("id", template.id()),
                    ("version", Property::str("$Latest")),
                ]),
            ),
    )?;

    let scale_up = builder.declare(scaling_policy(format!("{group_name}-scale-up"), scaling, &group, 1))?;
    let scale_down = builder.declare(scaling_policy(format!("{group_name}-scale-down"), scaling, &group, -1))?;

    let mut high_actions = vec![scale_up.arn()];
    high_actions.extend(inputs.topic.map(ResourceHandle::arn));
    builder.declare(cpu_alarm(format!("{group_name}-cpu-high"), scaling, &group, true, high_actions))?;
    builder.declare(cpu_alarm(
        format!("{group_name}-cpu-low"),
        scaling,
        &group,
        false,
        vec![scale_down.arn()],
    ))?;

    Ok(App::Balanced { load_balancer })
}

fn declare_standalone(
    builder: &mut StackBuilder,
    config: &StackConfig,
    compute: &ComputeConfig,
    profile: &ResourceHandle,
    inputs: &Inputs<'_>,
) -> Result<App> {
    let subnet = inputs
        .network
        .public_subnets
        .first()
        .ok_or_else(|| StratusError::internal("no public subnet for the application instance"))?;

    let instance = builder.declare(
        Resource::new(ResourceKind::Instance, compute.instance_name.as_str())
            .with("ami", compute.ami_id.as_str())
            .with("instanceType", compute.instance_type.as_str())
            .with_opt("keyName", compute.key_name.as_deref())
            .with("subnetId", subnet.id())
            .with("vpcSecurityGroupIds", ids(std::slice::from_ref(&inputs.groups.application)))
            .with("iamInstanceProfile", profile.attr("name"))
            .with("associatePublicIpAddress", true)
            .with("userData", user_data(config.security.application_port, inputs))
            .with("rootBlockDevice", root_volume(compute.root_volume_size))
            .with("tags", name_tag(&compute.instance_name)),
    )?;

    Ok(App::Standalone { instance })
}

pub(crate) fn declare(
    builder: &mut StackBuilder,
    config: &StackConfig,
    compute: &ComputeConfig,
    inputs: &Inputs<'_>,
) -> Result<App> {
    let profile = declare_profile(builder, compute, inputs.topic)?;

    match &config.autoscaling {
        Some(scaling) => declare_balanced(builder, config, compute, scaling, &profile, inputs),
        None => declare_standalone(builder, config, compute, &profile, inputs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ConfiguredZones;
    use crate::stack::declare_stack;
    use crate::stack::fixtures::{config, FULL};

    fn full(autoscaling: bool) -> crate::stack::DeclaredStack {
        let mut config = config(FULL);
        if !autoscaling {
            config.autoscaling = None;
        }
        let zones = ConfiguredZones::new(config.network.availability_zones.clone());
        declare_stack(&config, &zones).expect("stack")
    }

    #[test]
    fn test_autoscaling_declares_balanced_group() {
        let stack = full(true);
        let graph = &stack.graph;

        assert!(graph.get("app-instance").is_none());
        assert_eq!(
            graph.dependencies("app-lb").expect("deps"),
            vec!["public-subnet-0", "public-subnet-1", "public-subnet-2", "lb-sg"]
        );
        assert_eq!(
            graph.dependencies("app-asg-cpu-high").expect("deps"),
            vec!["app-notifications", "app-asg", "app-asg-scale-up"]
        );

        let high = graph.get("app-asg-cpu-high").expect("alarm");
        assert_eq!(high.properties.get("threshold"), Some(&Property::from(70.0)));
        let down = graph.get("app-asg-scale-down").expect("policy");
        assert_eq!(down.properties.get("scalingAdjustment"), Some(&Property::lit(-1)));

        let template = graph.get("app-launch-template").expect("template");
        let script = serde_json::to_value(&template.properties["userData"]).expect("json");
        let script = script.as_str().expect("string");
        assert!(script.contains("DB_HOST=${shop-db.address}"));
        assert!(script.contains("SNS_TOPIC_ARN=${app-notifications.arn}"));
        assert!(script.contains("APP_PORT=3000"));
    }

    #[test]
    fn test_standalone_instance_in_first_public_subnet() {
        let stack = full(false);
        let graph = &stack.graph;

        assert!(graph.get("app-lb").is_none());
        let instance = graph.get("app-instance").expect("instance");
        assert_eq!(
            instance.properties.get("subnetId"),
            Some(&Property::reference("public-subnet-0", "id"))
        );
        assert_eq!(instance.properties.get("keyName"), Some(&Property::str("deploy")));
        assert!(stack.outputs.contains_key("instancePublicIp"));
        assert!(!stack.outputs.contains_key("loadBalancerDnsName"));
        assert!(graph.get("app-instance-role-sns-publish").is_some());
    }
}
