//! Configuration validation for stack files.
//!
//! This module checks values and cross-field consistency before anything is
//! declared, including the subnet layout the allocator will produce.

use crate::error::{ConfigError, Result, StratusError};
use crate::network::{plan_subnets, truncate_zones, SubnetAllocator, MAX_ZONES};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{
    AutoscalingConfig, ComputeConfig, DatabaseConfig, NetworkConfig, NotificationsConfig,
    ProjectConfig, SecurityConfig, StackConfig,
};

/// Smallest storage RDS accepts for general purpose volumes.
const MIN_ALLOCATED_STORAGE: u32 = 20;

/// Validator for stack configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a stack configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, config: &StackConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if result.errors.is_empty() {
            debug!(
                "Configuration validation passed with {} warning(s)",
                result.warnings.len()
            );
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(StratusError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Runs every check and returns all findings without failing.
    #[must_use]
    pub fn check(&self, config: &StackConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_project(&config.project, &mut result);
        Self::validate_network(&config.network, &mut result);
        Self::validate_security(&config.security, &mut result);
        if let Some(db) = &config.database {
            Self::validate_database(db, &mut result);
        }
        if let Some(compute) = &config.compute {
            Self::validate_compute(compute, &mut result);
        }
        if let Some(autoscaling) = &config.autoscaling {
            if config.compute.is_none() {
                result.error("autoscaling", "Autoscaling requires a compute section");
            }
            Self::validate_autoscaling(autoscaling, &mut result);
        }
        if let Some(dns) = &config.dns {
            if config.compute.is_none() {
                result.error("dns", "A DNS record requires a compute section to point at");
            }
            if dns.zone_id.is_empty() {
                result.error("dns.zone_id", "Hosted zone id cannot be empty");
            }
            if dns.record_type != "A" {
                result.warn(format!(
                    "DNS record type '{}' may not accept an instance address or alias",
                    dns.record_type
                ));
            }
        }
        if let Some(notifications) = &config.notifications {
            Self::validate_notifications(notifications, &mut result);
        }
        for key in config.tags.keys() {
            if key.starts_with("aws:") {
                result.error(format!("tags.{key}"), "Tag keys starting with 'aws:' are reserved");
            }
        }

        result
    }

    /// Validates project configuration.
    fn validate_project(project: &ProjectConfig, result: &mut ValidationResult) {
        if project.name.is_empty() {
            result.error("project.name", "Project name cannot be empty");
        } else if !is_valid_name(&project.name) {
            result.error(
                "project.name",
                format!(
                    "Project name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    project.name
                ),
            );
        }

        if project.environment.is_empty() {
            result.error("project.environment", "Environment cannot be empty");
        }

        if project.region.is_empty() {
            result.error("project.region", "Region cannot be empty");
        }
    }

    /// Validates addressing, zones and the derived subnet layout.
    fn validate_network(network: &NetworkConfig, result: &mut ValidationResult) {
        if network.vpc_name.is_empty() {
            result.error("network.vpc_name", "VPC name cannot be empty");
        }

        let vpc = network.vpc_cidr;
        if vpc.network() != u32::from(vpc.address()) {
            result.warn(format!(
                "VPC block {vpc} has host bits set; derived subnets keep them"
            ));
        }

        if network.subnet_mask < vpc.prefix() {
            result.error(
                "network.subnet_mask",
                format!(
                    "Subnet mask /{} is wider than the VPC block {vpc}",
                    network.subnet_mask
                ),
            );
        }

        if network.max_zones == 0 {
            result.error("network.max_zones", "At least one zone is required");
        } else if network.max_zones > MAX_ZONES {
            result.warn(format!(
                "max_zones {} exceeds {MAX_ZONES}; only {MAX_ZONES} zones will be used",
                network.max_zones
            ));
        }

        if network.availability_zones.is_empty() {
            result.error("network.availability_zones", "No availability zones configured");
            return;
        }

        let mut seen = HashSet::new();
        for zone in &network.availability_zones {
            if !seen.insert(zone) {
                result.error(
                    "network.availability_zones",
                    format!("Duplicate availability zone: {zone}"),
                );
            }
        }

        if network.public_subnet_name == network.private_subnet_name {
            result.error(
                "network.private_subnet_name",
                "Public and private subnets need different base names",
            );
        }
        if network.public_route_table_name == network.private_route_table_name {
            result.error(
                "network.private_route_table_name",
                "Public and private route tables need different names",
            );
        }

        let zones = truncate_zones(
            &network.availability_zones,
            network.max_zones.min(MAX_ZONES),
        );
        let layout = match SubnetAllocator::new(vpc, network.subnet_mask)
            .and_then(|allocator| plan_subnets(&allocator, &zones))
        {
            Ok(layout) => layout,
            Err(e) => {
                result.error("network.vpc_cidr", e.to_string());
                return;
            }
        };

        let blocks = layout.blocks();
        for (i, (tier, zone, block)) in blocks.iter().enumerate() {
            if !vpc.contains(block) {
                result.error(
                    "network.vpc_cidr",
                    format!("{tier} subnet {block} for {zone} falls outside {vpc}"),
                );
            }
            for (other_tier, other_zone, other) in &blocks[i + 1..] {
                if block.overlaps(other) {
                    result.error(
                        "network.subnet_mask",
                        format!(
                            "{tier} subnet {block} ({zone}) overlaps {other_tier} subnet {other} ({other_zone})"
                        ),
                    );
                }
            }
        }
    }

    /// Validates security group settings.
    fn validate_security(security: &SecurityConfig, result: &mut ValidationResult) {
        let names = [
            &security.load_balancer_group,
            &security.application_group,
            &security.database_group,
        ];
        let unique: HashSet<_> = names.iter().collect();
        if unique.len() != names.len() {
            result.error("security", "Security group names must be distinct");
        }

        if security.application_port == 0 {
            result.error("security.application_port", "Application port cannot be 0");
        }
    }

    /// Validates database configuration.
    fn validate_database(db: &DatabaseConfig, result: &mut ValidationResult) {
        if !is_valid_name(&db.identifier) {
            result.error(
                "database.identifier",
                format!("Database identifier '{}' is invalid", db.identifier),
            );
        }
        if db.username.is_empty() {
            result.error("database.username", "Master username cannot be empty");
        }
        if db.password_env.is_empty() {
            result.error("database.password_env", "Password variable name cannot be empty");
        }
        if db.allocated_storage < MIN_ALLOCATED_STORAGE {
            result.error(
                "database.allocated_storage",
                format!("Allocated storage must be at least {MIN_ALLOCATED_STORAGE} GB"),
            );
        }
        if db.effective_port() == 0 {
            result.error("database.port", "Database port cannot be 0");
        }
    }

    /// Validates compute configuration.
    fn validate_compute(compute: &ComputeConfig, result: &mut ValidationResult) {
        if !compute.ami_id.starts_with("ami-") {
            result.error(
                "compute.ami_id",
                format!("'{}' does not look like an AMI id", compute.ami_id),
            );
        }
        if compute.instance_type.is_empty() {
            result.error("compute.instance_type", "Instance type cannot be empty");
        }
        if compute.key_name.is_none() {
            result.warn("No key pair configured; instances will not accept SSH keys");
        }
    }

    /// Validates autoscaling configuration.
    fn validate_autoscaling(autoscaling: &AutoscalingConfig, result: &mut ValidationResult) {
        if autoscaling.min_size > autoscaling.max_size {
            result.error("autoscaling.min_size", "min_size cannot exceed max_size");
        }
        if autoscaling.desired_capacity < autoscaling.min_size
            || autoscaling.desired_capacity > autoscaling.max_size
        {
            result.error(
                "autoscaling.desired_capacity",
                "desired_capacity must lie between min_size and max_size",
            );
        }
        if autoscaling.scale_down_threshold >= autoscaling.scale_up_threshold {
            result.error(
                "autoscaling.scale_down_threshold",
                "Scale-down threshold must be below the scale-up threshold",
            );
        }
        if autoscaling.evaluation_periods == 0 {
            result.error("autoscaling.evaluation_periods", "At least one evaluation period is required");
        }
        if autoscaling.period == 0 || autoscaling.period % 60 != 0 {
            result.error("autoscaling.period", "Alarm period must be a positive multiple of 60");
        }
        if autoscaling.cooldown == 0 {
            result.warn("Autoscaling cooldown is 0; scaling may oscillate");
        }
        if !autoscaling.load_balancer.health_check_path.starts_with('/') {
            result.error(
                "autoscaling.load_balancer.health_check_path",
                "Health check path must start with '/'",
            );
        }
    }

    /// Validates the notification pipeline.
    fn validate_notifications(notifications: &NotificationsConfig, result: &mut ValidationResult) {
        if !is_valid_bucket_name(&notifications.bucket_name) {
            result.error(
                "notifications.bucket_name",
                format!("Bucket name '{}' is invalid", notifications.bucket_name),
            );
        }
        if notifications.mail_domain.is_empty() {
            result.error("notifications.mail_domain", "Mail domain cannot be empty");
        }
        if notifications.package_path.is_empty() {
            result.error("notifications.package_path", "Function package path cannot be empty");
        }
        if notifications.gcp_project.is_empty() {
            result.error("notifications.gcp_project", "GCP project cannot be empty");
        }
        if !is_valid_name(&notifications.service_account_id) {
            result.error(
                "notifications.service_account_id",
                format!(
                    "Service account id '{}' is invalid",
                    notifications.service_account_id
                ),
            );
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

/// GCS bucket names: 3-63 chars of lowercase letters, digits, `-`, `_` and `.`,
/// starting and ending with a letter or digit.
fn is_valid_bucket_name(name: &str) -> bool {
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());

    (3..=63).contains(&name.len())
        && edge_ok(name.chars().next())
        && edge_ok(name.chars().last())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
}

impl ValidationResult {
    /// Records an error.
    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Records a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn config(yaml: &str) -> StackConfig {
        ConfigParser::new().parse_yaml(yaml, None).expect("parse")
    }

    const BASE: &str = r"
project:
  name: shop
  region: us-east-1
network:
  vpc_name: shop-vpc
  vpc_cidr: 10.0.0.0/16
  availability_zones: [us-east-1a, us-east-1b, us-east-1c, us-east-1d]
";

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("app-sg"));
        assert!(is_valid_name("shop-db-1"));
        assert!(is_valid_name("a"));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Shop")); // uppercase
        assert!(!is_valid_name("1-shop")); // starts with number
        assert!(!is_valid_name("shop_db")); // underscore
        assert!(!is_valid_name("shop-")); // ends with hyphen
        assert!(!is_valid_name("shop--db")); // consecutive hyphens
    }

    #[test]
    fn test_bucket_names() {
        assert!(is_valid_bucket_name("shop-submissions"));
        assert!(is_valid_bucket_name("a.b_c"));
        assert!(!is_valid_bucket_name("ab"));
        assert!(!is_valid_bucket_name("-shop"));
        assert!(!is_valid_bucket_name("Shop"));
    }

    #[test]
    fn test_base_config_is_valid() {
        let result = ConfigValidator::new().validate(&config(BASE)).expect("valid");
        assert!(result.is_valid());
    }

    #[test]
    fn test_init_template_is_valid() {
        let template = config(include_str!("../../templates/stratus.stack.yaml"));
        let result = ConfigValidator::new().check(&template);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(template.uses_autoscaling());
    }

    #[test]
    fn test_third_octet_overflow_is_reported() {
        let yaml = BASE.replace("10.0.0.0/16", "10.0.251.0/16");
        let result = ConfigValidator::new().check(&config(&yaml));
        assert!(result
            .errors
            .iter()
            .any(|e| e.field == "network.vpc_cidr" && e.message.contains("exhausted")));
    }

    #[test]
    fn test_subnets_outside_vpc_are_reported() {
        // Subnets from 10.0.252.0 up leave the /22.
        let yaml = BASE.replace("10.0.0.0/16", "10.0.250.0/22");
        let result = ConfigValidator::new().check(&config(&yaml));
        assert!(result.errors.iter().any(|e| e.message.contains("falls outside")));
    }

    #[test]
    fn test_wide_subnets_overlap() {
        let yaml = BASE.replace("vpc_cidr: 10.0.0.0/16", "vpc_cidr: 10.0.0.0/16\n  subnet_mask: 20");
        let result = ConfigValidator::new().check(&config(&yaml));
        assert!(result.errors.iter().any(|e| e.message.contains("overlaps")));
    }

    #[test]
    fn test_autoscaling_requires_compute() {
        let yaml = format!("{BASE}autoscaling:\n  min_size: 1\n");
        let err = ConfigValidator::new().validate(&config(&yaml)).expect_err("invalid");
        assert!(err.to_string().contains("compute"));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let yaml = format!(
            "{BASE}compute:\n  ami_id: ami-123\n  key_name: deploy\nautoscaling:\n  scale_up_threshold: 10\n  scale_down_threshold: 50\n"
        );
        let result = ConfigValidator::new().check(&config(&yaml));
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].field, "autoscaling.scale_down_threshold");
    }

    #[test]
    fn test_excess_zones_warn() {
        let yaml = BASE.replace("vpc_cidr: 10.0.0.0/16", "vpc_cidr: 10.0.0.0/16\n  max_zones: 5");
        let result = ConfigValidator::new().check(&config(&yaml));
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_reserved_tag_prefix() {
        let yaml = format!("{BASE}tags:\n  aws:owner: me\n");
        let result = ConfigValidator::new().check(&config(&yaml));
        assert!(!result.is_valid());
    }
}
