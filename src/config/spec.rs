//! Configuration specification types for the stack planner.
//!
//! This module defines all the structs that map to the `stratus.stack.yaml` file.
//! Optional sections (`database`, `compute`, `autoscaling`, `dns`,
//! `notifications`) switch the corresponding part of the stack on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::network::{AddressBlock, MAX_ZONES};

/// The root configuration structure for a stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// Local state configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// VPC, subnets and routing.
    pub network: NetworkConfig,
    /// Security group names and ports.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Managed database.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// Application compute.
    #[serde(default)]
    pub compute: Option<ComputeConfig>,
    /// Autoscaling behind a load balancer (requires `compute`).
    #[serde(default)]
    pub autoscaling: Option<AutoscalingConfig>,
    /// DNS record for the application.
    #[serde(default)]
    pub dns: Option<DnsConfig>,
    /// Cross-cloud notification pipeline.
    #[serde(default)]
    pub notifications: Option<NotificationsConfig>,
    /// Tags merged into every taggable resource.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Unique name for the project.
    pub name: String,
    /// Environment (e.g., "dev", "staging", "prod").
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Cloud region.
    pub region: String,
}

/// Local state configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StateConfig {
    /// State directory, relative to the configuration file.
    #[serde(default)]
    pub path: Option<String>,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// VPC name.
    pub vpc_name: String,
    /// VPC address block.
    pub vpc_cidr: AddressBlock,
    /// Prefix length of every derived subnet.
    #[serde(default = "default_subnet_mask")]
    pub subnet_mask: u8,
    /// Base name of public subnets (`<name>-<i>`).
    #[serde(default = "default_public_subnet_name")]
    pub public_subnet_name: String,
    /// Base name of private subnets (`<name>-<i>`).
    #[serde(default = "default_private_subnet_name")]
    pub private_subnet_name: String,
    /// Internet gateway name.
    #[serde(default = "default_internet_gateway_name")]
    pub internet_gateway_name: String,
    /// Public route table name.
    #[serde(default = "default_public_route_table_name")]
    pub public_route_table_name: String,
    /// Private route table name.
    #[serde(default = "default_private_route_table_name")]
    pub private_route_table_name: String,
    /// Destination routed through the internet gateway.
    #[serde(default = "default_public_route_cidr")]
    pub public_route_cidr: AddressBlock,
    /// Availability zones in provider order.
    pub availability_zones: Vec<String>,
    /// How many zones to spread across.
    #[serde(default = "default_max_zones")]
    pub max_zones: usize,
}

/// Security group configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityConfig {
    /// Load balancer group name.
    #[serde(default = "default_lb_group")]
    pub load_balancer_group: String,
    /// Application group name.
    #[serde(default = "default_app_group")]
    pub application_group: String,
    /// Database group name.
    #[serde(default = "default_db_group")]
    pub database_group: String,
    /// Port the application listens on.
    #[serde(default = "default_application_port")]
    pub application_port: u16,
    /// Source block allowed to reach port 22, if any.
    #[serde(default)]
    pub ssh_cidr: Option<AddressBlock>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            load_balancer_group: default_lb_group(),
            application_group: default_app_group(),
            database_group: default_db_group(),
            application_port: default_application_port(),
            ssh_cidr: None,
        }
    }
}

/// Database engines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DbEngine {
    /// `PostgreSQL`.
    #[default]
    Postgres,
    /// `MySQL`.
    Mysql,
    /// `MariaDB`.
    Mariadb,
}

impl DbEngine {
    /// Returns the engine's default port.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Postgres => 5432,
            Self::Mysql | Self::Mariadb => 3306,
        }
    }
}

impl std::fmt::Display for DbEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Mysql => write!(f, "mysql"),
            Self::Mariadb => write!(f, "mariadb"),
        }
    }
}

/// Managed database configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Instance identifier.
    pub identifier: String,
    /// Database engine.
    #[serde(default)]
    pub engine: DbEngine,
    /// Engine version.
    pub engine_version: String,
    /// Instance class.
    #[serde(default = "default_instance_class")]
    pub instance_class: String,
    /// Storage in GB.
    #[serde(default = "default_allocated_storage")]
    pub allocated_storage: u32,
    /// Initial database name.
    pub db_name: String,
    /// Master username.
    pub username: String,
    /// Environment variable holding the master password.
    #[serde(default = "default_password_env")]
    pub password_env: String,
    /// Parameter group name.
    pub parameter_group_name: String,
    /// Parameter group family (e.g. `postgres15`).
    pub parameter_group_family: String,
    /// Subnet group name.
    pub subnet_group_name: String,
    /// Port override; the engine default otherwise.
    #[serde(default)]
    pub port: Option<u16>,
    /// Whether to run a standby in another zone.
    #[serde(default)]
    pub multi_az: bool,
}

impl DatabaseConfig {
    /// Returns the port the database listens on.
    #[must_use]
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.engine.default_port())
    }
}

/// Application compute configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComputeConfig {
    /// Machine image.
    pub ami_id: String,
    /// Instance type.
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    /// SSH key pair name.
    #[serde(default)]
    pub key_name: Option<String>,
    /// Name of the standalone instance.
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    /// Name of the instance IAM role.
    #[serde(default = "default_role_name")]
    pub role_name: String,
    /// Root volume size in GB.
    #[serde(default = "default_root_volume_size")]
    pub root_volume_size: u32,
}

/// Autoscaling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoscalingConfig {
    /// Autoscaling group name.
    #[serde(default = "default_group_name")]
    pub group_name: String,
    /// Launch template name.
    #[serde(default = "default_launch_template_name")]
    pub launch_template_name: String,
    /// Minimum instances.
    #[serde(default = "default_min_size")]
    pub min_size: u32,
    /// Maximum instances.
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    /// Desired instances.
    #[serde(default = "default_desired_capacity")]
    pub desired_capacity: u32,
    /// Seconds between scaling activities.
    #[serde(default = "default_cooldown")]
    pub cooldown: u32,
    /// Average CPU (%) above which to scale up.
    #[serde(default = "default_scale_up_threshold")]
    pub scale_up_threshold: f64,
    /// Average CPU (%) below which to scale down.
    #[serde(default = "default_scale_down_threshold")]
    pub scale_down_threshold: f64,
    /// Alarm evaluation periods.
    #[serde(default = "default_evaluation_periods")]
    pub evaluation_periods: u32,
    /// Alarm period in seconds.
    #[serde(default = "default_period")]
    pub period: u32,
    /// Load balancer in front of the group.
    #[serde(default)]
    pub load_balancer: LoadBalancerConfig,
}

/// Load balancer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancerConfig {
    /// Load balancer name.
    #[serde(default = "default_lb_name")]
    pub name: String,
    /// Target group name.
    #[serde(default = "default_target_group_name")]
    pub target_group_name: String,
    /// Listener port.
    #[serde(default = "default_listener_port")]
    pub listener_port: u16,
    /// Health check path on the application port.
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            name: default_lb_name(),
            target_group_name: default_target_group_name(),
            listener_port: default_listener_port(),
            health_check_path: default_health_check_path(),
        }
    }
}

/// DNS configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsConfig {
    /// Hosted zone id.
    pub zone_id: String,
    /// Fully qualified record name.
    pub record_name: String,
    /// Record type.
    #[serde(default = "default_record_type")]
    pub record_type: String,
    /// TTL for non-alias records.
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

/// Notification pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationsConfig {
    /// SNS topic name.
    #[serde(default = "default_topic_name")]
    pub topic_name: String,
    /// Lambda function name.
    #[serde(default = "default_function_name")]
    pub function_name: String,
    /// Path to the function's deployment package.
    pub package_path: String,
    /// Function runtime.
    #[serde(default = "default_runtime")]
    pub runtime: String,
    /// Function handler.
    #[serde(default = "default_handler")]
    pub handler: String,
    /// Email tracking table name.
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// Sending domain for the mail API.
    pub mail_domain: String,
    /// Environment variable holding the mail API key.
    #[serde(default = "default_mail_api_key_env")]
    pub mail_api_key_env: String,
    /// GCS bucket name.
    pub bucket_name: String,
    /// GCS bucket location.
    #[serde(default = "default_bucket_location")]
    pub bucket_location: String,
    /// GCP project owning the bucket.
    pub gcp_project: String,
    /// Service account id the function uses to write to the bucket.
    pub service_account_id: String,
}

fn default_environment() -> String {
    String::from("dev")
}

const fn default_subnet_mask() -> u8 {
    24
}

fn default_public_subnet_name() -> String {
    String::from("public-subnet")
}

fn default_private_subnet_name() -> String {
    String::from("private-subnet")
}

fn default_internet_gateway_name() -> String {
    String::from("internet-gateway")
}

fn default_public_route_table_name() -> String {
    String::from("public-rt")
}

fn default_private_route_table_name() -> String {
    String::from("private-rt")
}

const fn default_public_route_cidr() -> AddressBlock {
    AddressBlock::ANYWHERE
}

const fn default_max_zones() -> usize {
    MAX_ZONES
}

fn default_lb_group() -> String {
    String::from("lb-sg")
}

fn default_app_group() -> String {
    String::from("app-sg")
}

fn default_db_group() -> String {
    String::from("db-sg")
}

const fn default_application_port() -> u16 {
    8080
}

fn default_instance_class() -> String {
    String::from("db.t3.micro")
}

const fn default_allocated_storage() -> u32 {
    20
}

fn default_password_env() -> String {
    String::from("STRATUS_DB_PASSWORD")
}

fn default_instance_type() -> String {
    String::from("t2.micro")
}

fn default_instance_name() -> String {
    String::from("app-instance")
}

fn default_role_name() -> String {
    String::from("app-instance-role")
}

const fn default_root_volume_size() -> u32 {
    25
}

fn default_group_name() -> String {
    String::from("app-asg")
}

fn default_launch_template_name() -> String {
    String::from("app-launch-template")
}

const fn default_min_size() -> u32 {
    1
}

const fn default_max_size() -> u32 {
    3
}

const fn default_desired_capacity() -> u32 {
    1
}

const fn default_cooldown() -> u32 {
    60
}

const fn default_scale_up_threshold() -> f64 {
    5.0
}

const fn default_scale_down_threshold() -> f64 {
    3.0
}

const fn default_evaluation_periods() -> u32 {
    2
}

const fn default_period() -> u32 {
    60
}

fn default_lb_name() -> String {
    String::from("app-lb")
}

fn default_target_group_name() -> String {
    String::from("app-tg")
}

const fn default_listener_port() -> u16 {
    80
}

fn default_health_check_path() -> String {
    String::from("/healthz")
}

fn default_record_type() -> String {
    String::from("A")
}

const fn default_ttl() -> u32 {
    60
}

fn default_topic_name() -> String {
    String::from("app-notifications")
}

fn default_function_name() -> String {
    String::from("notification-handler")
}

fn default_runtime() -> String {
    String::from("python3.11")
}

fn default_handler() -> String {
    String::from("lambda_function.lambda_handler")
}

fn default_table_name() -> String {
    String::from("email-tracking")
}

fn default_mail_api_key_env() -> String {
    String::from("STRATUS_MAIL_API_KEY")
}

fn default_bucket_location() -> String {
    String::from("US")
}

impl StackConfig {
    /// Returns the fully qualified project name including environment.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}-{}", self.project.name, self.project.environment)
    }

    /// Returns the tags applied to every taggable resource.
    ///
    /// Configured tags override the built-in ones.
    #[must_use]
    pub fn default_tags(&self) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::from([
            (String::from("Project"), self.project.name.clone()),
            (String::from("Environment"), self.project.environment.clone()),
            (String::from("ManagedBy"), String::from("stratus")),
        ]);
        tags.extend(self.tags.clone());
        tags
    }

    /// Returns the environment variables holding secrets this stack needs.
    #[must_use]
    pub fn secret_env_vars(&self) -> Vec<&str> {
        let mut vars = Vec::new();
        if let Some(db) = &self.database {
            vars.push(db.password_env.as_str());
        }
        if let Some(n) = &self.notifications {
            vars.push(n.mail_api_key_env.as_str());
        }
        vars
    }

    /// Returns true if the application runs behind a load balancer.
    #[must_use]
    pub const fn uses_autoscaling(&self) -> bool {
        self.compute.is_some() && self.autoscaling.is_some()
    }
}
