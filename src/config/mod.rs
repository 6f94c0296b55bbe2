//! Configuration module for the stack planner.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `stratus.stack.yaml`
//! - Environment overrides and `.env` loading
//! - Validation of values and of the derived subnet layout

mod parser;
mod spec;
mod validator;

pub use parser::{find_config_file, ConfigParser, DEFAULT_CONFIG_FILES};
pub use spec::{
    AutoscalingConfig, ComputeConfig, DatabaseConfig, DbEngine, DnsConfig, LoadBalancerConfig,
    NetworkConfig, NotificationsConfig, ProjectConfig, SecurityConfig, StackConfig, StateConfig,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
