//! Configuration parser for loading stack files.
//!
//! This module handles loading configuration from YAML files, the `.env` file
//! next to them and `STRATUS_*` environment overrides.

use crate::error::{ConfigError, Result, StratusError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::StackConfig;

/// Configuration parser for loading stack configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<StackConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(StratusError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StratusError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<StackConfig> {
        debug!("Parsing YAML configuration");

        let config: StackConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            StratusError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Successfully parsed configuration for project: {}", config.project.name);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Overrides use the form `STRATUS_<SECTION>_<KEY>`
    /// (e.g. `STRATUS_PROJECT_NAME`, `STRATUS_VPC_CIDR`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override is malformed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<StackConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies overrides looked up through `lookup`.
    fn apply_env_overrides(
        config: &mut StackConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(name) = lookup("STRATUS_PROJECT_NAME") {
            debug!("Overriding project.name from environment");
            config.project.name = name;
        }

        if let Some(env) = lookup("STRATUS_PROJECT_ENVIRONMENT") {
            debug!("Overriding project.environment from environment");
            config.project.environment = env;
        }

        if let Some(region) = lookup("STRATUS_PROJECT_REGION") {
            debug!("Overriding project.region from environment");
            config.project.region = region;
        }

        if let Some(cidr) = lookup("STRATUS_VPC_CIDR") {
            debug!("Overriding network.vpc_cidr from environment");
            config.network.vpc_cidr = cidr.parse().map_err(|e| {
                StratusError::Config(ConfigError::ParseError {
                    message: format!("{e}"),
                    location: Some(String::from("STRATUS_VPC_CIDR")),
                })
            })?;
        }

        if let Some(zones) = lookup("STRATUS_ZONES") {
            debug!("Overriding network.availability_zones from environment");
            config.network.availability_zones = zones
                .split(',')
                .map(str::trim)
                .filter(|z| !z.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                StratusError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Validates that every secret the stack references is set.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing variable.
    pub fn validate_required_env(&self, config: &StackConfig) -> Result<()> {
        for var in config.secret_env_vars() {
            let set = std::env::var(var).is_ok_and(|v| !v.is_empty());
            if !set {
                return Err(StratusError::Config(ConfigError::MissingEnvVar {
                    name: var.to_string(),
                }));
            }
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["stratus.stack.yaml", "stratus.stack.yml"];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(StratusError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r"
project:
  name: test-project
  region: us-east-1
network:
  vpc_name: main-vpc
  vpc_cidr: 10.0.0.0/16
  availability_zones: [us-east-1a, us-east-1b]
";

    #[test]
    fn test_parse_minimal_config() {
        let config = ConfigParser::new().parse_yaml(MINIMAL, None).expect("parse");
        assert_eq!(config.project.name, "test-project");
        assert_eq!(config.project.environment, "dev");
        assert_eq!(config.network.vpc_cidr.to_string(), "10.0.0.0/16");
        assert!(config.database.is_none());
        assert!(!config.uses_autoscaling());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
project:
  name: shop
  environment: prod
  region: us-east-1

network:
  vpc_name: shop-vpc
  vpc_cidr: 10.1.0.0/16
  subnet_mask: 24
  availability_zones: [us-east-1a, us-east-1b, us-east-1c, us-east-1d]

security:
  application_port: 3000
  ssh_cidr: 203.0.113.0/24

database:
  identifier: shop-db
  engine: postgres
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
  min_size: 1
  max_size: 4
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
";
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("parse");
        assert_eq!(config.security.application_port, 3000);
        assert!(config.uses_autoscaling());
        let db = config.database.as_ref().expect("database");
        assert_eq!(db.effective_port(), 5432);
        assert_eq!(
            config.secret_env_vars(),
            vec!["STRATUS_DB_PASSWORD", "STRATUS_MAIL_API_KEY"]
        );
        let autoscaling = config.autoscaling.as_ref().expect("autoscaling");
        assert_eq!(autoscaling.load_balancer.listener_port, 80);
    }

    #[test]
    fn test_parse_error_has_location() {
        let err = ConfigParser::new()
            .parse_yaml("project: [", Some(Path::new("broken.yaml")))
            .expect_err("should fail");
        match err {
            StratusError::Config(ConfigError::ParseError { location, .. }) => {
                assert_eq!(location.as_deref(), Some("broken.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ConfigParser::new().parse_yaml(MINIMAL, None).expect("parse");
        let vars = HashMap::from([
            ("STRATUS_PROJECT_ENVIRONMENT", "staging"),
            ("STRATUS_VPC_CIDR", "172.16.0.0/16"),
            ("STRATUS_ZONES", "eu-west-1b, eu-west-1a,"),
        ]);

        ConfigParser::apply_env_overrides(&mut config, |key| {
            vars.get(key).map(|v| (*v).to_string())
        })
        .expect("overrides");

        assert_eq!(config.project.environment, "staging");
        assert_eq!(config.network.vpc_cidr.to_string(), "172.16.0.0/16");
        assert_eq!(config.network.availability_zones, vec!["eu-west-1b", "eu-west-1a"]);
    }

    #[test]
    fn test_malformed_cidr_override_rejected() {
        let mut config = ConfigParser::new().parse_yaml(MINIMAL, None).expect("parse");
        let result = ConfigParser::apply_env_overrides(&mut config, |key| {
            (key == "STRATUS_VPC_CIDR").then(|| String::from("10.0.0.0"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_find_config_file_searches_upward() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(dir.path().join("stratus.stack.yaml"), MINIMAL).expect("write");

        let found = find_config_file(&nested).expect("found");
        assert_eq!(found, dir.path().join("stratus.stack.yaml"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = ConfigParser::new().load_file(dir.path().join("nope.yaml"));
        assert!(matches!(
            result,
            Err(StratusError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
