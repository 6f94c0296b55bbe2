//! The stack document handed to the provisioning engine.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::config::StackConfig;
use crate::error::{PlanError, Result};
use crate::graph::{Property, Resource};
use crate::network::SubnetLayout;
use crate::planner::StackHasher;

use super::DeclaredStack;

/// Rendering formats for the stack document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DocumentFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

impl DocumentFormat {
    /// Returns the conventional file extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

/// Complete ordered resource graph plus outputs.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackDocument<'a> {
    /// Project name.
    pub project: &'a str,
    /// Environment name.
    pub environment: &'a str,
    /// Target region.
    pub region: &'a str,
    /// Hash of the configuration the stack was declared from.
    pub config_hash: String,
    /// Hash over every resource declaration, in order.
    pub stack_hash: String,
    /// Selected zones.
    pub zones: &'a [String],
    /// Derived subnet blocks.
    pub subnets: &'a SubnetLayout,
    /// Resources in declaration order.
    pub resources: &'a [Resource],
    /// Published outputs.
    pub outputs: &'a BTreeMap<String, Property>,
    /// Environment variables the engine must supply.
    pub secrets: Vec<&'a str>,
}

impl<'a> StackDocument<'a> {
    /// Assembles the document for a declared stack.
    #[must_use]
    pub fn new(config: &'a StackConfig, stack: &'a DeclaredStack, hasher: &StackHasher) -> Self {
        Self {
            project: &config.project.name,
            environment: &config.project.environment,
            region: &config.project.region,
            config_hash: hasher.hash_config(config),
            stack_hash: hasher.hash_graph(&stack.graph),
            zones: &stack.zones,
            subnets: &stack.layout,
            resources: stack.graph.resources(),
            outputs: &stack.outputs,
            secrets: stack.graph.secrets().into_iter().collect(),
        }
    }

    /// Renders the document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self, format: DocumentFormat) -> Result<String> {
        let rendered = match format {
            DocumentFormat::Json => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
            DocumentFormat::Yaml => serde_yaml::to_string(self).map_err(|e| e.to_string()),
        };

        rendered.map_err(|message| PlanError::RenderFailed { message }.into())
    }

    /// Renders the document and writes it to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub async fn write_to(&self, path: &Path, format: DocumentFormat) -> Result<()> {
        let content = self.render(format)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;

        info!("Stack document written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ConfiguredZones;
    use crate::stack::declare_stack;
    use crate::stack::fixtures::{config, FULL, MINIMAL};
    use tempfile::TempDir;

    #[test]
    fn test_json_document_shape() {
        let config = config(MINIMAL);
        let zones = ConfiguredZones::new(config.network.availability_zones.clone());
        let stack = declare_stack(&config, &zones).expect("stack");
        let document = StackDocument::new(&config, &stack, &StackHasher::new());

        let json: serde_json::Value =
            serde_json::from_str(&document.render(DocumentFormat::Json).expect("render")).expect("parse");
        assert_eq!(json["project"], "shop");
        assert_eq!(json["environment"], "dev");
        assert_eq!(json["zones"].as_array().map(Vec::len), Some(3));
        assert_eq!(json["resources"][0]["type"], "aws:ec2/vpc:Vpc");
        assert_eq!(json["resources"][1]["properties"]["vpcId"], "${shop-vpc.id}");
        assert_eq!(json["subnets"]["zones"][0]["private"], "10.0.3.0/24");
        assert_eq!(json["stackHash"].as_str().map(str::len), Some(64));
        assert!(json["secrets"].as_array().is_some_and(Vec::is_empty));
    }

    #[test]
    fn test_secrets_listed_not_resolved() {
        let config = config(FULL);
        let zones = ConfiguredZones::new(config.network.availability_zones.clone());
        let stack = declare_stack(&config, &zones).expect("stack");
        let document = StackDocument::new(&config, &stack, &StackHasher::new());

        let yaml = document.render(DocumentFormat::Yaml).expect("render");
        assert!(yaml.contains("fn::secret"));
        assert_eq!(document.secrets, vec!["STRATUS_DB_PASSWORD", "STRATUS_MAIL_API_KEY"]);
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let temp_dir = TempDir::new().expect("tempdir");
        let config = config(MINIMAL);
        let zones = ConfiguredZones::new(config.network.availability_zones.clone());
        let stack = declare_stack(&config, &zones).expect("stack");
        let document = StackDocument::new(&config, &stack, &StackHasher::new());

        let path = temp_dir.path().join("out").join("stack.json");
        document.write_to(&path, DocumentFormat::Json).await.expect("write");
        let written = tokio::fs::read_to_string(&path).await.expect("read");
        assert!(written.contains("\"stackHash\""));
    }
}
