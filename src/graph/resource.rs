//! Resource declarations and their property values.
//!
//! A [`Resource`] is a logical name, a provider type and a map of properties.
//! Properties may reference attributes of other resources; those references
//! are the edges of the resource graph.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Cloud provider owning a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Amazon Web Services.
    Aws,
    /// Google Cloud Platform.
    Gcp,
}

/// Resource types the stack declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// EC2 VPC.
    Vpc,
    /// EC2 subnet.
    Subnet,
    /// EC2 internet gateway.
    InternetGateway,
    /// EC2 route table.
    RouteTable,
    /// Association of a subnet with a route table.
    RouteTableAssociation,
    /// EC2 security group.
    SecurityGroup,
    /// RDS parameter group.
    DbParameterGroup,
    /// RDS subnet group.
    DbSubnetGroup,
    /// RDS database instance.
    DbInstance,
    /// IAM role.
    IamRole,
    /// IAM customer-managed policy.
    IamPolicy,
    /// Attachment of a policy to a role.
    IamRolePolicyAttachment,
    /// IAM instance profile.
    InstanceProfile,
    /// EC2 instance.
    Instance,
    /// EC2 launch template.
    LaunchTemplate,
    /// Application load balancer.
    LoadBalancer,
    /// Load balancer target group.
    TargetGroup,
    /// Load balancer listener.
    Listener,
    /// Autoscaling group.
    AutoscalingGroup,
    /// Autoscaling policy.
    AutoscalingPolicy,
    /// CloudWatch metric alarm.
    MetricAlarm,
    /// Route53 record.
    DnsRecord,
    /// SNS topic.
    SnsTopic,
    /// SNS topic subscription.
    SnsSubscription,
    /// Lambda function.
    LambdaFunction,
    /// Lambda invoke permission.
    LambdaPermission,
    /// DynamoDB table.
    DynamoTable,
    /// GCS bucket.
    StorageBucket,
    /// GCP service account.
    ServiceAccount,
    /// GCP service account key.
    ServiceAccountKey,
    /// GCS bucket IAM member.
    BucketIamMember,
}

impl ResourceKind {
    /// Returns the provider type token used in the stack document.
    #[must_use]
    pub const fn type_token(self) -> &'static str {
        match self {
            Self::Vpc => "aws:ec2/vpc:Vpc",
            Self::Subnet => "aws:ec2/subnet:Subnet",
            Self::InternetGateway => "aws:ec2/internetGateway:InternetGateway",
            Self::RouteTable => "aws:ec2/routeTable:RouteTable",
            Self::RouteTableAssociation => "aws:ec2/routeTableAssociation:RouteTableAssociation",
            Self::SecurityGroup => "aws:ec2/securityGroup:SecurityGroup",
            Self::DbParameterGroup => "aws:rds/parameterGroup:ParameterGroup",
            Self::DbSubnetGroup => "aws:rds/subnetGroup:SubnetGroup",
            Self::DbInstance => "aws:rds/instance:Instance",
            Self::IamRole => "aws:iam/role:Role",
            Self::IamPolicy => "aws:iam/policy:Policy",
            Self::IamRolePolicyAttachment => "aws:iam/rolePolicyAttachment:RolePolicyAttachment",
            Self::InstanceProfile => "aws:iam/instanceProfile:InstanceProfile",
            Self::Instance => "aws:ec2/instance:Instance",
            Self::LaunchTemplate => "aws:ec2/launchTemplate:LaunchTemplate",
            Self::LoadBalancer => "aws:lb/loadBalancer:LoadBalancer",
            Self::TargetGroup => "aws:lb/targetGroup:TargetGroup",
            Self::Listener => "aws:lb/listener:Listener",
            Self::AutoscalingGroup => "aws:autoscaling/group:Group",
            Self::AutoscalingPolicy => "aws:autoscaling/policy:Policy",
            Self::MetricAlarm => "aws:cloudwatch/metricAlarm:MetricAlarm",
            Self::DnsRecord => "aws:route53/record:Record",
            Self::SnsTopic => "aws:sns/topic:Topic",
            Self::SnsSubscription => "aws:sns/topicSubscription:TopicSubscription",
            Self::LambdaFunction => "aws:lambda/function:Function",
            Self::LambdaPermission => "aws:lambda/permission:Permission",
            Self::DynamoTable => "aws:dynamodb/table:Table",
            Self::StorageBucket => "gcp:storage/bucket:Bucket",
            Self::ServiceAccount => "gcp:serviceaccount/account:Account",
            Self::ServiceAccountKey => "gcp:serviceaccount/key:Key",
            Self::BucketIamMember => "gcp:storage/bucketIAMMember:BucketIAMMember",
        }
    }

    /// Returns the provider that owns this type.
    #[must_use]
    pub const fn provider(self) -> Provider {
        match self {
            Self::StorageBucket
            | Self::ServiceAccount
            | Self::ServiceAccountKey
            | Self::BucketIamMember => Provider::Gcp,
            _ => Provider::Aws,
        }
    }

    /// Returns true if the type accepts a `tags` map.
    #[must_use]
    pub const fn is_taggable(self) -> bool {
        !matches!(
            self,
            Self::RouteTableAssociation
                | Self::IamRolePolicyAttachment
                | Self::AutoscalingGroup
                | Self::AutoscalingPolicy
                | Self::DnsRecord
                | Self::SnsSubscription
                | Self::LambdaPermission
        ) && matches!(self.provider(), Provider::Aws)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_token())
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_token())
    }
}

/// Reference to an output attribute of another resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrRef {
    /// Logical name of the referenced resource.
    pub resource: String,
    /// Attribute name (`id`, `arn`, ...).
    pub attribute: String,
}

impl std::fmt::Display for AttrRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${{{}.{}}}", self.resource, self.attribute)
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// Plain JSON value.
    Literal(Value),
    /// Attribute of another resource, resolved by the engine.
    Ref(AttrRef),
    /// Ordered list.
    List(Vec<Property>),
    /// String-keyed map.
    Map(BTreeMap<String, Property>),
    /// String built from literal and referenced parts.
    Concat(Vec<Property>),
    /// Secret read by the engine from the named environment variable.
    Secret(String),
}

impl Property {
    /// Creates a literal string.
    #[must_use]
    pub fn str(value: impl Into<String>) -> Self {
        Self::Literal(Value::String(value.into()))
    }

    /// Creates a literal from any JSON-convertible value.
    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a reference to `resource.attribute`.
    #[must_use]
    pub fn reference(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Ref(AttrRef {
            resource: resource.into(),
            attribute: attribute.into(),
        })
    }

    /// Creates a list.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Self>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Creates a map.
    #[must_use]
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Self)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Creates a string concatenation.
    #[must_use]
    pub fn concat(parts: impl IntoIterator<Item = Self>) -> Self {
        Self::Concat(parts.into_iter().collect())
    }

    /// Creates a secret bound to an environment variable.
    #[must_use]
    pub fn secret(env_var: impl Into<String>) -> Self {
        Self::Secret(env_var.into())
    }

    /// Collects every attribute reference inside this value.
    pub fn collect_refs<'a>(&'a self, out: &mut Vec<&'a AttrRef>) {
        match self {
            Self::Ref(r) => out.push(r),
            Self::List(items) | Self::Concat(items) => {
                for item in items {
                    item.collect_refs(out);
                }
            }
            Self::Map(entries) => {
                for value in entries.values() {
                    value.collect_refs(out);
                }
            }
            Self::Literal(_) | Self::Secret(_) => {}
        }
    }

    /// Collects every secret environment variable inside this value.
    pub fn collect_secrets<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Secret(name) => {
                out.insert(name);
            }
            Self::List(items) | Self::Concat(items) => {
                for item in items {
                    item.collect_secrets(out);
                }
            }
            Self::Map(entries) => {
                for value in entries.values() {
                    value.collect_secrets(out);
                }
            }
            Self::Literal(_) | Self::Ref(_) => {}
        }
    }

    /// Renders this value as an inline string segment.
    fn render_inline(&self) -> String {
        match self {
            Self::Literal(Value::String(s)) => s.clone(),
            Self::Literal(v) => v.to_string(),
            Self::Ref(r) => r.to_string(),
            Self::Secret(name) => format!("${{secret:{name}}}"),
            Self::List(_) | Self::Map(_) => serde_json::to_string(self).unwrap_or_default(),
            Self::Concat(parts) => parts.iter().map(Self::render_inline).collect(),
        }
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Self::str(value)
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Self::str(value)
    }
}

impl From<bool> for Property {
    fn from(value: bool) -> Self {
        Self::lit(value)
    }
}

impl From<u16> for Property {
    fn from(value: u16) -> Self {
        Self::lit(value)
    }
}

impl From<u32> for Property {
    fn from(value: u32) -> Self {
        Self::lit(value)
    }
}

impl From<f64> for Property {
    fn from(value: f64) -> Self {
        Self::lit(value)
    }
}

impl Serialize for Property {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(value) => value.serialize(serializer),
            Self::Ref(r) => serializer.serialize_str(&r.to_string()),
            Self::Concat(_) => serializer.serialize_str(&self.render_inline()),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Secret(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("fn::secret", &serde_json::json!({ "env": name }))?;
                map.end()
            }
        }
    }
}

/// A single resource declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    /// Logical name, unique within a stack.
    pub name: String,
    /// Provider type.
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Properties in key order.
    pub properties: BTreeMap<String, Property>,
}

impl Resource {
    /// Creates a resource with no properties.
    #[must_use]
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            properties: BTreeMap::new(),
        }
    }

    /// Sets a property.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Property>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sets a property when `value` is present.
    #[must_use]
    pub fn with_opt(self, key: impl Into<String>, value: Option<impl Into<Property>>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Returns the names of resources this one references, without duplicates.
    #[must_use]
    pub fn referenced_names(&self) -> BTreeSet<&str> {
        let mut refs = Vec::new();
        for value in self.properties.values() {
            value.collect_refs(&mut refs);
        }
        refs.into_iter().map(|r| r.resource.as_str()).collect()
    }

    /// Returns the secret environment variables this resource needs.
    #[must_use]
    pub fn secrets(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        for value in self.properties.values() {
            value.collect_secrets(&mut out);
        }
        out
    }
}

impl From<AttrRef> for Property {
    fn from(value: AttrRef) -> Self {
        Self::Ref(value)
    }
}
