//! Cross-cloud notification pipeline.
//!
//! An SNS topic fans out to a Lambda handler that records each message in a
//! DynamoDB table, stores attachments in a GCS bucket through a dedicated
//! service account, and sends mail through a third-party API whose key is a
//! secret.

use crate::config::NotificationsConfig;
use crate::error::Result;
use crate::graph::{Property, Resource, ResourceHandle, ResourceKind};

use super::{name_tag, StackBuilder};

const LAMBDA_BASIC_EXECUTION: &str = "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";
const BUCKET_WRITER_ROLE: &str = "roles/storage.objectAdmin";
const HANDLER_TIMEOUT_SECS: u32 = 30;

/// Handles to the declared pipeline.
#[derive(Debug, Clone)]
pub(crate) struct Pipeline {
    pub topic: ResourceHandle,
    pub bucket: ResourceHandle,
    pub service_account: ResourceHandle,
}

/// Builds an IAM trust policy for an AWS service principal.
pub(crate) fn assume_role_policy(service: &str) -> Property {
    Property::map([
        ("Version", Property::str("2012-10-17")),
        (
            "Statement",
            Property::list([Property::map([
                ("Effect", Property::str("Allow")),
                ("Action", Property::str("sts:AssumeRole")),
                (
                    "Principal",
                    Property::map([("Service", Property::str(service))]),
                ),
            ])]),
        ),
    ])
}

/// Builds a single-statement `Allow` policy document.
pub(crate) fn allow_policy(actions: &[&str], resource: Property) -> Property {
    Property::map([
        ("Version", Property::str("2012-10-17")),
        (
            "Statement",
            Property::list([Property::map([
                ("Effect", Property::str("Allow")),
                (
                    "Action",
                    Property::list(actions.iter().map(|a| Property::str(*a))),
                ),
                ("Resource", resource),
            ])]),
        ),
    ])
}

pub(crate) fn declare(builder: &mut StackBuilder, config: &NotificationsConfig) -> Result<Pipeline> {
    // GCP side: bucket and the identity allowed to write to it.
    let bucket = builder.declare(
        Resource::new(ResourceKind::StorageBucket, config.bucket_name.as_str())
            .with("name", config.bucket_name.as_str())
            .with("location", config.bucket_location.as_str())
            .with("project", config.gcp_project.as_str())
            .with("uniformBucketLevelAccess", true),
    )?;
    let service_account = builder.declare(
        Resource::new(ResourceKind::ServiceAccount, config.service_account_id.as_str())
            .with("accountId", config.service_account_id.as_str())
            .with("displayName", format!("{} uploader", config.function_name))
            .with("project", config.gcp_project.as_str()),
    )?;
    let key = builder.declare(
        Resource::new(ResourceKind::ServiceAccountKey, format!("{}-key", config.service_account_id))
            .with("serviceAccountId", service_account.attr("name")),
    )?;
    builder.declare(
        Resource::new(ResourceKind::BucketIamMember, format!("{}-writer", config.bucket_name))
            .with("bucket", bucket.attr("name"))
            .with("role", BUCKET_WRITER_ROLE)
            .with(
                "member",
                Property::concat([Property::str("serviceAccount:"), service_account.attr("email")]),
            ),
    )?;

    // AWS side.
    let topic = builder.declare(
        Resource::new(ResourceKind::SnsTopic, config.topic_name.as_str())
            .with("name", config.topic_name.as_str())
            .with("tags", name_tag(&config.topic_name)),
    )?;
    let table = builder.declare(
        Resource::new(ResourceKind::DynamoTable, config.table_name.as_str())
            .with("name", config.table_name.as_str())
            .with("billingMode", "PAY_PER_REQUEST")
            .with("hashKey", "id")
            .with(
                "attributes",
                Property::list([Property::map([
                    ("name", Property::str("id")),
                    ("type", Property::str("S")),
                ])]),
            )
            .with("tags", name_tag(&config.table_name)),
    )?;

    let function = &config.function_name;
    let role = builder.declare(
        Resource::new(ResourceKind::IamRole, format!("{function}-role"))
            .with("assumeRolePolicy", assume_role_policy("lambda.amazonaws.com")),
    )?;
    builder.declare(
        Resource::new(ResourceKind::IamRolePolicyAttachment, format!("{function}-basic-execution"))
            .with("role", role.attr("name"))
            .with("policyArn", LAMBDA_BASIC_EXECUTION),
    )?;
    let table_policy = builder.declare(
        Resource::new(ResourceKind::IamPolicy, format!("{function}-table-access"))
            .with(
                "policy",
                allow_policy(
                    &["dynamodb:PutItem", "dynamodb:GetItem", "dynamodb:UpdateItem", "dynamodb:Query"],
                    table.arn(),
                ),
            ),
    )?;
    builder.declare(
        Resource::new(ResourceKind::IamRolePolicyAttachment, format!("{function}-table-access-attachment"))
            .with("role", role.attr("name"))
            .with("policyArn", table_policy.arn()),
    )?;

    let handler = builder.declare(
        Resource::new(ResourceKind::LambdaFunction, function.as_str())
            .with("name", function.as_str())
            .with("runtime", config.runtime.as_str())
            .with("handler", config.handler.as_str())
            .with("code", config.package_path.as_str())
            .with("role", role.arn())
            .with("timeout", HANDLER_TIMEOUT_SECS)
            .with(
                "environment",
                Property::map([(
                    "variables",
                    Property::map([
                        ("BUCKET_NAME", bucket.attr("name")),
                        ("GCP_CREDENTIALS", key.attr("privateKey")),
                        ("MAIL_API_KEY", Property::secret(config.mail_api_key_env.as_str())),
                        ("MAIL_DOMAIN", Property::str(config.mail_domain.as_str())),
                        ("TABLE_NAME", table.attr("name")),
                    ]),
                )]),
            )
            .with("tags", name_tag(function)),
    )?;

    builder.declare(
        Resource::new(ResourceKind::SnsSubscription, format!("{}-subscription", config.topic_name))
            .with("topic", topic.arn())
            .with("protocol", "lambda")
            .with("endpoint", handler.arn()),
    )?;
    builder.declare(
        Resource::new(ResourceKind::LambdaPermission, format!("{function}-sns-invoke"))
            .with("action", "lambda:InvokeFunction")
            .with("function", handler.attr("name"))
            .with("principal", "sns.amazonaws.com")
            .with("sourceArn", topic.arn()),
    )?;

    Ok(Pipeline {
        topic,
        bucket,
        service_account,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::fixtures::{config, FULL};
    use std::collections::BTreeMap;

    #[test]
    fn test_pipeline_wiring() {
        let config = config(FULL);
        let notifications = config.notifications.as_ref().expect("notifications");
        let mut builder = StackBuilder::new(BTreeMap::new());

        let pipeline = declare(&mut builder, notifications).expect("pipeline");
        assert_eq!(pipeline.topic.name(), "app-notifications");

        let graph = &builder.graph;
        assert_eq!(
            graph.dependencies("notification-handler").expect("deps"),
            vec!["shop-submissions", "shop-lambda-key", "email-tracking", "notification-handler-role"]
        );
        assert_eq!(
            graph.dependencies("notification-handler-sns-invoke").expect("deps"),
            vec!["app-notifications", "notification-handler"]
        );
        assert!(graph.secrets().contains("STRATUS_MAIL_API_KEY"));

        let member = graph.get("shop-submissions-writer").expect("member");
        let json = serde_json::to_value(&member.properties["member"]).expect("json");
        assert_eq!(json, serde_json::json!("serviceAccount:${shop-lambda.email}"));
    }
}
