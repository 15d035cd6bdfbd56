use super::error::{DescribeError, DescribeResult};
use super::ResourceDescriber;
use crate::resource::{ResourceId, VpcAttributes};
use crate::traits::{CommandExecutor, CommandTimedOut};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Error code the EC2 API uses for unknown VPC identifiers
const NOT_FOUND_CODE: &str = "InvalidVpcID.NotFound";

/// VPC discovery through `aws ec2 describe-vpcs`.
///
/// Credentials come from the usual AWS CLI chain (environment variables,
/// `~/.aws/credentials`, instance role); `profile` selects a named profile.
pub struct AwsCliDescriber {
    command: Arc<dyn CommandExecutor>,
    working_dir: PathBuf,
    profile: Option<String>,
    timeout: Option<Duration>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVpcsResponse {
    #[serde(default)]
    vpcs: Vec<AwsVpc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsVpc {
    cidr_block: String,
    #[serde(default)]
    tags: Vec<AwsTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsTag {
    key: String,
    #[serde(default)]
    value: String,
}

impl AwsCliDescriber {
    pub fn new(command: Arc<dyn CommandExecutor>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            working_dir: working_dir.into(),
            profile: None,
            timeout: None,
        }
    }

    pub fn with_profile(mut self, profile: Option<String>) -> Self {
        self.profile = profile.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_args<'a>(&'a self, id: &'a ResourceId, region: &'a str) -> Vec<&'a str> {
        let mut args = vec![
            "ec2",
            "describe-vpcs",
            "--vpc-ids",
            id.as_str(),
            "--output",
            "json",
        ];

        if !region.is_empty() {
            args.extend(["--region", region]);
        }

        if let Some(profile) = &self.profile {
            args.extend(["--profile", profile.as_str()]);
        }

        args
    }

    fn parse_response(id: &ResourceId, stdout: &str) -> DescribeResult<VpcAttributes> {
        let response: DescribeVpcsResponse =
            serde_json::from_str(stdout).map_err(|e| DescribeError::Provider {
                id: id.clone(),
                message: format!("unexpected describe-vpcs output: {}", e),
            })?;

        let vpc = response
            .vpcs
            .into_iter()
            .next()
            .ok_or_else(|| DescribeError::NotFound { id: id.clone() })?;

        Ok(VpcAttributes {
            cidr_block: vpc.cidr_block,
            tags: vpc.tags.into_iter().map(|t| (t.key, t.value)).collect(),
        })
    }
}

impl ResourceDescriber for AwsCliDescriber {
    fn describe(&self, id: &ResourceId, region: &str) -> DescribeResult<VpcAttributes> {
        let args = self.build_args(id, region);

        let output = self
            .command
            .execute("aws", &args, &self.working_dir, self.timeout)
            .map_err(|e| {
                let message = match e.downcast_ref::<CommandTimedOut>() {
                    Some(timed_out) => timed_out.to_string(),
                    None => format!("failed to run the aws CLI: {:#}", e),
                };
                DescribeError::Provider {
                    id: id.clone(),
                    message,
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);

            if stderr.contains(NOT_FOUND_CODE) {
                return Err(DescribeError::NotFound { id: id.clone() });
            }

            return Err(DescribeError::Provider {
                id: id.clone(),
                message: match output.status.code() {
                    Some(code) => format!("aws exited with code {}: {}", code, stderr.trim()),
                    None => format!("aws was terminated: {}", stderr.trim()),
                },
            });
        }

        Self::parse_response(id, &String::from_utf8_lossy(&output.stdout))
    }
}
