pub mod merge;
pub mod reconcile;
pub mod status;

pub use merge::MergeCommand;
pub use reconcile::ReconcileCommand;
pub use status::StatusCommand;

use clap::Args;
use std::path::PathBuf;

/// Location of the project
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// Project directory holding terraform.tfvars (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,
}

/// How to reach the cloud provider
#[derive(Debug, Clone, Args)]
pub struct ProviderArgs {
    /// AWS region (overrides .vpc-import.yaml and aws_region in terraform.tfvars)
    #[arg(short, long, env = "VPC_IMPORT_REGION")]
    pub region: Option<String>,

    /// Named AWS CLI profile
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,
}
