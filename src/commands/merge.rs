use super::{ProjectArgs, ProviderArgs, reconcile};
use crate::config::CliOverrides;
use crate::context::Context;
use crate::reconcile::RunMode;
use anyhow::Result;
use clap::Args;

/// Discover the listed VPCs and update the Terraform files without running the tool
#[derive(Debug, Args)]
pub struct MergeCommand {
    #[command(flatten)]
    project: ProjectArgs,

    #[command(flatten)]
    provider: ProviderArgs,

    /// Exit with 0 even when some VPCs could not be discovered
    #[arg(long)]
    allow_partial: bool,
}

impl MergeCommand {
    /// Execute the command and return the process exit code
    pub fn execute(self, ctx: &Context) -> Result<i32> {
        let overrides = CliOverrides {
            tool: None,
            region: self.provider.region,
            aws_profile: self.provider.profile,
            allow_partial_failures: self.allow_partial,
        };

        reconcile::run(ctx, &self.project.path, &overrides, RunMode::MergeOnly, None)
    }
}
