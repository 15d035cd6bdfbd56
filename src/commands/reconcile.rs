use super::{ProjectArgs, ProviderArgs};
use crate::config::{CliOverrides, Settings};
use crate::context::Context;
use crate::lifecycle::{Tool, ToolRunner};
use crate::provider::AwsCliDescriber;
use crate::reconcile::{
    DiscoveryOutcome, ImportOutcome, Orchestrator, ReconcileOptions, RunMode, RunReport,
};
use crate::store::ConfigStore;
use crate::traits::Output;
use anyhow::{Context as _, Result};
use clap::Args;
use std::path::{Path, PathBuf};

/// Discover, merge, import, plan and apply the VPCs listed in terraform.tfvars
#[derive(Debug, Args)]
pub struct ReconcileCommand {
    #[command(flatten)]
    project: ProjectArgs,

    #[command(flatten)]
    provider: ProviderArgs,

    /// Infrastructure tool to drive
    #[arg(short, long, value_enum, env = "VPC_IMPORT_TOOL")]
    tool: Option<Tool>,

    /// Stop after plan; nothing is applied
    #[arg(long)]
    plan_only: bool,

    /// Exit with 0 even when some VPCs failed discovery or import
    #[arg(long)]
    allow_partial: bool,

    /// Write a JSON run report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

impl ReconcileCommand {
    /// Execute the command and return the process exit code
    pub fn execute(self, ctx: &Context) -> Result<i32> {
        let mode = if self.plan_only {
            RunMode::PlanOnly
        } else {
            RunMode::Full
        };

        let overrides = CliOverrides {
            tool: self.tool,
            region: self.provider.region,
            aws_profile: self.provider.profile,
            allow_partial_failures: self.allow_partial,
        };

        run(ctx, &self.project.path, &overrides, mode, self.report.as_deref())
    }
}

/// Wire the real describer and runner to an orchestrator and run it
pub(crate) fn run(
    ctx: &Context,
    project_dir: &Path,
    overrides: &CliOverrides,
    mode: RunMode,
    report_path: Option<&Path>,
) -> Result<i32> {
    let store = ConfigStore::new(ctx.fs.clone(), project_dir);
    let settings = Settings::load(ctx.fs.as_ref(), &store, overrides)
        .context("Failed to load settings")?;

    ctx.output.section("VPC import");
    ctx.output
        .key_value("Project", &project_dir.display().to_string());
    if mode != RunMode::MergeOnly {
        ctx.output.key_value("Tool", settings.tool.binary());
    }
    if let Some(profile) = &settings.aws_profile {
        ctx.output.key_value("AWS profile", profile);
    }

    let describer = AwsCliDescriber::new(ctx.command.clone(), project_dir)
        .with_profile(settings.aws_profile.clone())
        .with_timeout(settings.describe_timeout);

    let runner = ToolRunner::new(settings.tool, ctx.command.clone(), project_dir)
        .with_timeout(settings.command_timeout);

    let report = Orchestrator::new(
        &store,
        &describer,
        &runner,
        ctx.output.as_ref(),
        ReconcileOptions {
            mode,
            region: settings.region.clone(),
        },
    )
    .with_cancel_flag(ctx.cancelled.clone())
    .run();

    print_summary(ctx.output.as_ref(), &report);

    if let Some(path) = report_path {
        let json = report.to_json().context("Failed to serialize run report")?;
        ctx.fs
            .write(path, &json)
            .with_context(|| format!("Failed to write run report: {}", path.display()))?;
        ctx.output
            .dimmed(&format!("Run report written to {}", path.display()));
    }

    let exit_code = report.exit_code(settings.allow_partial_failures);
    if exit_code == 2 {
        let failed = report.failed_identifiers();
        ctx.output.warning(&format!(
            "{} of {} VPCs failed: {}",
            failed.len(),
            report.resources.len(),
            failed
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    Ok(exit_code)
}

fn print_summary(output: &dyn Output, report: &RunReport) {
    if report.resources.is_empty() {
        return;
    }

    output.section("Summary");
    output.key_value(
        "Merged",
        &report
            .count_discovery(|o| matches!(o, DiscoveryOutcome::Merged))
            .to_string(),
    );
    output.key_value(
        "Already imported",
        &report
            .count_discovery(|o| matches!(o, DiscoveryOutcome::AlreadyImported))
            .to_string(),
    );
    output.key_value(
        "Discovery failed",
        &report
            .count_discovery(|o| matches!(o, DiscoveryOutcome::Failed(_)))
            .to_string(),
    );

    if report.mode != RunMode::MergeOnly {
        output.key_value(
            "Imported",
            &report
                .count_import(|o| matches!(o, ImportOutcome::Imported | ImportOutcome::AlreadyManaged))
                .to_string(),
        );
        output.key_value(
            "Import failed",
            &report
                .count_import(|o| matches!(o, ImportOutcome::Failed(_)))
                .to_string(),
        );
    }

    if report.fatal.is_none() {
        output.success("Reconcile finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockCommandExecutor, MockCommandResult, MockFileSystem, MockOutput};
    use std::sync::Arc;

    const DESCRIBE_VPC_1: &str = r#"{"Vpcs":[{"CidrBlock":"10.0.0.0/16","Tags":[{"Key":"Name","Value":"A"}]}]}"#;

    fn context(fs: Arc<MockFileSystem>, command: Arc<MockCommandExecutor>) -> (Context, Arc<MockOutput>) {
        let output = Arc::new(MockOutput::new());
        (Context::test_with(fs, output.clone(), command), output)
    }

    #[test]
    fn test_run_wires_aws_and_tool() {
        let fs = Arc::new(MockFileSystem::new().with_file(
            "/project/terraform.tfvars",
            "aws_region = \"us-east-1\"\nexisting_vpc_ids = [\"vpc-1\", \"vpc-2\"]\n",
        ));
        let command = Arc::new(MockCommandExecutor::with_outputs(vec![
            MockCommandResult {
                command: "aws".to_string(),
                when_arg: Some("vpc-1".to_string()),
                stdout: DESCRIBE_VPC_1.to_string(),
                ..Default::default()
            },
            MockCommandResult {
                command: "aws".to_string(),
                when_arg: Some("vpc-2".to_string()),
                exit_code: 254,
                stderr: "An error occurred (InvalidVpcID.NotFound)".to_string(),
                ..Default::default()
            },
        ]));
        let (ctx, output) = context(fs.clone(), command.clone());

        let code = run(
            &ctx,
            Path::new("/project"),
            &CliOverrides::default(),
            RunMode::Full,
            Some(Path::new("/project/report.json")),
        )
        .unwrap();

        assert_eq!(code, 2);

        let calls = command.calls();
        let aws_calls: Vec<_> = calls.iter().filter(|c| c.command == "aws").collect();
        assert_eq!(aws_calls.len(), 2);
        assert!(aws_calls[0].args.windows(2).any(|w| w == ["--region", "us-east-1"]));

        let tool_args: Vec<String> = calls
            .iter()
            .filter(|c| c.command == "terraform")
            .map(|c| c.args[0].clone())
            .collect();
        assert_eq!(
            tool_args,
            vec!["version", "init", "import", "import", "plan", "apply"]
        );

        let report = fs
            .get_file_contents(Path::new("/project/report.json"))
            .unwrap();
        let report: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(report["resources"][1]["discovery"]["status"], "failed");
        assert_eq!(report["last_phase"], "apply");

        assert!(output.get_warnings().iter().any(|w| w.contains("1 of 2")));
    }

    #[test]
    fn test_merge_only_with_allow_partial() {
        let fs = Arc::new(MockFileSystem::new().with_file(
            "/project/terraform.tfvars",
            "existing_vpc_ids = [\"vpc-9\"]\n",
        ));
        let command = Arc::new(MockCommandExecutor::with_outputs(vec![MockCommandResult {
            command: "aws".to_string(),
            exit_code: 255,
            stderr: "Unable to locate credentials".to_string(),
            ..Default::default()
        }]));
        let (ctx, output) = context(fs, command.clone());
        let overrides = CliOverrides {
            allow_partial_failures: true,
            ..Default::default()
        };

        let code = run(&ctx, Path::new("/project"), &overrides, RunMode::MergeOnly, None).unwrap();

        assert_eq!(code, 0);
        assert!(command.calls().iter().all(|c| c.command == "aws"));
        assert!(
            output
                .get_errors()
                .iter()
                .any(|e| e.contains("vpc-9") && e.contains("Unable to locate credentials"))
        );
    }

    #[test]
    fn test_missing_tfvars_exits_with_one() {
        let fs = Arc::new(MockFileSystem::new());
        let command = Arc::new(MockCommandExecutor::new());
        let (ctx, output) = context(fs, command.clone());

        let code = run(
            &ctx,
            Path::new("/project"),
            &CliOverrides::default(),
            RunMode::Full,
            None,
        )
        .unwrap();

        assert_eq!(code, 1);
        assert!(command.calls().is_empty());
        assert!(output.has_error());
    }
}
