use super::ProjectArgs;
use crate::context::Context;
use crate::store::{ConfigStore, MarkerBlock, RESOURCE_DECLARATION, StoreError, VARIABLE_SCHEMA};
use anyhow::Result;
use clap::Args;

/// Show which listed VPCs are merged and whether the Terraform blocks exist
#[derive(Debug, Args)]
pub struct StatusCommand {
    #[command(flatten)]
    project: ProjectArgs,
}

impl StatusCommand {
    /// Execute the command and return the process exit code
    pub fn execute(self, ctx: &Context) -> Result<i32> {
        let store = ConfigStore::new(ctx.fs.clone(), &self.project.path);

        ctx.output.section("VPC import status");
        ctx.output
            .key_value("Project", &self.project.path.display().to_string());

        let desired = match store.load_desired_identifiers() {
            Ok(ids) => ids,
            Err(err @ (StoreError::MissingConfig { .. } | StoreError::EmptyList { .. })) => {
                ctx.output.error(&err.to_string());
                return Ok(1);
            }
            Err(err) => return Err(err.into()),
        };

        match store.region()? {
            Some(region) => ctx.output.key_value("Region", &region),
            None => ctx.output.key_value("Region", "provider default"),
        }

        let imported = store.imported_config_set()?;

        ctx.output.subsection("VPCs");
        for id in &desired {
            match imported.get(id) {
                Some(entry) => ctx
                    .output
                    .success(&format!("{} merged ({})", id, entry.cidr_block)),
                None => ctx.output.warning(&format!("{} not merged yet", id)),
            }
        }

        for id in imported.ids().filter(|id| !desired.contains(id)) {
            ctx.output.dimmed(&format!(
                "{} is merged but no longer listed in existing_vpc_ids",
                id
            ));
        }

        ctx.output.subsection("Terraform blocks");
        Self::show_block(ctx, &store, &RESOURCE_DECLARATION)?;
        Self::show_block(ctx, &store, &VARIABLE_SCHEMA)?;

        let pending = desired.iter().filter(|id| !imported.contains(id)).count();
        ctx.output.blank();
        ctx.output.key_value(
            "Merged",
            &format!("{}/{}", desired.len() - pending, desired.len()),
        );

        Ok(0)
    }

    fn show_block(ctx: &Context, store: &ConfigStore, block: &MarkerBlock) -> Result<()> {
        let state = match store.marker_count(block)? {
            0 => "missing".to_string(),
            1 => "declared".to_string(),
            n => format!("declared {} times", n),
        };

        ctx.output.key_value(&block.address(), &state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockCommandExecutor, MockFileSystem, MockOutput, OutputMessage};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn status(fs: MockFileSystem) -> (i32, Arc<MockOutput>, Arc<MockCommandExecutor>) {
        let output = Arc::new(MockOutput::new());
        let command = Arc::new(MockCommandExecutor::new());
        let ctx = Context::test_with(Arc::new(fs), output.clone(), command.clone());

        let code = StatusCommand {
            project: ProjectArgs {
                path: PathBuf::from("/project"),
            },
        }
        .execute(&ctx)
        .unwrap();

        (code, output, command)
    }

    #[test]
    fn test_status_reports_merged_and_pending() {
        let fs = MockFileSystem::new()
            .with_file(
                "/project/terraform.tfvars",
                "existing_vpc_ids = [\"vpc-1\", \"vpc-2\"]\n\nimported_vpc_configs = {\n  \"vpc-1\" = {\n    cidr_block = \"10.0.0.0/16\"\n  }\n  \"vpc-old\" = {\n    cidr_block = \"10.9.0.0/16\"\n  }\n}\n",
            )
            .with_file("/project/main.tf", RESOURCE_DECLARATION.template);

        let (code, output, command) = status(fs);

        assert_eq!(code, 0);
        assert!(command.calls().is_empty());

        let messages = output.get_messages();
        assert!(messages.contains(&OutputMessage::Success(
            "vpc-1 merged (10.0.0.0/16)".to_string()
        )));
        assert_eq!(output.get_warnings(), vec!["vpc-2 not merged yet".to_string()]);
        assert!(messages.contains(&OutputMessage::KeyValue(
            "resource.aws_vpc.my_existing_vpc".to_string(),
            "declared".to_string()
        )));
        assert!(messages.contains(&OutputMessage::KeyValue(
            "variable.imported_vpc_configs".to_string(),
            "missing".to_string()
        )));
        assert!(messages.contains(&OutputMessage::KeyValue(
            "Merged".to_string(),
            "1/2".to_string()
        )));
        assert!(output.to_text().contains("vpc-old is merged"));
    }

    #[test]
    fn test_status_without_tfvars() {
        let (code, output, _) = status(MockFileSystem::new());

        assert_eq!(code, 1);
        assert!(output.get_errors()[0].contains("does not exist"));
    }
}
