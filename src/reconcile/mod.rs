//! Reconcile the desired VPC identifiers with the project and the tool state.
//!
//! Phases run strictly in order:
//!
//! ```text
//! load identifiers -> discover & merge (per id) -> ensure artifacts
//!     -> init -> import (per id) -> plan -> apply
//! ```
//!
//! Per-identifier failures are recorded and the loop moves on. Anything else
//! ends the run with a [`ReconcileError`] stored in the [`RunReport`].

pub mod error;
pub mod report;

pub use error::ReconcileError;
pub use report::{DiscoveryOutcome, ImportOutcome, ResourceReport, RunReport};

use crate::lifecycle::{self, LifecycleRunner, Subcommand};
use crate::provider::ResourceDescriber;
use crate::resource::ResourceId;
use crate::store::{ConfigStore, EnsureOutcome, TFVARS_FILE};
use crate::traits::Output;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Which phases a run goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Every phase through `apply`
    #[default]
    Full,
    /// Stop after `plan`
    PlanOnly,
    /// Stop after the artifacts are ensured; the tool is never invoked
    MergeOnly,
}

/// Reconcile phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    LoadIdentifiers,
    DiscoverAndMerge,
    EnsureArtifacts,
    Init,
    Import,
    Plan,
    Apply,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::LoadIdentifiers => "load_identifiers",
            Phase::DiscoverAndMerge => "discover_and_merge",
            Phase::EnsureArtifacts => "ensure_artifacts",
            Phase::Init => "init",
            Phase::Import => "import",
            Phase::Plan => "plan",
            Phase::Apply => "apply",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for a reconcile run
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub mode: RunMode,
    /// Region passed to the describer; empty lets the provider decide
    pub region: String,
}

/// Drives one reconcile run
pub struct Orchestrator<'a> {
    store: &'a ConfigStore,
    describer: &'a dyn ResourceDescriber,
    runner: &'a dyn LifecycleRunner,
    output: &'a dyn Output,
    options: ReconcileOptions,
    cancelled: Arc<AtomicBool>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        store: &'a ConfigStore,
        describer: &'a dyn ResourceDescriber,
        runner: &'a dyn LifecycleRunner,
        output: &'a dyn Output,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            store,
            describer,
            runner,
            output,
            options,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag, typically set from a Ctrl-C handler
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Run every phase allowed by the mode and report what happened
    pub fn run(&self) -> RunReport {
        let mut report = RunReport::new(
            self.store.project_dir(),
            self.runner.tool_name(),
            self.options.region.clone(),
            self.options.mode,
        );

        if let Err(err) = self.execute(&mut report) {
            self.output.error(&err.to_string());
            report.fatal = Some(err);
        }

        report.finished_at = Some(Utc::now());
        report
    }

    fn execute(&self, report: &mut RunReport) -> Result<(), ReconcileError> {
        self.checkpoint(Phase::LoadIdentifiers)?;
        let ids = self.load_identifiers()?;
        report.resources = ids.into_iter().map(ResourceReport::new).collect();
        report.last_phase = Some(Phase::LoadIdentifiers);

        self.output.section("Discovering VPCs");
        if self.options.region.is_empty() {
            self.output.dimmed("Region: provider default");
        } else {
            self.output.key_value("Region", &self.options.region);
        }
        for resource in report.resources.iter_mut() {
            self.checkpoint(Phase::DiscoverAndMerge)?;
            resource.discovery = Some(self.discover_and_merge(&resource.id));
        }
        report.last_phase = Some(Phase::DiscoverAndMerge);

        self.checkpoint(Phase::EnsureArtifacts)?;
        self.output.section("Ensuring configuration");
        let declaration = self.store.ensure_resource_declaration()?;
        self.log_ensure("Resource aws_vpc.my_existing_vpc", "main.tf", declaration);
        report.resource_declaration = Some(declaration);

        let schema = self.store.ensure_variable_schema()?;
        self.log_ensure("Variable imported_vpc_configs", "variables.tf", schema);
        report.variable_schema = Some(schema);
        report.last_phase = Some(Phase::EnsureArtifacts);

        if self.options.mode == RunMode::MergeOnly {
            return Ok(());
        }

        self.checkpoint(Phase::Init)?;
        self.output.section(&format!("Running {}", self.runner.tool_name()));
        self.runner
            .check_installed()
            .map_err(ReconcileError::ToolMissing)?;
        self.run_phase(Subcommand::Init)?;
        report.last_phase = Some(Phase::Init);

        for resource in report.resources.iter_mut() {
            self.checkpoint(Phase::Import)?;
            resource.import = self.import(&resource.id);
        }
        report.last_phase = Some(Phase::Import);

        self.checkpoint(Phase::Plan)?;
        self.run_phase(Subcommand::Plan)?;
        report.last_phase = Some(Phase::Plan);

        if self.options.mode == RunMode::PlanOnly {
            return Ok(());
        }

        self.checkpoint(Phase::Apply)?;
        self.run_phase(Subcommand::Apply)?;
        report.last_phase = Some(Phase::Apply);

        Ok(())
    }

    fn checkpoint(&self, phase: Phase) -> Result<(), ReconcileError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(ReconcileError::Interrupted { phase });
        }
        Ok(())
    }

    /// Desired identifiers in file order, first occurrence wins
    fn load_identifiers(&self) -> Result<Vec<ResourceId>, ReconcileError> {
        let listed = self.store.load_desired_identifiers()?;
        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(listed.len());

        for id in listed {
            if seen.insert(id.clone()) {
                ids.push(id);
            } else {
                self.output.warning(&format!(
                    "VPC {} is listed more than once in {}; reconciling it once",
                    id, TFVARS_FILE
                ));
            }
        }

        Ok(ids)
    }

    fn discover_and_merge(&self, id: &ResourceId) -> DiscoveryOutcome {
        match self.store.is_already_imported(id) {
            Ok(true) => {
                self.output.dimmed(&format!(
                    "VPC {} has already been imported. Skipping update.",
                    id
                ));
                return DiscoveryOutcome::AlreadyImported;
            }
            Ok(false) => {}
            Err(err) => {
                self.output
                    .error(&format!("Cannot check VPC {}: {}", id, err));
                return DiscoveryOutcome::Failed(err.to_string());
            }
        }

        let attributes = match self.describer.describe(id, &self.options.region) {
            Ok(attributes) => attributes,
            Err(err) => {
                self.output.error(&err.to_string());
                return DiscoveryOutcome::Failed(err.to_string());
            }
        };

        match self.store.merge_resource(id, &attributes) {
            Ok(()) => {
                self.output.success(&format!(
                    "Merged VPC {} ({}) into {}",
                    id, attributes.cidr_block, TFVARS_FILE
                ));
                DiscoveryOutcome::Merged
            }
            Err(err) => {
                self.output
                    .error(&format!("Failed to record VPC {}: {}", id, err));
                DiscoveryOutcome::Failed(err.to_string())
            }
        }
    }

    fn import(&self, id: &ResourceId) -> ImportOutcome {
        let args = [lifecycle::import_address(id), id.to_string()];

        match self.runner.run(Subcommand::Import, &args) {
            Ok(_) => {
                self.output.success(&format!("Imported VPC {}", id));
                ImportOutcome::Imported
            }
            Err(failure) if lifecycle::is_already_managed(&failure) => {
                self.output.dimmed(&format!(
                    "VPC {} is already managed by {}",
                    id,
                    self.runner.tool_name()
                ));
                ImportOutcome::AlreadyManaged
            }
            Err(failure) => {
                self.output
                    .error(&format!("Error during VPC import for {}: {}", id, failure));
                for line in failure.stderr.lines().filter(|l| !l.trim().is_empty()) {
                    self.output.dimmed(&format!("  {}", line));
                }
                ImportOutcome::Failed(failure.to_string())
            }
        }
    }

    fn run_phase(&self, subcommand: Subcommand) -> Result<(), ReconcileError> {
        self.output.info(&format!(
            "Running {} {}...",
            self.runner.tool_name(),
            subcommand
        ));
        self.runner
            .run(subcommand, &[])
            .map_err(ReconcileError::Lifecycle)?;
        self.output.success(&format!("{} completed", subcommand));
        Ok(())
    }

    fn log_ensure(&self, what: &str, file_name: &str, outcome: EnsureOutcome) {
        match outcome {
            EnsureOutcome::Created => self
                .output
                .success(&format!("Created {} with {}", file_name, what)),
            EnsureOutcome::Appended => self
                .output
                .success(&format!("Appended {} to {}", what, file_name)),
            EnsureOutcome::AlreadyPresent => self
                .output
                .dimmed(&format!("{} already declared", what)),
        }
    }
}
