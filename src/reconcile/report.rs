use super::{Phase, ReconcileError, RunMode};
use crate::resource::ResourceId;
use crate::store::EnsureOutcome;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::path::PathBuf;

/// Result of discovery and merge for one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DiscoveryOutcome {
    Merged,
    AlreadyImported,
    Failed(String),
}

/// Result of `import` for one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ImportOutcome {
    Imported,
    AlreadyManaged,
    Failed(String),
    NotAttempted,
}

/// Everything that happened to one desired identifier
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub id: ResourceId,
    /// `None` when the run stopped before this identifier was discovered
    pub discovery: Option<DiscoveryOutcome>,
    pub import: ImportOutcome,
}

impl ResourceReport {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            discovery: None,
            import: ImportOutcome::NotAttempted,
        }
    }

    pub fn has_failure(&self) -> bool {
        matches!(self.discovery, Some(DiscoveryOutcome::Failed(_)))
            || matches!(self.import, ImportOutcome::Failed(_))
    }
}

/// Outcome of one reconcile run
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub project_dir: PathBuf,
    pub tool: String,
    /// Empty when the provider default applies
    pub region: String,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub resources: Vec<ResourceReport>,
    pub resource_declaration: Option<EnsureOutcome>,
    pub variable_schema: Option<EnsureOutcome>,
    /// Last phase that ran to completion
    pub last_phase: Option<Phase>,
    #[serde(serialize_with = "serialize_fatal")]
    pub fatal: Option<ReconcileError>,
}

fn serialize_fatal<S: Serializer>(
    fatal: &Option<ReconcileError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match fatal {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

impl RunReport {
    pub fn new(
        project_dir: impl Into<PathBuf>,
        tool: impl Into<String>,
        region: impl Into<String>,
        mode: RunMode,
    ) -> Self {
        Self {
            project_dir: project_dir.into(),
            tool: tool.into(),
            region: region.into(),
            mode,
            started_at: Utc::now(),
            finished_at: None,
            resources: Vec::new(),
            resource_declaration: None,
            variable_schema: None,
            last_phase: None,
            fatal: None,
        }
    }

    #[cfg(test)]
    pub fn resource(&self, id: &str) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| r.id.as_str() == id)
    }

    /// Identifiers whose discovery or import failed
    pub fn failed_identifiers(&self) -> Vec<&ResourceId> {
        self.resources
            .iter()
            .filter(|r| r.has_failure())
            .map(|r| &r.id)
            .collect()
    }

    pub fn count_discovery(&self, wanted: fn(&DiscoveryOutcome) -> bool) -> usize {
        self.resources
            .iter()
            .filter(|r| r.discovery.as_ref().is_some_and(wanted))
            .count()
    }

    pub fn count_import(&self, wanted: fn(&ImportOutcome) -> bool) -> usize {
        self.resources.iter().filter(|r| wanted(&r.import)).count()
    }

    /// Process exit status for this run.
    ///
    /// `1` on a fatal error, `2` when some identifiers failed (unless
    /// `allow_partial_failures`), `0` otherwise.
    pub fn exit_code(&self, allow_partial_failures: bool) -> i32 {
        if self.fatal.is_some() {
            1
        } else if !allow_partial_failures && !self.failed_identifiers().is_empty() {
            2
        } else {
            0
        }
    }

    /// Write the report as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
