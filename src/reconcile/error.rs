use super::Phase;
use crate::lifecycle::CommandFailure;
use crate::store::StoreError;
use std::fmt;

/// Conditions that abort a reconcile run
#[derive(Debug)]
pub enum ReconcileError {
    /// Loading identifiers or ensuring artifacts failed
    Store(StoreError),

    /// The infrastructure tool cannot be started
    ToolMissing(CommandFailure),

    /// `init`, `plan` or `apply` failed
    Lifecycle(CommandFailure),

    /// The run was cancelled before `phase` started or continued
    Interrupted { phase: Phase },
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Store(err) => write!(f, "{}", err),
            ReconcileError::ToolMissing(failure) => {
                write!(f, "Infrastructure tool unavailable: {}", failure)
            }
            ReconcileError::Lifecycle(failure) => write!(f, "Error during {}", failure),
            ReconcileError::Interrupted { phase } => {
                write!(f, "Interrupted during {}", phase)
            }
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Store(err) => Some(err),
            ReconcileError::ToolMissing(failure) | ReconcileError::Lifecycle(failure) => {
                Some(failure)
            }
            ReconcileError::Interrupted { .. } => None,
        }
    }
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        ReconcileError::Store(err)
    }
}
