use std::fmt;
use std::path::PathBuf;

/// Error types for the declarative config store
#[derive(Debug)]
pub enum StoreError {
    /// The variable-values artifact does not exist
    MissingConfig { path: PathBuf },

    /// The variable-values artifact holds no desired identifiers
    EmptyList { path: PathBuf, variable: String },

    /// An artifact exists but cannot be decoded, or a mutation would break
    /// one of its invariants
    MalformedArtifact { path: PathBuf, message: String },

    /// Reading or writing an artifact failed
    Io { path: PathBuf, message: String },
}

impl StoreError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        StoreError::MalformedArtifact {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            message: format!("{:#}", err),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::MissingConfig { path } => {
                write!(f, "{} does not exist", path.display())
            }
            StoreError::EmptyList { path, variable } => {
                write!(
                    f,
                    "No VPC IDs found in {} (set '{}')",
                    path.display(),
                    variable
                )
            }
            StoreError::MalformedArtifact { path, message } => {
                write!(f, "Malformed {}: {}", path.display(), message)
            }
            StoreError::Io { path, message } => {
                write!(f, "I/O error on {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
