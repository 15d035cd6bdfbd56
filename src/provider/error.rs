use crate::resource::ResourceId;
use std::fmt;

/// Failure to describe a single resource.
///
/// Neither variant is fatal to a reconcile run: the identifier is skipped and
/// the loop moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescribeError {
    /// The provider returned zero matches for the identifier
    NotFound { id: ResourceId },

    /// Transport, authorization or service failure, or unreadable output
    Provider { id: ResourceId, message: String },
}

#[cfg(test)]
impl DescribeError {
    pub fn id(&self) -> &ResourceId {
        match self {
            DescribeError::NotFound { id } | DescribeError::Provider { id, .. } => id,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DescribeError::NotFound { .. })
    }
}

impl fmt::Display for DescribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescribeError::NotFound { id } => {
                write!(f, "VPC with ID '{}' not found", id)
            }
            DescribeError::Provider { id, message } => {
                write!(f, "Provider API error for '{}': {}", id, message)
            }
        }
    }
}

impl std::error::Error for DescribeError {}

/// Result type for describe operations
pub type DescribeResult<T> = Result<T, DescribeError>;
