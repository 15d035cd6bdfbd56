//! Resource discovery against the cloud provider.
//!
//! The orchestrator only sees [`ResourceDescriber`]; the production
//! implementation shells out to the AWS CLI.

pub mod aws;
pub mod error;

pub use aws::AwsCliDescriber;
pub use error::DescribeResult;

use crate::resource::{ResourceId, VpcAttributes};

/// Read-only lookup of one resource's attributes
pub trait ResourceDescriber {
    /// Describe the resource named by `id` in `region`.
    ///
    /// An empty `region` lets the provider pick its default.
    fn describe(&self, id: &ResourceId, region: &str) -> DescribeResult<VpcAttributes>;
}

#[cfg(test)]
pub use fake::FakeDescriber;
