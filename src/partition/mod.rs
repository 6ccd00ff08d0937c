//! Query partitioning
//!
//! Turns a `(job index, job count)` pair into the ordered search queries that
//! job is responsible for. Pure and deterministic: no state, no I/O.

mod bucket;
mod defaults;
mod plan;

pub use bucket::{Bucket, Dimension};
pub use plan::{PartitionPlan, MAX_RESULTS_PER_QUERY};

use crate::{PartitionError, PartitionResult};
use std::fmt;

/// One search query a job will paginate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDescriptor {
    query: String,
    description: String,
    expected_results: Option<u32>,
}

impl QueryDescriptor {
    /// Creates a descriptor, rejecting an empty query string
    pub fn new(
        query: impl Into<String>,
        description: impl Into<String>,
        expected_results: Option<u32>,
    ) -> PartitionResult<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(PartitionError::EmptyQuery);
        }

        Ok(Self {
            query,
            description: description.into(),
            expected_results,
        })
    }

    /// Platform search syntax, e.g. `is:public stars:0..2 sort:updated`
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Yield hint; never enforced
    pub fn expected_results(&self) -> Option<u32> {
        self.expected_results
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.query, self.description)
    }
}
