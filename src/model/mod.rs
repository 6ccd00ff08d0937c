//! Domain records produced by a crawl
//!
//! - `Repository`: one discovered repository, validated on construction
//! - `CrawlResult`: the immutable outcome of a job, with derived statistics
//! - `QueryReport`: per-query bookkeeping carried inside the result

mod repository;
mod result;

pub use repository::{InvalidRepository, Repository};
pub use result::{CrawlResult, QueryReport};
