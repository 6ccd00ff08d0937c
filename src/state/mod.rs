//! State module for tracking crawl progress
//!
//! `QueryState` tracks each query descriptor from `Pending` through pagination
//! to one of its terminal states.

mod query_state;

pub use query_state::{InvalidTransition, QueryState};
