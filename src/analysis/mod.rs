//! Reliability analysis modules.
//!
//! Sample construction, ICC estimation, and aggregation across the
//! bundle x metric grid.

pub mod aggregator;
pub mod estimator;
pub mod icc;
pub mod samples;

pub use aggregator::{compute_reliability, ResultStore};
pub use estimator::estimate_reliability;
pub use samples::build_sample_table;
