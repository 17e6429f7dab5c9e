//! Agreement distribution aggregation and box plots.
//!
//! Merges per-bundle agreement metrics from many JSON files and renders
//! one interactive box plot per metric.

pub mod boxplot;
pub mod merger;

pub use boxplot::render_box_plots;
pub use merger::{merge_distributions, MergedDistributions};
