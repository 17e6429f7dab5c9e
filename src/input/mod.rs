//! Input loading and validation.
//!
//! This module loads the flat metric tables and the subject mapping, and
//! discovers the bundle universe to analyze.

pub mod discovery;
pub mod loader;

pub use discovery::{discover_bundles, BundleUniverse};
pub use loader::{load_bundle_list, load_stats};
