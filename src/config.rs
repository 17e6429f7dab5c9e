//! Configuration file handling.
//!
//! This module handles loading configuration from
//! `.tracto-retest.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Reliability estimator settings.
    #[serde(default)]
    pub estimator: EstimatorConfig,

    /// Bar chart settings.
    #[serde(default)]
    pub chart: ChartConfig,

    /// Agreement box-plot settings.
    #[serde(default)]
    pub agreements: AgreementsConfig,
}

/// Reliability estimator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    /// Confidence level of the reported interval.
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    /// Minimum number of usable ratings; below this the zero sentinel is
    /// reported instead of an estimate.
    #[serde(default = "default_min_ratings")]
    pub min_ratings: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            min_ratings: default_min_ratings(),
        }
    }
}

fn default_confidence() -> f64 {
    0.95
}

fn default_min_ratings() -> usize {
    5
}

/// Bar chart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Bar fill colors, one hex string per metric (length, volume,
    /// streamline count).
    #[serde(default = "default_colors")]
    pub colors: Vec<String>,

    /// Bar fill opacity.
    #[serde(default = "default_bar_alpha")]
    pub bar_alpha: f64,

    /// Bar width in group coordinates.
    #[serde(default = "default_bar_width")]
    pub bar_width: f64,

    /// Chart height in pixels.
    #[serde(default = "default_chart_height")]
    pub height: u32,

    /// Horizontal pixels allotted per bundle group.
    #[serde(default = "default_width_per_bundle")]
    pub width_per_bundle: u32,

    /// Lower bound on the chart width in pixels.
    #[serde(default = "default_min_width")]
    pub min_width: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            colors: default_colors(),
            bar_alpha: default_bar_alpha(),
            bar_width: default_bar_width(),
            height: default_chart_height(),
            width_per_bundle: default_width_per_bundle(),
            min_width: default_min_width(),
        }
    }
}

fn default_colors() -> Vec<String> {
    vec![
        "#FFA500".to_string(), // orange
        "#008000".to_string(), // green
        "#0000FF".to_string(), // blue
    ]
}

fn default_bar_alpha() -> f64 {
    0.75
}

fn default_bar_width() -> f64 {
    0.8
}

fn default_chart_height() -> u32 {
    500
}

fn default_width_per_bundle() -> u32 {
    50
}

fn default_min_width() -> u32 {
    640
}

/// Agreement box-plot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementsConfig {
    /// Agreement metrics merged from the per-bundle files, in rendering
    /// order.
    #[serde(default = "default_agreement_metrics")]
    pub metrics: Vec<String>,

    /// Fixed y-axis range per metric. Metrics without an entry are
    /// auto-scaled.
    #[serde(default = "default_y_limits")]
    pub y_limits: BTreeMap<String, [f64; 2]>,
}

impl Default for AgreementsConfig {
    fn default() -> Self {
        Self {
            metrics: default_agreement_metrics(),
            y_limits: default_y_limits(),
        }
    }
}

fn default_agreement_metrics() -> Vec<String> {
    vec![
        "bundle_adjacency_voxels",
        "w_dice_voxels",
        "density_correlation",
        "dice_voxels",
        "bundle_adjacency_streamlines",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_y_limits() -> BTreeMap<String, [f64; 2]> {
    [
        ("dice_voxels", [0.0, 1.01]),
        ("w_dice_voxels", [0.0, 1.01]),
        ("density_correlation", [0.0, 1.01]),
        ("bundle_adjacency_voxels", [0.0, 10.0]),
        ("bundle_adjacency_streamlines", [0.0, 10.0]),
    ]
    .into_iter()
    .map(|(metric, range)| (metric.to_string(), range))
    .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".tracto-retest.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
