//! Grouped bar chart of the reliability results.
//!
//! One bar group per bundle, one bar per metric, with asymmetric error
//! whiskers from the confidence intervals. The y axis is fixed to the
//! theoretical ICC range.

use crate::analysis::ResultStore;
use crate::config::ChartConfig;
use crate::models::{MetricKind, ReliabilityResult};
use anyhow::{bail, Context, Result};
use plotters::chart::SeriesLabelPosition;
use plotters::prelude::*;
use plotters::style::FontTransform;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the rendered chart.
const CHART_FILE: &str = "test_retest_icc_barchart.png";

/// Theoretical ICC range; the displayed axis is clipped to it.
const Y_MIN: f64 = -1.0;
const Y_MAX: f64 = 1.0;

/// Bars per group (one per metric).
const N_BARS: usize = 3;

/// Distance between group origins in x units.
const GROUP_STRIDE: f64 = (N_BARS + 3) as f64;

/// Half width of a whisker cap in x units.
const CAP_HALF_WIDTH: f64 = 0.15;

/// Render the grouped bar chart to `test_retest_icc_barchart.png` in the
/// output directory, returning the written path.
pub fn render_icc_chart(
    store: &ResultStore,
    config: &ChartConfig,
    output_dir: &Path,
) -> Result<PathBuf> {
    let bundles: Vec<&String> = store.bundles().collect();
    let colors = metric_colors(config)?;

    let path = output_dir.join(CHART_FILE);
    let width = config
        .min_width
        .max(160 + config.width_per_bundle * bundles.len() as u32);

    let backend_path = path.clone();
    let root = BitMapBackend::new(&backend_path, (width, config.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let last_group = (bundles.len().saturating_sub(1)) as f64 * GROUP_STRIDE;
    let x_range = -2.0..(last_group + 3.0);

    let mut chart = ChartBuilder::on(&root)
        .caption("ICC results", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(110)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, Y_MIN..Y_MAX)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .x_desc("Bundles")
        .y_desc("ICC")
        .draw()?;

    for (bar_index, metric) in MetricKind::ALL.into_iter().enumerate() {
        let color = colors[bar_index];
        let half_width = config.bar_width / 2.0;

        let mut bars = Vec::new();
        let mut whiskers = Vec::new();
        for (group, bundle) in bundles.iter().enumerate() {
            let result = store.get(bundle, metric)?;
            let x = group as f64 * GROUP_STRIDE + bar_index as f64;

            bars.push(Rectangle::new(
                [(x - half_width, 0.0), (x + half_width, result.icc)],
                color.mix(config.bar_alpha).filled(),
            ));
            whiskers.extend(whisker_elements(x, result));
        }

        chart
            .draw_series(bars)?
            .label(metric.legend_label())
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 4), (x + 12, y + 4)], color.filled())
            });
        chart.draw_series(whiskers)?;
    }

    // Bundle names, rotated, below the group centers.
    let label_font = ("sans-serif", 12)
        .into_font()
        .transform(FontTransform::Rotate90);
    for (group, bundle) in bundles.iter().enumerate() {
        let center = group as f64 * GROUP_STRIDE + 1.0;
        let (px, py) = chart.backend_coord(&(center, Y_MIN));
        root.draw(&Text::new(bundle.as_str(), (px - 6, py + 6), label_font.clone()))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()
        .with_context(|| format!("Failed to write chart: {}", path.display()))?;

    info!(
        "Rendered {} bundle groups to {}",
        bundles.len(),
        path.display()
    );
    Ok(path)
}

/// Resolve the three per-metric bar colors from the configuration.
fn metric_colors(config: &ChartConfig) -> Result<[RGBColor; N_BARS]> {
    if config.colors.len() < N_BARS {
        bail!(
            "chart.colors must list at least {} colors, got {}",
            N_BARS,
            config.colors.len()
        );
    }

    Ok([
        parse_color(&config.colors[0])?,
        parse_color(&config.colors[1])?,
        parse_color(&config.colors[2])?,
    ])
}

/// Parse a "#RRGGBB" hex string.
fn parse_color(hex: &str) -> Result<RGBColor> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        bail!("Invalid color '{hex}': expected #RRGGBB");
    }

    let value = u32::from_str_radix(digits, 16)
        .with_context(|| format!("Invalid color '{hex}': expected #RRGGBB"))?;
    Ok(RGBColor(
        (value >> 16) as u8,
        (value >> 8) as u8,
        value as u8,
    ))
}

/// The whisker line and caps for one bar, clipped to the displayed
/// y range.
fn whisker_elements(x: f64, result: &ReliabilityResult) -> Vec<PathElement<(f64, f64)>> {
    let (low, high) = whisker_span(result);

    vec![
        PathElement::new(vec![(x, low), (x, high)], BLACK),
        PathElement::new(
            vec![(x - CAP_HALF_WIDTH, low), (x + CAP_HALF_WIDTH, low)],
            BLACK,
        ),
        PathElement::new(
            vec![(x - CAP_HALF_WIDTH, high), (x + CAP_HALF_WIDTH, high)],
            BLACK,
        ),
    ]
}

/// Whisker end points: the confidence bounds clamped to the axis range.
fn whisker_span(result: &ReliabilityResult) -> (f64, f64) {
    (result.ci_lower.max(Y_MIN), result.ci_upper.min(Y_MAX))
}
