//! Interactive box plots of the merged agreement distributions.
//!
//! One HTML file per metric, one box trace per bundle. A metric that
//! fails to render is logged and skipped; the remaining metrics still
//! get their plots.

use crate::agreements::merger::MergedDistributions;
use crate::config::AgreementsConfig;
use plotly::box_plot::{BoxPlot, BoxPoints};
use plotly::common::{Marker, Title};
use plotly::layout::{Axis, BoxMode, Layout};
use plotly::Plot;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Render one box-plot HTML file per configured metric.
///
/// Returns the paths that were written; rendering failures are logged
/// and do not abort the remaining metrics.
pub fn render_box_plots(
    merged: &MergedDistributions,
    bundles: &[String],
    config: &AgreementsConfig,
    output_dir: &Path,
) -> Vec<PathBuf> {
    let mut written = Vec::new();

    for metric in &config.metrics {
        let plot = build_metric_plot(merged, bundles, metric, config);

        let path = output_dir.join(format!("{metric}.html"));
        match std::fs::write(&path, plot.to_html()) {
            Ok(()) => {
                info!("Wrote box plot: {}", path.display());
                written.push(path);
            }
            Err(e) => {
                error!("Failed to write box plot {}: {e}", path.display());
                continue;
            }
        }
    }

    written
}

/// Assemble the plot for one metric: a box trace per bundle that has
/// data for it.
fn build_metric_plot(
    merged: &MergedDistributions,
    bundles: &[String],
    metric: &str,
    config: &AgreementsConfig,
) -> Plot {
    let mut plot = Plot::new();

    for bundle in bundles {
        let (values, _) = match merged.series(bundle, metric) {
            Some(series) => series,
            None => {
                debug!("{bundle}: no '{metric}' distribution, trace skipped");
                continue;
            }
        };

        let trace = BoxPlot::new(values.clone())
            .name(&bundle.to_uppercase())
            .box_points(BoxPoints::All)
            .jitter(0.3)
            .marker(Marker::new().size(2));
        plot.add_trace(trace);
    }

    let mut layout = Layout::new()
        .title(Title::with_text(metric.to_uppercase()))
        .box_mode(BoxMode::Group)
        .box_gap(0.5)
        .box_group_gap(0.0);

    if let Some([low, high]) = config.y_limits.get(metric) {
        layout = layout.y_axis(Axis::new().range(vec![*low, *high]));
    }

    plot.set_layout(layout);
    plot
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn make_merged() -> MergedDistributions {
        let mut merged = MergedDistributions::default();
        let mut series = BTreeMap::new();
        series.insert(
            "dice_voxels".to_string(),
            (vec![0.8, 0.9, 0.7], vec![0.0, 0.0, 0.0]),
        );
        merged.0.insert("AF_L".to_string(), series);
        merged.0.insert("CST_R".to_string(), BTreeMap::new());
        merged
    }

    fn make_config() -> AgreementsConfig {
        AgreementsConfig {
            metrics: vec!["dice_voxels".to_string()],
            ..AgreementsConfig::default()
        }
    }

    #[test]
    fn test_renders_one_file_per_metric() {
        let dir = tempfile::tempdir().unwrap();
        let bundles = vec!["AF_L".to_string(), "CST_R".to_string()];

        let written = render_box_plots(&make_merged(), &bundles, &make_config(), dir.path());

        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("dice_voxels.html"));

        let html = std::fs::read_to_string(&written[0]).unwrap();
        assert!(html.contains("DICE_VOXELS"));
        assert!(html.contains("AF_L"));
    }

    #[test]
    fn test_bundle_without_data_is_skipped() {
        // CST_R has no dice_voxels series; the plot still renders with
        // the remaining trace.
        let bundles = vec!["AF_L".to_string(), "CST_R".to_string()];
        let plot = build_metric_plot(&make_merged(), &bundles, "dice_voxels", &make_config());

        let html = plot.to_html();
        assert!(html.contains("AF_L"));
    }

    #[test]
    fn test_unlimited_metric_gets_no_fixed_range() {
        let mut config = make_config();
        config.metrics = vec!["custom_metric".to_string()];
        config.y_limits.clear();

        let dir = tempfile::tempdir().unwrap();
        let written = render_box_plots(
            &make_merged(),
            &["AF_L".to_string()],
            &config,
            dir.path(),
        );
        assert_eq!(written.len(), 1);
    }
}
