//! Pure-data chart descriptors projected from run diagnostics.
//!
//! Nothing here draws: each projector emits points, bars, and reference
//! lines for whichever plotting surface consumes them. Mismatched input
//! arrays truncate to their common length and missing blocks produce
//! empty-but-valid descriptors, so projection is total over anything the
//! classifier accepts.

use crate::format;
use crate::service::DiagnosticsBlock;

/// Fraction of a histogram bin occupied by its bar.
const HISTOGRAM_BAR_FILL: f64 = 0.6;

/// Categorical bar chart: one bar per model feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    /// Preformatted value for tooltips and CLI tables.
    pub value_label: String,
}

/// Histogram over precomputed bins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Histogram {
    pub title: String,
    pub bars: Vec<HistogramBar>,
    /// Render width of each bar in x-axis units.
    pub bar_width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBar {
    /// Bin position on the x axis, as supplied by the service.
    pub bin: f64,
    pub count: f64,
}

/// Scatter plot plus one reference line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScatterChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<Point>,
    pub reference: ReferenceLine,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Reference line drawn behind a scatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceLine {
    /// No line.
    #[default]
    None,
    /// The y = x diagonal.
    Identity,
    /// The y = 0 horizontal.
    Zero,
}

/// The four canonical diagnostics for a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSet {
    pub importance: BarChart,
    pub residual_histogram: Histogram,
    pub actual_vs_predicted: ScatterChart,
    pub residual_vs_predicted: ScatterChart,
}

impl ChartSet {
    /// Project every chart from one diagnostics block and coefficient list.
    pub fn project(coefficients: &[(String, f64)], diagnostics: &DiagnosticsBlock) -> Self {
        Self {
            importance: feature_importance(coefficients),
            residual_histogram: residual_distribution(diagnostics),
            actual_vs_predicted: actual_vs_predicted(diagnostics),
            residual_vs_predicted: residual_vs_predicted(diagnostics),
        }
    }
}

/// Feature importance (or coefficient magnitude) per independent variable.
pub fn feature_importance(coefficients: &[(String, f64)]) -> BarChart {
    BarChart {
        title: "Feature importance".to_string(),
        bars: coefficients
            .iter()
            .map(|(name, score)| Bar {
                label: name.clone(),
                value: *score,
                value_label: format::coefficient(*score),
            })
            .collect(),
    }
}

/// Residual histogram over the service-supplied bins.
///
/// Bar width is a fixed fraction of the bin spread divided by the bin
/// count; with fewer than two distinct bins the width collapses to zero,
/// which renderers treat as "draw at minimum width".
pub fn residual_distribution(diagnostics: &DiagnosticsBlock) -> Histogram {
    let len = diagnostics
        .residual_bins
        .len()
        .min(diagnostics.residual_counts.len());
    let bars: Vec<HistogramBar> = diagnostics.residual_bins[..len]
        .iter()
        .zip(&diagnostics.residual_counts[..len])
        .map(|(bin, count)| HistogramBar {
            bin: *bin,
            count: *count,
        })
        .collect();
    Histogram {
        title: "Residual distribution".to_string(),
        bar_width: bin_bar_width(&diagnostics.residual_bins[..len]),
        bars,
    }
}

/// Actual values against model predictions, with the identity diagonal.
pub fn actual_vs_predicted(diagnostics: &DiagnosticsBlock) -> ScatterChart {
    ScatterChart {
        title: "Actual vs predicted".to_string(),
        x_label: "Actual".to_string(),
        y_label: "Predicted".to_string(),
        points: paired_points(&diagnostics.actual_values, &diagnostics.predicted_values),
        reference: ReferenceLine::Identity,
    }
}

/// Residuals against predictions, with the zero horizontal.
pub fn residual_vs_predicted(diagnostics: &DiagnosticsBlock) -> ScatterChart {
    ScatterChart {
        title: "Residuals vs predicted".to_string(),
        x_label: "Predicted".to_string(),
        y_label: "Residual".to_string(),
        points: paired_points(&diagnostics.predicted_values, &diagnostics.residuals),
        reference: ReferenceLine::Zero,
    }
}

fn paired_points(xs: &[f64], ys: &[f64]) -> Vec<Point> {
    xs.iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| Point { x: *x, y: *y })
        .collect()
}

fn bin_bar_width(bins: &[f64]) -> f64 {
    if bins.is_empty() {
        return 0.0;
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for bin in bins {
        min = min.min(*bin);
        max = max.max(*bin);
    }
    if !min.is_finite() || !max.is_finite() {
        return 0.0;
    }
    HISTOGRAM_BAR_FILL * ((max - min) / bins.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostics() -> DiagnosticsBlock {
        DiagnosticsBlock {
            residuals: vec![-5.0, 3.0, 2.0],
            residual_bins: vec![-10.0, 0.0, 10.0, 20.0],
            residual_counts: vec![1.0, 2.0, 1.0, 0.0],
            actual_values: vec![100.0, 200.0, 300.0],
            predicted_values: vec![105.0, 197.0, 298.0],
        }
    }

    #[test]
    fn importance_bars_keep_order_and_format_values() {
        let chart = feature_importance(&[
            ("area".to_string(), 0.61237),
            ("zone".to_string(), 0.12),
        ]);
        assert_eq!(chart.bars.len(), 2);
        assert_eq!(chart.bars[0].label, "area");
        assert_eq!(chart.bars[0].value_label, "0.6124");
        assert_eq!(chart.bars[1].label, "zone");
    }

    #[test]
    fn histogram_width_is_point_six_of_bin_width() {
        let chart = residual_distribution(&diagnostics());
        // bins span 30 over 4 bins -> bin width 7.5, bar width 4.5
        assert!((chart.bar_width - 4.5).abs() < 1e-9);
        assert_eq!(chart.bars.len(), 4);
        assert_eq!(chart.bars[1].bin, 0.0);
        assert_eq!(chart.bars[1].count, 2.0);
    }

    #[test]
    fn mismatched_bins_and_counts_truncate() {
        let mut diag = diagnostics();
        diag.residual_counts.truncate(2);
        let chart = residual_distribution(&diag);
        assert_eq!(chart.bars.len(), 2);
    }

    #[test]
    fn scatters_pair_up_and_carry_reference_lines() {
        let diag = diagnostics();
        let avp = actual_vs_predicted(&diag);
        assert_eq!(avp.points.len(), 3);
        assert_eq!(avp.points[0], Point { x: 100.0, y: 105.0 });
        assert_eq!(avp.reference, ReferenceLine::Identity);

        let rvp = residual_vs_predicted(&diag);
        assert_eq!(rvp.points[0], Point { x: 105.0, y: -5.0 });
        assert_eq!(rvp.reference, ReferenceLine::Zero);
    }

    #[test]
    fn mismatched_scatter_arrays_truncate_to_common_length() {
        let mut diag = diagnostics();
        diag.predicted_values.truncate(2);
        let chart = actual_vs_predicted(&diag);
        assert_eq!(chart.points.len(), 2);
    }

    #[test]
    fn non_finite_points_are_dropped() {
        let mut diag = diagnostics();
        diag.actual_values[1] = f64::NAN;
        let chart = actual_vs_predicted(&diag);
        assert_eq!(chart.points.len(), 2);
    }

    #[test]
    fn empty_block_projects_empty_but_valid_charts() {
        let set = ChartSet::project(&[], &DiagnosticsBlock::default());
        assert!(set.importance.bars.is_empty());
        assert!(set.residual_histogram.bars.is_empty());
        assert_eq!(set.residual_histogram.bar_width, 0.0);
        assert!(set.actual_vs_predicted.points.is_empty());
        assert!(set.residual_vs_predicted.points.is_empty());
    }
}
