use super::AlignedChart;

/// Category count above which the overview strip is thinned out
pub const SAMPLING_THRESHOLD: usize = 200;
/// Approximate number of points the overview strip aims for
pub const OVERVIEW_POINTS: usize = 100;

/// Thinned copy of a chart for the overview (brush) strip.
///
/// Charts with more than `SAMPLING_THRESHOLD` categories keep every Nth
/// category, `N = ceil(count / OVERVIEW_POINTS)`, and the same indices of
/// every series. Smaller charts are returned as they are.
pub fn overview(chart: &AlignedChart) -> AlignedChart {
    let count = chart.categories.len();
    if count <= SAMPLING_THRESHOLD {
        return chart.clone();
    }

    let step = sample_rate(count);

    let mut sampled = chart.clone();
    sampled.categories = chart.categories.iter().step_by(step).cloned().collect();
    for (series, source) in sampled.series.iter_mut().zip(&chart.series) {
        series.data = source.data.iter().step_by(step).copied().collect();
    }
    sampled
}

pub fn sample_rate(count: usize) -> usize {
    count.div_ceil(OVERVIEW_POINTS).max(1)
}
