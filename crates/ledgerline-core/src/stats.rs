//! Gap statistics for data-derived merge tolerances.
//!
//! The row builder decides how aggressively to merge vertically by looking
//! at the distribution of inter-word gaps on the page. A page of tightly
//! and uniformly packed lines gets a zero tolerance; loose layouts get a
//! tolerance derived from the median gap.

use crate::words::Word;

/// Tolerance used when there are too few gap samples to trust statistics.
pub const DEFAULT_Y_TOLERANCE: f64 = 3.0;
/// Minimum number of positive gap samples required for the analysis.
pub const MIN_GAP_SAMPLES: usize = 10;
/// Upper bound on any derived tolerance.
pub const MAX_Y_TOLERANCE: f64 = 7.0;

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation. Returns 0.0 for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Linearly interpolated percentile of an unsorted sample, `p` in 0..=100.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let rank = (sorted.len() - 1) as f64 * p / 100.0;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
    }
}

/// Median of a sample.
pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Statistical mode: the most frequent value, first-seen wins on ties.
pub fn mode_value(values: &[f64]) -> f64 {
    let mut best = 0.0;
    let mut best_count = 0usize;
    for &v in values {
        let count = values.iter().filter(|&&o| o == v).count();
        if count > best_count {
            best = v;
            best_count = count;
        }
    }
    best
}

/// Derive the y-merge tolerance from the vertical gap distribution of `words`.
///
/// Gaps are the positive `next.top - current.bottom` values of the
/// top-sorted sequence. With fewer than [`MIN_GAP_SAMPLES`] samples the
/// default applies. The page counts as tightly packed when
/// `IQR / mean(line heights) < 0.5` or the modal gap is below the IQR;
/// tight packing forces a zero tolerance, otherwise the tolerance is
/// `min(max(round(median, 1 decimal) + 0.2 * sigma, 2), mean, 7)`.
pub fn y_merge_tolerance(words: &[Word]) -> f64 {
    if words.len() < 2 {
        return DEFAULT_Y_TOLERANCE;
    }

    let mut sorted: Vec<&Word> = words.iter().collect();
    sorted.sort_by(|a, b| a.bbox.top.partial_cmp(&b.bbox.top).unwrap());

    let mut gaps = Vec::new();
    let mut line_heights = Vec::new();
    for pair in sorted.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if current.height() > 0.0 {
            line_heights.push(current.height());
        }
        if next.height() > 0.0 {
            line_heights.push(next.height());
        }
        let gap = next.bbox.top - current.bbox.bottom;
        if gap > 0.0 {
            gaps.push(gap);
        }
    }

    if gaps.len() < MIN_GAP_SAMPLES {
        return DEFAULT_Y_TOLERANCE;
    }

    let gap_mean = mean(&gaps);
    let gap_median = median(&gaps);
    let gap_std = std_dev(&gaps);
    let iqr = percentile(&gaps, 75.0) - percentile(&gaps, 25.0);
    let gap_mode = mode_value(&gaps);
    let avg_line_height = if line_heights.is_empty() {
        10.0
    } else {
        mean(&line_heights)
    };

    let tightly_packed = iqr / avg_line_height < 0.5 || gap_mode < iqr;
    if tightly_packed {
        return 0.0;
    }

    let rounded_median = (gap_median * 10.0).round() / 10.0;
    (rounded_median + gap_std * 0.2)
        .max(2.0)
        .min(gap_mean)
        .min(MAX_Y_TOLERANCE)
}
