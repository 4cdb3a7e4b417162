use serde::Serialize;

/// Descriptive statistics over a set of per-patient totals
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator); NaN when count < 2
    pub std: f64,
}

impl Statistics {
    /// Compute statistics for a slice of values
    ///
    /// Returns `None` for an empty slice.
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        Some(Statistics {
            count: values.len(),
            mean: mean(values),
            std: sample_std(values),
        })
    }
}

/// Arithmetic mean; NaN for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased sample standard deviation; NaN for fewer than two values
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    var.sqrt()
}

/// Rank the absolute values, 1-based, giving tied values their average rank
pub fn rank_abs(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].abs().total_cmp(&values[b].abs()));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let magnitude = values[order[start]].abs();
        let mut end = start + 1;
        while end < order.len() && values[order[end]].abs() == magnitude {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let average = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = average;
        }
        start = end;
    }
    ranks
}

/// Sizes of the groups of tied absolute values (only groups larger than one)
pub fn tie_groups(values: &[f64]) -> Vec<usize> {
    let mut magnitudes: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    magnitudes.sort_by(f64::total_cmp);

    let mut groups = Vec::new();
    let mut run = 1;
    for pair in magnitudes.windows(2) {
        if pair[0] == pair[1] {
            run += 1;
        } else {
            if run > 1 {
                groups.push(run);
            }
            run = 1;
        }
    }
    if run > 1 {
        groups.push(run);
    }
    groups
}
