//! Wilcoxon signed-rank test for paired differences
//!
//! The caller passes differences with exact zeros already removed. Ties in
//! absolute value receive average ranks. The statistic is the smaller of the
//! positive and negative rank sums and the p-value is two-sided.
//!
//! Small samples without ties use the exact null distribution of the rank
//! sum; everything else uses the normal approximation with tie correction and
//! no continuity correction.

use serde::Serialize;
use statrs::function::erf::erfc;

use crate::stats::{rank_abs, tie_groups};

/// Largest sample for which the exact distribution is enumerated
pub const EXACT_MAX_N: usize = 50;

/// How the p-value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Exact,
    Normal,
}

/// Result of a signed-rank test
#[derive(Debug, Clone, Serialize)]
pub struct WilcoxonTest {
    pub n: usize,
    pub r_plus: f64,
    pub r_minus: f64,
    /// min(R+, R-)
    pub statistic: f64,
    pub p_value: f64,
    pub method: Method,
}

/// Run the test over nonzero paired differences
///
/// # Returns
/// * `None` when fewer than two differences are supplied
pub fn wilcoxon_signed_rank(differences: &[f64]) -> Option<WilcoxonTest> {
    let n = differences.len();
    if n < 2 {
        return None;
    }

    let ranks = rank_abs(differences);
    let r_plus: f64 = differences
        .iter()
        .zip(&ranks)
        .filter(|(d, _)| **d > 0.0)
        .map(|(_, r)| r)
        .sum();
    let total = (n * (n + 1)) as f64 / 2.0;
    let r_minus = total - r_plus;
    let statistic = r_plus.min(r_minus);

    let ties = tie_groups(differences);
    let (p_value, method) = if n <= EXACT_MAX_N && ties.is_empty() {
        (exact_p_value(n, statistic), Method::Exact)
    } else {
        (normal_p_value(n, statistic, &ties), Method::Normal)
    };

    Some(WilcoxonTest {
        n,
        r_plus,
        r_minus,
        statistic,
        p_value,
        method,
    })
}

/// Number of subsets of {1..=n} for every possible rank sum
fn rank_sum_counts(n: usize) -> Vec<u64> {
    let max_sum = n * (n + 1) / 2;
    let mut counts = vec![0u64; max_sum + 1];
    counts[0] = 1;
    for rank in 1..=n {
        for sum in (rank..=max_sum).rev() {
            counts[sum] += counts[sum - rank];
        }
    }
    counts
}

/// Two-sided exact p-value: 2 * P(T <= statistic), capped at 1
fn exact_p_value(n: usize, statistic: f64) -> f64 {
    let counts = rank_sum_counts(n);
    // without ties the statistic is a whole number
    let upto = statistic.floor() as usize;
    let favourable: f64 = counts.iter().take(upto + 1).map(|&c| c as f64).sum();
    let total = 2f64.powi(n as i32);
    (2.0 * favourable / total).min(1.0)
}

/// Two-sided p-value from the tie-corrected normal approximation
fn normal_p_value(n: usize, statistic: f64, ties: &[usize]) -> f64 {
    let n = n as f64;
    let mean = n * (n + 1.0) / 4.0;
    let tie_term: f64 = ties
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * (t * t - 1.0)
        })
        .sum();
    let variance = (n * (n + 1.0) * (2.0 * n + 1.0) - 0.5 * tie_term) / 24.0;
    if variance <= 0.0 {
        return 1.0;
    }
    let z = (statistic - mean) / variance.sqrt();
    erfc(z.abs() / std::f64::consts::SQRT_2).min(1.0)
}
