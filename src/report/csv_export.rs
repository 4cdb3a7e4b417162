use serde::Serialize;
use std::io::Write;

use crate::comparison::ComparisonResult;
use crate::utils::{format_number, AnalysisError};

/// CSV row of a comparison; numbers keep full precision
#[derive(Debug, Serialize)]
struct ComparisonRow<'a> {
    #[serde(rename = "Survey")]
    survey: &'a str,
    #[serde(rename = "Treatment")]
    treatment: &'a str,
    #[serde(rename = "Follow-up")]
    follow_up: String,
    #[serde(rename = "N")]
    n: usize,
    #[serde(rename = "N Nonzero")]
    n_nonzero: usize,
    #[serde(rename = "Baseline Mean")]
    baseline_mean: f64,
    #[serde(rename = "Follow-up Mean")]
    follow_up_mean: f64,
    #[serde(rename = "Mean Change")]
    mean_change: f64,
    #[serde(rename = "Statistic")]
    statistic: Option<f64>,
    #[serde(rename = "p-value")]
    p_value: Option<f64>,
    #[serde(rename = "Significant")]
    significant: bool,
}

impl<'a> From<&'a ComparisonResult> for ComparisonRow<'a> {
    fn from(r: &'a ComparisonResult) -> Self {
        Self {
            survey: &r.survey,
            treatment: r.treatment.as_str(),
            follow_up: format_number(r.follow_up.value()),
            n: r.n,
            n_nonzero: r.n_nonzero,
            baseline_mean: r.baseline_mean,
            follow_up_mean: r.follow_up_mean,
            mean_change: r.mean_change,
            statistic: r.statistic(),
            p_value: r.p_value(),
            significant: r.significant(),
        }
    }
}

/// Write comparison results as CSV
///
/// Not-computed statistics and p-values are written as empty cells.
pub fn write_comparisons_csv<W: Write>(
    results: &[ComparisonResult],
    sink: W,
) -> Result<(), AnalysisError> {
    let mut writer = csv::Writer::from_writer(sink);
    for result in results {
        writer.serialize(ComparisonRow::from(result))?;
    }
    writer.flush()?;
    Ok(())
}

/// Render comparison results to a CSV string
pub fn comparisons_csv(results: &[ComparisonResult]) -> Result<String, AnalysisError> {
    let mut buffer = Vec::new();
    write_comparisons_csv(results, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        AnalysisError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}
