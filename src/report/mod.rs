/// Table presenters: HTML, CSV and LaTeX renderings of analysis results
pub mod csv_export;
pub mod html;
pub mod latex;

use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::AnalysisError;

// Re-export commonly used functions
pub use csv_export::write_comparisons_csv;
pub use html::{summary_table_html, wilcoxon_table_html};
pub use latex::{baseline_table_latex, format_p_value};

/// Fixed-precision number, `nan` for undefined values
pub fn fmt_fixed(value: f64, precision: usize) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{:.*}", precision, value)
    }
}

/// `mean±std` with one decimal
pub fn format_mean_std(mean: f64, std: f64) -> String {
    format!("{}±{}", fmt_fixed(mean, 1), fmt_fixed(std, 1))
}

/// File name of a survey's summary table
///
/// Path separators and other characters that are unsafe in file names are
/// replaced with `_`, so every survey lands inside the results directory.
pub fn summary_file_name(survey: &str) -> String {
    let stem: String = survey
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = match stem.trim() {
        "" | "." | ".." => "survey".to_string(),
        trimmed => trimmed.to_string(),
    };
    format!("{}_summary_table.html", stem)
}

/// Write one artifact into the results directory, creating it if needed
pub fn write_artifact(
    results_dir: &Path,
    file_name: &str,
    contents: &str,
) -> Result<PathBuf, AnalysisError> {
    fs::create_dir_all(results_dir)?;
    let path = results_dir.join(file_name);
    fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "artifact written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mean_std() {
        assert_eq!(format_mean_std(7.5, 0.70710678), "7.5±0.7");
        assert_eq!(format_mean_std(3.0, f64::NAN), "3.0±nan");
        assert_eq!(format_mean_std(f64::NAN, f64::NAN), "nan±nan");
    }

    #[test]
    fn test_fmt_fixed() {
        assert_eq!(fmt_fixed(0.04567, 3), "0.046");
        assert_eq!(fmt_fixed(12.0, 1), "12.0");
    }

    #[test]
    fn test_summary_file_name() {
        assert_eq!(summary_file_name("IBS-SSS"), "IBS-SSS_summary_table.html");
        assert_eq!(summary_file_name("S 2/x"), "S 2_x_summary_table.html");
        assert_eq!(summary_file_name("a\\b:c"), "a_b_c_summary_table.html");
        assert_eq!(summary_file_name(".."), "survey_summary_table.html");
    }

    #[test]
    fn test_survey_with_separator_stays_in_results_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifact(dir.path(), &summary_file_name("S 2/x"), "<h2></h2>").unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.is_file());
    }

    #[test]
    fn test_write_artifact_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        let path = write_artifact(&results, "table.html", "<table></table>").unwrap();
        assert_eq!(path, results.join("table.html"));
        assert_eq!(fs::read_to_string(path).unwrap(), "<table></table>");
    }
}
