use super::fmt_fixed;
use crate::comparison::ComparisonResult;

/// Display form of a p-value: `---`, `< 0.001`, or three decimals
pub fn format_p_value(p_value: Option<f64>) -> String {
    match p_value {
        None => "---".to_string(),
        Some(p) if p.is_nan() => "---".to_string(),
        Some(p) if p < 0.001 => "< 0.001".to_string(),
        Some(p) => format!("{:.3}", p),
    }
}

/// Escape characters LaTeX treats specially in text mode
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn signed(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{:+.1}", value)
    }
}

/// Render the baseline comparison table as a LaTeX `table` environment
///
/// N counts nonzero paired differences. Significant p-values are bold.
pub fn baseline_table_latex(results: &[ComparisonResult]) -> String {
    let mut lines = vec![
        "\\begin{table}[htbp]".to_string(),
        "\\centering".to_string(),
        "\\caption{Wilcoxon Signed Rank Test Results: Comparison to Baseline}".to_string(),
        "\\label{tab:wilcoxon_baseline}".to_string(),
        "\\begin{tabular}{llrrrrrrr}".to_string(),
        "\\hline".to_string(),
        "Survey & Treatment & Follow-up & N & Baseline & Follow-up & Change & W & p-value \\\\"
            .to_string(),
        "\\hline".to_string(),
    ];

    for r in results {
        let mut p_value = format_p_value(r.p_value());
        if r.significant() {
            p_value = format!("\\textbf{{{}}}", p_value);
        }
        let statistic = r
            .statistic()
            .map_or_else(|| "---".to_string(), |s| fmt_fixed(s, 1));

        lines.push(format!(
            "{} & {} & {} & {} & {} & {} & {} & {} & {} \\\\",
            escape(&r.survey),
            r.treatment,
            r.follow_up,
            r.n_nonzero,
            fmt_fixed(r.baseline_mean, 1),
            fmt_fixed(r.follow_up_mean, 1),
            signed(r.mean_change),
            statistic,
            p_value
        ));
    }

    lines.push("\\hline".to_string());
    lines.push("\\end{tabular}".to_string());
    lines.push("\\end{table}".to_string());
    lines.join("\n")
}
