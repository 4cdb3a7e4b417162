use std::fmt::Write;

use super::{fmt_fixed, format_mean_std};
use crate::aggregate::SummaryTable;
use crate::comparison::{ComparisonResult, ALPHA};

const TABLE_STYLE: &str = "<style>\n\
table { border-collapse: collapse; }\n\
th { background-color: #f0f0f0; text-align: center; padding: 5px; border: 1px solid black; font-weight: bold; }\n\
td { text-align: center; padding: 5px; border: 1px solid black; }\n\
tr:nth-of-type(odd) { background-color: #f9f9f9; }\n\
</style>\n";

/// Escape text for an HTML element body
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_row(html: &mut String, tag: &str, cells: &[String]) {
    html.push_str("<tr>");
    for cell in cells {
        let _ = write!(html, "<{tag}>{}</{tag}>", escape(cell));
    }
    html.push_str("</tr>\n");
}

fn push_table(html: &mut String, header: &[String], rows: &[Vec<String>]) {
    html.push_str(TABLE_STYLE);
    html.push_str("<table>\n<thead>\n");
    push_row(html, "th", header);
    html.push_str("</thead>\n<tbody>\n");
    for row in rows {
        push_row(html, "td", row);
    }
    html.push_str("</tbody>\n</table>\n");
}

/// Render one survey's summary table
///
/// Columns: Follow-up, Group, N, Total Score, then one per category, with
/// every score cell as `mean±std`.
pub fn summary_table_html(table: &SummaryTable) -> String {
    let mut header: Vec<String> = ["Follow-up", "Group", "N", "Total Score"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(table.categories.iter().cloned());

    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                row.follow_up.to_string(),
                row.treatment.to_string(),
                row.n.to_string(),
                format_mean_std(row.total.mean, row.total.std),
            ];
            cells.extend(
                row.categories
                    .iter()
                    .map(|summary| format_mean_std(summary.mean, summary.std)),
            );
            cells
        })
        .collect();

    let mut html = String::new();
    let _ = writeln!(html, "<h2>{} Summary Table</h2>", escape(&table.survey));
    push_table(&mut html, &header, &rows);
    html
}

/// Render the significance results of every baseline comparison
///
/// Statistic and p-value are shown with three decimals, `---` when the
/// comparison could not be computed.
pub fn wilcoxon_table_html(results: &[ComparisonResult]) -> String {
    let header: Vec<String> = [
        "Survey",
        "Treatment",
        "Follow-up",
        "N",
        "Statistic",
        "p-value",
        "Significant",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let dash = || "---".to_string();
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            vec![
                r.survey.clone(),
                r.treatment.to_string(),
                r.follow_up.to_string(),
                r.n.to_string(),
                r.statistic().map_or_else(dash, |s| fmt_fixed(s, 3)),
                r.p_value().map_or_else(dash, |p| fmt_fixed(p, 3)),
                if r.significant() { "True" } else { "False" }.to_string(),
            ]
        })
        .collect();

    let mut html = String::new();
    html.push_str("<h2>Wilcoxon Signed Rank Test Results</h2>\n");
    html.push_str(
        "<p>Comparing each follow-up to baseline (follow-up 0) for each treatment group.</p>\n",
    );
    let _ = writeln!(html, "<p>Significance level: α = {}</p>", ALPHA);
    push_table(&mut html, &header, &rows);
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{GroupSummary, SummaryRow};
    use crate::cleaning::{FollowUp, Treatment};
    use crate::comparison::{NotComputed, Outcome};
    use crate::wilcoxon::Method;

    fn comparison(outcome: Outcome) -> ComparisonResult {
        ComparisonResult {
            survey: "IBS-SSS".to_string(),
            treatment: Treatment::Fmt,
            follow_up: FollowUp::new(2.0).unwrap(),
            n: 12,
            n_nonzero: 11,
            baseline_mean: 250.0,
            follow_up_mean: 180.0,
            mean_change: -70.0,
            outcome,
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b> & \"c\""), "a&lt;b&gt; &amp; &quot;c&quot;");
    }

    #[test]
    fn test_wilcoxon_table() {
        let results = vec![
            comparison(Outcome::Computed {
                statistic: 4.0,
                p_value: 0.012345,
                method: Method::Exact,
            }),
            comparison(Outcome::NotComputed {
                reason: NotComputed::InsufficientPatients,
            }),
        ];
        let html = wilcoxon_table_html(&results);

        assert!(html.contains("<h2>Wilcoxon Signed Rank Test Results</h2>"));
        assert!(html.contains("α = 0.05"));
        assert!(html.contains("<th>p-value</th>"));
        assert!(html.contains(
            "<tr><td>IBS-SSS</td><td>FMT</td><td>2</td><td>12</td><td>4.000</td><td>0.012</td><td>True</td></tr>"
        ));
        assert!(html.contains("<td>---</td><td>---</td><td>False</td>"));
    }

    #[test]
    fn test_summary_table() {
        let table = SummaryTable {
            survey: "IBS-QOL".to_string(),
            categories: vec!["Mood".to_string()],
            rows: vec![SummaryRow {
                follow_up: FollowUp::BASELINE,
                treatment: Treatment::Placebo,
                n: 2,
                total: GroupSummary {
                    n: 2,
                    mean: 7.5,
                    std: 0.7071,
                },
                categories: vec![GroupSummary {
                    n: 1,
                    mean: 3.0,
                    std: f64::NAN,
                }],
            }],
        };
        let html = summary_table_html(&table);

        assert!(html.starts_with("<h2>IBS-QOL Summary Table</h2>"));
        assert!(html.contains(
            "<tr><th>Follow-up</th><th>Group</th><th>N</th><th>Total Score</th><th>Mood</th></tr>"
        ));
        assert!(html.contains(
            "<tr><td>0</td><td>PLACEBO</td><td>2</td><td>7.5±0.7</td><td>3.0±nan</td></tr>"
        ));
    }
}
