use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use survey_insight::cleaning::{FollowUp, Treatment};
use survey_insight::plot::{AxisMapping, Layout, Preset, Style};
use survey_insight::report::{self, csv_export};
use survey_insight::{AnalysisError, InsightEngine};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "survey-insight")]
#[command(version)]
#[command(about = "Summary tables, baseline Wilcoxon tests and trajectory plots for patient survey scores", long_about = None)]
struct Cli {
    /// Flat survey score CSV
    #[arg(
        long,
        global = true,
        env = "SURVEY_INSIGHT_DATA",
        default_value = "data/ibs-all-patients-flat-scores.csv"
    )]
    data: PathBuf,

    /// Directory receiving the generated artifacts
    #[arg(long, global = true, env = "SURVEY_INSIGHT_RESULTS", default_value = "results")]
    results: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-survey summary tables (HTML)
    Summary,

    /// Wilcoxon signed-rank tests of every follow-up against baseline (HTML + CSV)
    Wilcoxon,

    /// Baseline comparison table with means and changes (LaTeX + CSV)
    Baseline,

    /// Score trajectory figure (PNG)
    Plot {
        /// Figure preset
        #[arg(value_enum, default_value_t = Preset::Trajectories)]
        preset: Preset,

        /// Override the panel layout
        #[arg(long, value_enum)]
        layout: Option<Layout>,

        /// Override the line style
        #[arg(long, value_enum)]
        style: Option<Style>,

        /// Override the x-axis mapping
        #[arg(long, value_enum)]
        axis: Option<AxisMapping>,

        /// Output file name inside the results directory
        #[arg(long)]
        output: Option<String>,
    },

    /// Print the per-patient pairing behind one comparison
    Check {
        #[arg(short, long)]
        survey: String,

        /// FMT or PLACEBO
        #[arg(short, long)]
        treatment: Treatment,

        #[arg(short, long)]
        follow_up: FollowUp,
    },

    /// Report rows dropped during cleaning and unrecognised treatment labels
    Audit {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let engine = InsightEngine::load(&cli.data)?;

    match cli.command {
        Commands::Summary => {
            for table in engine.summary_tables() {
                let file_name = report::summary_file_name(&table.survey);
                let html = report::summary_table_html(&table);
                report::write_artifact(&cli.results, &file_name, &html)?;
                println!("Generated summary table for {}", table.survey);
            }
            println!(
                "\nAll summary tables have been generated in the '{}' directory.",
                cli.results.display()
            );
        }

        Commands::Wilcoxon => {
            let results = engine.comparisons();
            let html_path = report::write_artifact(
                &cli.results,
                "wilcoxon_test_results.html",
                &report::wilcoxon_table_html(&results),
            )?;
            let csv_path = write_csv(&cli.results, "wilcoxon_test_results.csv", &results)?;
            println!(
                "\nWilcoxon test results have been generated in '{}'",
                html_path.display()
            );
            println!("Raw results have also been saved to '{}'", csv_path.display());
        }

        Commands::Baseline => {
            let results = engine.comparisons();
            let tex_path = report::write_artifact(
                &cli.results,
                "wilcoxon_baseline_table.tex",
                &report::baseline_table_latex(&results),
            )?;
            let csv_path = write_csv(&cli.results, "wilcoxon_baseline_results.csv", &results)?;
            println!("\nResults have been saved to:");
            println!("1. LaTeX table: {}", tex_path.display());
            println!("2. CSV file: {}", csv_path.display());
        }

        Commands::Plot {
            preset,
            layout,
            style,
            axis,
            output,
        } => {
            let mut config = preset.config();
            if let Some(layout) = layout {
                config.layout = layout;
            }
            if let Some(style) = style {
                config.style = style;
            }
            if let Some(axis) = axis {
                config.axis = axis;
            }
            if let Some(output) = output {
                config.file_name = output;
            }
            let path = engine
                .plot(&config, &cli.results)
                .with_context(|| format!("rendering {:?} plot", preset))?;
            println!("Combined plot saved as {}", path.display());
        }

        Commands::Check {
            survey,
            treatment,
            follow_up,
        } => {
            let detail = engine.paired_detail(&survey, &treatment, follow_up);
            println!(
                "\nDetailed comparison for {}, {}, Follow-up {}:",
                survey, treatment, follow_up
            );
            println!("Number of patients: {}", detail.pairs.len());
            println!("\nPatient scores:");
            println!("Patient\tBaseline\tFollow-up\tDifference");
            println!("{}", "-".repeat(50));
            for pair in &detail.pairs {
                println!(
                    "{}\t{:.1}\t\t{:.1}\t\t{:+.1}",
                    pair.patient, pair.baseline, pair.follow_up, pair.difference
                );
            }
            match (detail.result.statistic(), detail.result.p_value()) {
                (Some(statistic), Some(p_value)) => {
                    println!("\nWilcoxon test statistic: {:.3}", statistic);
                    println!("p-value: {:.3}", p_value);
                }
                _ => {
                    if let survey_insight::Outcome::NotComputed { reason } = detail.result.outcome {
                        println!("\nWilcoxon test not computed: {}", reason);
                    }
                }
            }
        }

        Commands::Audit { json } => {
            let audit = engine.report();
            if json {
                println!("{}", serde_json::to_string_pretty(audit)?);
            } else {
                println!(
                    "Rows read: {}, kept: {}, dropped: {}",
                    audit.total_rows,
                    audit.kept_rows,
                    audit.dropped_count()
                );
                for dropped in &audit.dropped {
                    println!(
                        "  row {}: {} ('{}')",
                        dropped.row, dropped.reason, dropped.raw_value
                    );
                }
                for (label, count) in &audit.unrecognized_treatments {
                    println!("Unrecognised treatment '{}' on {} rows", label, count);
                }
            }
        }
    }

    Ok(())
}

fn write_csv(
    results_dir: &Path,
    file_name: &str,
    results: &[survey_insight::ComparisonResult],
) -> Result<PathBuf, AnalysisError> {
    let text = csv_export::comparisons_csv(results)?;
    report::write_artifact(results_dir, file_name, &text)
}
