//! Survey Insight - analysis pipeline for longitudinal patient survey scores
//!
//! Loads a flat CSV of per-question scores, cleans it, sums per-patient
//! totals, compares every follow-up with baseline using the Wilcoxon
//! signed-rank test, and renders summary tables and trajectory plots.

pub mod aggregate;
pub mod cleaning;
pub mod comparison;
pub mod dataset;
pub mod engine;
pub mod plot;
pub mod report;
pub mod stats;
pub mod utils;
pub mod wilcoxon;

pub use aggregate::{GroupSummary, Granularity, SummaryTable, TotalsTable};
pub use cleaning::{CleanedRecord, CleaningReport, FollowUp, Treatment};
pub use comparison::{ComparisonResult, Outcome};
pub use dataset::{load_dataset, Dataset, RawRecord};
pub use engine::InsightEngine;
pub use stats::Statistics;
pub use utils::AnalysisError;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, AnalysisError>;
