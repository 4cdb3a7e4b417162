use std::path::{Path, PathBuf};

use crate::aggregate::{self, Granularity, SummaryTable, TotalsTable};
use crate::cleaning::{self, CleanedRecord, CleaningReport, FollowUp, Treatment};
use crate::comparison::{self, ComparisonResult, PairedDetail};
use crate::dataset::{self, Dataset};
use crate::plot::{self, PlotConfig};
use crate::utils::AnalysisError;

/// Cleaned survey data plus the analyses run over it
///
/// Built once per run from a dataset; every analysis is recomputed from the
/// cleaned rows on request.
#[derive(Debug, Clone)]
pub struct InsightEngine {
    name: String,
    records: Vec<CleanedRecord>,
    report: CleaningReport,
}

impl InsightEngine {
    /// Clean an already-loaded dataset
    pub fn new(dataset: &Dataset) -> Self {
        let cleaned = cleaning::clean(&dataset.records);
        tracing::info!(
            dataset = %dataset.name,
            rows = cleaned.report.total_rows,
            kept = cleaned.report.kept_rows,
            "dataset cleaned"
        );
        Self {
            name: dataset.name.clone(),
            records: cleaned.records,
            report: cleaned.report,
        }
    }

    /// Load and clean the CSV at `path`
    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let dataset = dataset::load_dataset(path)?;
        Ok(Self::new(&dataset))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[CleanedRecord] {
        &self.records
    }

    pub fn report(&self) -> &CleaningReport {
        &self.report
    }

    /// Patient-timepoint totals at the requested granularity
    pub fn totals(&self, granularity: Granularity) -> TotalsTable {
        aggregate::patient_totals(&self.records, granularity)
    }

    /// Distinct survey names, sorted
    pub fn surveys(&self) -> Vec<String> {
        self.totals(Granularity::Total).surveys()
    }

    /// One summary table per survey
    pub fn summary_tables(&self) -> Vec<SummaryTable> {
        aggregate::summary_tables(&self.records)
    }

    /// Every baseline comparison in the data
    pub fn comparisons(&self) -> Vec<ComparisonResult> {
        comparison::compare_all(&self.records)
    }

    /// Per-patient breakdown of one comparison
    pub fn paired_detail(
        &self,
        survey: &str,
        treatment: &Treatment,
        follow_up: FollowUp,
    ) -> PairedDetail {
        comparison::paired_detail(&self.records, survey, treatment, follow_up)
    }

    /// Render a figure into `results_dir`
    pub fn plot(&self, config: &PlotConfig, results_dir: &Path) -> Result<PathBuf, AnalysisError> {
        plot::render(&self.records, config, results_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::{NotComputed, Outcome};

    fn create_sample_dataset() -> Dataset {
        let csv_data = "survey_name,q_category,patient_number,patient_fmt_or_p,follow_up_number,score\n\
                        S1,Pain,1,FMT,0,5\n\
                        S1,Pain,1,FMT,2,9\n\
                        S1,Pain,2,fmt,0,6\n\
                        S1,Pain,2,FMT,2,6\n\
                        S1,Pain,3,FMT,2,oops\n\
                        S2,Mood,4,Placebo,0,3";
        Dataset::from_csv("test".to_string(), csv_data).unwrap()
    }

    #[test]
    fn test_engine_creation() {
        let engine = InsightEngine::new(&create_sample_dataset());
        assert_eq!(engine.name(), "test");
        assert_eq!(engine.records().len(), 5);
        assert_eq!(engine.report().dropped_count(), 1);
        assert_eq!(engine.report().dropped[0].row, 5);
        assert_eq!(engine.surveys(), vec!["S1", "S2"]);
    }

    #[test]
    fn test_end_to_end_comparison() {
        let engine = InsightEngine::new(&create_sample_dataset());
        let totals = engine.totals(Granularity::Total);
        let fu2 = FollowUp::from_index(2);
        let by_patient = totals.by_patient("S1", &Treatment::Fmt, fu2, None);
        assert_eq!(by_patient.get("1"), Some(&9.0));
        assert_eq!(by_patient.get("2"), Some(&6.0));

        let results = engine.comparisons();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].outcome,
            Outcome::NotComputed {
                reason: NotComputed::InsufficientDifferences
            }
        );
        assert!(!results[0].significant());
    }

    #[test]
    fn test_summary_tables() {
        let engine = InsightEngine::new(&create_sample_dataset());
        let tables = engine.summary_tables();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].survey, "S2");
        assert_eq!(tables[1].rows[1].treatment, Treatment::Placebo);
        assert_eq!(tables[1].rows[1].n, 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = InsightEngine::load(Path::new("does/not/exist.csv"));
        assert!(matches!(result, Err(AnalysisError::DatasetNotFound { .. })));
    }
}
