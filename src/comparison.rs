//! Paired baseline comparisons
//!
//! For a survey and treatment arm, per-patient totals at every non-zero
//! follow-up are paired with the same patients' baseline totals and tested
//! with the Wilcoxon signed-rank test. Small samples never raise: they yield
//! a [`Outcome::NotComputed`] result instead.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::aggregate::{Granularity, TotalsTable};
use crate::cleaning::{CleanedRecord, FollowUp, Treatment};
use crate::stats::mean;
use crate::wilcoxon::{wilcoxon_signed_rank, Method};

/// Significance level for every comparison
pub const ALPHA: f64 = 0.05;

/// Why a comparison has no statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotComputed {
    /// Fewer than two patients present at both timepoints
    InsufficientPatients,
    /// Fewer than two nonzero paired differences
    InsufficientDifferences,
}

impl fmt::Display for NotComputed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotComputed::InsufficientPatients => f.write_str("fewer than 2 paired patients"),
            NotComputed::InsufficientDifferences => f.write_str("fewer than 2 nonzero differences"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Computed {
        statistic: f64,
        p_value: f64,
        method: Method,
    },
    NotComputed {
        reason: NotComputed,
    },
}

/// Baseline versus follow-up comparison for one (survey, treatment, follow-up)
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    pub survey: String,
    pub treatment: Treatment,
    pub follow_up: FollowUp,
    /// Patients present at both timepoints
    pub n: usize,
    /// Paired differences left after removing zeros
    pub n_nonzero: usize,
    pub baseline_mean: f64,
    pub follow_up_mean: f64,
    pub mean_change: f64,
    pub outcome: Outcome,
}

impl ComparisonResult {
    pub fn statistic(&self) -> Option<f64> {
        match self.outcome {
            Outcome::Computed { statistic, .. } => Some(statistic),
            Outcome::NotComputed { .. } => None,
        }
    }

    pub fn p_value(&self) -> Option<f64> {
        match self.outcome {
            Outcome::Computed { p_value, .. } => Some(p_value),
            Outcome::NotComputed { .. } => None,
        }
    }

    /// `p_value < 0.05` at full precision; false when not computed
    pub fn significant(&self) -> bool {
        self.p_value().is_some_and(|p| p < ALPHA)
    }

    pub fn is_computed(&self) -> bool {
        matches!(self.outcome, Outcome::Computed { .. })
    }
}

/// One patient's totals at both timepoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedScore {
    pub patient: String,
    pub baseline: f64,
    pub follow_up: f64,
    pub difference: f64,
}

/// Inner join of two per-patient total maps, ordered by patient id
pub fn pair_patients(
    baseline: &BTreeMap<String, f64>,
    follow_up: &BTreeMap<String, f64>,
) -> Vec<PairedScore> {
    baseline
        .iter()
        .filter_map(|(patient, &base)| {
            follow_up.get(patient).map(|&later| PairedScore {
                patient: patient.clone(),
                baseline: base,
                follow_up: later,
                difference: later - base,
            })
        })
        .collect()
}

/// Differences with exact zeros removed
pub fn nonzero_differences(pairs: &[PairedScore]) -> Vec<f64> {
    pairs
        .iter()
        .map(|p| p.difference)
        .filter(|d| *d != 0.0)
        .collect()
}

/// Compare one follow-up against baseline from already-paired totals
pub fn compare_pairs(
    survey: &str,
    treatment: &Treatment,
    follow_up: FollowUp,
    pairs: &[PairedScore],
) -> ComparisonResult {
    let baseline: Vec<f64> = pairs.iter().map(|p| p.baseline).collect();
    let later: Vec<f64> = pairs.iter().map(|p| p.follow_up).collect();
    let baseline_mean = mean(&baseline);
    let follow_up_mean = mean(&later);
    let differences = nonzero_differences(pairs);

    let outcome = if pairs.len() < 2 {
        Outcome::NotComputed {
            reason: NotComputed::InsufficientPatients,
        }
    } else {
        match wilcoxon_signed_rank(&differences) {
            Some(test) => Outcome::Computed {
                statistic: test.statistic,
                p_value: test.p_value,
                method: test.method,
            },
            None => Outcome::NotComputed {
                reason: NotComputed::InsufficientDifferences,
            },
        }
    };

    ComparisonResult {
        survey: survey.to_string(),
        treatment: treatment.clone(),
        follow_up,
        n: pairs.len(),
        n_nonzero: differences.len(),
        baseline_mean,
        follow_up_mean,
        mean_change: follow_up_mean - baseline_mean,
        outcome,
    }
}

/// Compare one follow-up of one survey and arm against its baseline
pub fn compare_follow_up(
    totals: &TotalsTable,
    survey: &str,
    treatment: &Treatment,
    follow_up: FollowUp,
) -> ComparisonResult {
    let baseline = totals.by_patient(survey, treatment, FollowUp::BASELINE, None);
    let later = totals.by_patient(survey, treatment, follow_up, None);
    let pairs = pair_patients(&baseline, &later);
    compare_pairs(survey, treatment, follow_up, &pairs)
}

/// Every (survey, arm, non-zero follow-up) comparison present in the data
///
/// Surveys ascend by name, arms run FMT then PLACEBO, follow-ups ascend.
pub fn compare_all(records: &[CleanedRecord]) -> Vec<ComparisonResult> {
    let totals = TotalsTable::build(records, Granularity::Total);
    let mut results = Vec::new();

    for survey in totals.surveys() {
        for treatment in Treatment::ARMS {
            for follow_up in totals.follow_ups_for(&survey, &treatment) {
                if follow_up.is_baseline() {
                    continue;
                }
                let result = compare_follow_up(&totals, &survey, &treatment, follow_up);
                tracing::debug!(
                    survey = %survey,
                    treatment = %treatment,
                    follow_up = %follow_up,
                    n = result.n,
                    computed = result.is_computed(),
                    "baseline comparison"
                );
                results.push(result);
            }
        }
    }
    results
}

/// Per-patient breakdown of a single comparison
#[derive(Debug, Clone, Serialize)]
pub struct PairedDetail {
    pub pairs: Vec<PairedScore>,
    pub result: ComparisonResult,
}

/// Joined baseline / follow-up scores for one comparison, with its result
pub fn paired_detail(
    records: &[CleanedRecord],
    survey: &str,
    treatment: &Treatment,
    follow_up: FollowUp,
) -> PairedDetail {
    let totals = TotalsTable::build(records, Granularity::Total);
    let baseline = totals.by_patient(survey, treatment, FollowUp::BASELINE, None);
    let later = totals.by_patient(survey, treatment, follow_up, None);
    let pairs = pair_patients(&baseline, &later);
    let result = compare_pairs(survey, treatment, follow_up, &pairs);
    PairedDetail { pairs, result }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(patient: &str, treatment: Treatment, follow_up: f64, score: f64) -> CleanedRecord {
        CleanedRecord {
            survey_name: "S1".to_string(),
            q_category: "Pain".to_string(),
            patient: patient.to_string(),
            treatment,
            follow_up: FollowUp::new(follow_up).unwrap(),
            score,
        }
    }

    fn totals(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(p, v)| (p.to_string(), *v)).collect()
    }

    #[test]
    fn test_pairing_excludes_unmatched_patients() {
        let baseline = totals(&[("P1", 10.0), ("P2", 20.0), ("P3", 5.0)]);
        let later = totals(&[("P1", 8.0), ("P2", 25.0)]);
        let pairs = pair_patients(&baseline, &later);

        let patients: Vec<&str> = pairs.iter().map(|p| p.patient.as_str()).collect();
        assert_eq!(patients, vec!["P1", "P2"]);
        assert_eq!(pairs[0].difference, -2.0);
        assert_eq!(pairs[1].difference, 5.0);
    }

    #[test]
    fn test_zero_differences_removed() {
        let pairs: Vec<PairedScore> = [0.0, 0.0, 3.0, -5.0, 2.0]
            .iter()
            .enumerate()
            .map(|(i, d)| PairedScore {
                patient: i.to_string(),
                baseline: 10.0,
                follow_up: 10.0 + d,
                difference: *d,
            })
            .collect();
        assert_eq!(nonzero_differences(&pairs), vec![3.0, -5.0, 2.0]);

        let result = compare_pairs("S1", &Treatment::Fmt, FollowUp::new(1.0).unwrap(), &pairs);
        assert_eq!(result.n, 5);
        assert_eq!(result.n_nonzero, 3);
        assert_eq!(result.statistic(), Some(3.0));
    }

    #[test]
    fn test_single_patient_not_computed() {
        let records = vec![
            record("1", Treatment::Fmt, 0.0, 5.0),
            record("1", Treatment::Fmt, 1.0, 9.0),
            record("2", Treatment::Fmt, 0.0, 4.0),
        ];
        let results = compare_all(&records);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.n, 1);
        assert_eq!(
            result.outcome,
            Outcome::NotComputed {
                reason: NotComputed::InsufficientPatients
            }
        );
        assert!(result.statistic().is_none());
        assert!(result.p_value().is_none());
        assert!(!result.significant());
    }

    #[test]
    fn test_end_to_end_zero_difference_scenario() {
        let records = vec![
            record("1", Treatment::Fmt, 0.0, 5.0),
            record("1", Treatment::Fmt, 2.0, 9.0),
            record("2", Treatment::Fmt, 0.0, 6.0),
            record("2", Treatment::Fmt, 2.0, 6.0),
        ];
        let detail = paired_detail(&records, "S1", &Treatment::Fmt, FollowUp::new(2.0).unwrap());
        let differences: Vec<f64> = detail.pairs.iter().map(|p| p.difference).collect();
        assert_eq!(differences, vec![4.0, 0.0]);

        let result = detail.result;
        assert_eq!(result.n, 2);
        assert_eq!(result.n_nonzero, 1);
        assert_eq!(
            result.outcome,
            Outcome::NotComputed {
                reason: NotComputed::InsufficientDifferences
            }
        );
        assert!(!result.significant());
        assert_eq!(result.baseline_mean, 5.5);
        assert_eq!(result.follow_up_mean, 7.5);
        assert_eq!(result.mean_change, 2.0);
    }

    #[test]
    fn test_significance_matches_threshold() {
        let mut records = Vec::new();
        for i in 1..=10 {
            let patient = i.to_string();
            records.push(record(&patient, Treatment::Fmt, 0.0, 50.0));
            records.push(record(&patient, Treatment::Fmt, 1.0, 50.0 - i as f64));
        }
        let results = compare_all(&records);
        let result = &results[0];
        let p = result.p_value().unwrap();
        assert!((p - 0.001953125).abs() < 1e-12);
        assert_eq!(result.significant(), p < ALPHA);
        assert!(result.significant());
    }

    #[test]
    fn test_enumeration_order_and_arm_filter() {
        let records = vec![
            record("1", Treatment::Placebo, 0.0, 1.0),
            record("1", Treatment::Placebo, 2.0, 1.0),
            record("1", Treatment::Fmt, 0.0, 1.0),
            record("1", Treatment::Fmt, 3.0, 1.0),
            record("1", Treatment::Fmt, 1.0, 1.0),
            record("9", Treatment::Other("SHAM".to_string()), 0.0, 1.0),
            record("9", Treatment::Other("SHAM".to_string()), 1.0, 1.0),
        ];
        let order: Vec<(String, String)> = compare_all(&records)
            .iter()
            .map(|r| (r.treatment.to_string(), r.follow_up.to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("FMT".to_string(), "1".to_string()),
                ("FMT".to_string(), "3".to_string()),
                ("PLACEBO".to_string(), "2".to_string()),
            ]
        );
    }
}
