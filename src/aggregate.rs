use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::cleaning::{CleanedRecord, FollowUp, Treatment};
use crate::stats::Statistics;

/// Which rows are summed together into one patient total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Sum across every category of a survey
    Total,
    /// Sum within each q_category
    Category,
}

/// Grouping key of a patient-timepoint total
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct TotalKey {
    pub survey: String,
    /// Present only for [`Granularity::Category`] tables
    pub category: Option<String>,
    pub treatment: Treatment,
    pub follow_up: FollowUp,
    pub patient: String,
}

/// Summed scores keyed by survey, patient, follow-up and treatment
#[derive(Debug, Clone)]
pub struct TotalsTable {
    granularity: Granularity,
    totals: BTreeMap<TotalKey, f64>,
}

impl TotalsTable {
    /// Group-by-sum the cleaned rows
    pub fn build(records: &[CleanedRecord], granularity: Granularity) -> Self {
        let mut totals = BTreeMap::new();
        for record in records {
            let key = TotalKey {
                survey: record.survey_name.clone(),
                category: match granularity {
                    Granularity::Total => None,
                    Granularity::Category => Some(record.q_category.clone()),
                },
                treatment: record.treatment.clone(),
                follow_up: record.follow_up,
                patient: record.patient.clone(),
            };
            *totals.entry(key).or_insert(0.0) += record.score;
        }
        Self {
            granularity,
            totals,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TotalKey, f64)> {
        self.totals.iter().map(|(k, v)| (k, *v))
    }

    /// Distinct survey names, sorted
    pub fn surveys(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.totals.keys().map(|k| &k.survey).collect();
        names.into_iter().cloned().collect()
    }

    /// Distinct follow-ups recorded for a survey (any treatment), ascending
    pub fn follow_ups(&self, survey: &str) -> Vec<FollowUp> {
        let values: BTreeSet<FollowUp> = self
            .totals
            .keys()
            .filter(|k| k.survey == survey)
            .map(|k| k.follow_up)
            .collect();
        values.into_iter().collect()
    }

    /// Follow-ups recorded for one survey and treatment, ascending
    pub fn follow_ups_for(&self, survey: &str, treatment: &Treatment) -> Vec<FollowUp> {
        let values: BTreeSet<FollowUp> = self
            .totals
            .keys()
            .filter(|k| k.survey == survey && &k.treatment == treatment)
            .map(|k| k.follow_up)
            .collect();
        values.into_iter().collect()
    }

    /// Distinct categories of a survey, sorted; empty for total tables
    pub fn categories(&self, survey: &str) -> Vec<String> {
        let values: BTreeSet<&String> = self
            .totals
            .keys()
            .filter(|k| k.survey == survey)
            .filter_map(|k| k.category.as_ref())
            .collect();
        values.into_iter().cloned().collect()
    }

    /// Per-patient totals for one selection
    ///
    /// `category` is ignored for [`Granularity::Total`] tables.
    pub fn by_patient(
        &self,
        survey: &str,
        treatment: &Treatment,
        follow_up: FollowUp,
        category: Option<&str>,
    ) -> BTreeMap<String, f64> {
        self.totals
            .iter()
            .filter(|(k, _)| {
                k.survey == survey
                    && &k.treatment == treatment
                    && k.follow_up == follow_up
                    && match (self.granularity, category) {
                        (Granularity::Category, Some(c)) => k.category.as_deref() == Some(c),
                        _ => true,
                    }
            })
            .map(|(k, v)| (k.patient.clone(), *v))
            .collect()
    }
}

/// Shorthand for [`TotalsTable::build`]
pub fn patient_totals(records: &[CleanedRecord], granularity: Granularity) -> TotalsTable {
    TotalsTable::build(records, granularity)
}

/// Across-patient mean and sample standard deviation of a group's totals
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupSummary {
    pub n: usize,
    /// NaN when the group is empty
    pub mean: f64,
    /// NaN when the group has fewer than two patients
    pub std: f64,
}

impl GroupSummary {
    pub fn of(values: &[f64]) -> Self {
        match Statistics::compute(values) {
            Some(stats) => Self {
                n: stats.count,
                mean: stats.mean,
                std: stats.std,
            },
            None => Self {
                n: 0,
                mean: f64::NAN,
                std: f64::NAN,
            },
        }
    }
}

/// One row of a per-survey summary table
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub follow_up: FollowUp,
    pub treatment: Treatment,
    /// Number of patients with at least one score in this group
    pub n: usize,
    pub total: GroupSummary,
    /// One entry per survey category, in [`SummaryTable::categories`] order
    pub categories: Vec<GroupSummary>,
}

/// Summary of one survey: rows per follow-up and treatment arm
#[derive(Debug, Clone, Serialize)]
pub struct SummaryTable {
    pub survey: String,
    pub categories: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

/// Build the summary table of every survey, surveys sorted by name
pub fn summary_tables(records: &[CleanedRecord]) -> Vec<SummaryTable> {
    let totals = TotalsTable::build(records, Granularity::Total);
    let by_category = TotalsTable::build(records, Granularity::Category);

    totals
        .surveys()
        .into_iter()
        .map(|survey| summary_table(&totals, &by_category, survey))
        .collect()
}

fn summary_table(totals: &TotalsTable, by_category: &TotalsTable, survey: String) -> SummaryTable {
    let categories = by_category.categories(&survey);
    let mut rows = Vec::new();

    for follow_up in totals.follow_ups(&survey) {
        for treatment in Treatment::ARMS {
            let patient_totals: Vec<f64> = totals
                .by_patient(&survey, &treatment, follow_up, None)
                .into_values()
                .collect();
            let total = GroupSummary::of(&patient_totals);

            let category_summaries = categories
                .iter()
                .map(|category| {
                    let values: Vec<f64> = by_category
                        .by_patient(&survey, &treatment, follow_up, Some(category))
                        .into_values()
                        .collect();
                    GroupSummary::of(&values)
                })
                .collect();

            rows.push(SummaryRow {
                follow_up,
                treatment,
                n: total.n,
                total,
                categories: category_summaries,
            });
        }
    }

    SummaryTable {
        survey,
        categories,
        rows,
    }
}
