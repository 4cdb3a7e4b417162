//! Row cleaning: coerce raw survey rows into typed records
//!
//! Rows whose score or follow-up number cannot be read as a finite number are
//! excluded, never repaired. Every exclusion is kept in a [`CleaningReport`]
//! so data quality problems show up as more than a smaller N.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::dataset::RawRecord;
use crate::utils::{format_number, normalize_identifier, parse_number, AnalysisError};

/// Treatment arm of a patient
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Treatment {
    Fmt,
    Placebo,
    /// Any other (uppercased) label; carried through but never selected
    Other(String),
}

impl Treatment {
    /// The two arms compared by every analysis, in presentation order
    pub const ARMS: [Treatment; 2] = [Treatment::Fmt, Treatment::Placebo];

    /// Map a raw label to an arm, case-insensitively
    pub fn from_label(raw: &str) -> Self {
        let label = raw.trim().to_uppercase();
        match label.as_str() {
            "FMT" => Treatment::Fmt,
            "PLACEBO" => Treatment::Placebo,
            _ => Treatment::Other(label),
        }
    }

    pub fn is_arm(&self) -> bool {
        !matches!(self, Treatment::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Treatment::Fmt => "FMT",
            Treatment::Placebo => "PLACEBO",
            Treatment::Other(label) => label,
        }
    }
}

impl fmt::Display for Treatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Treatment {
    type Err = AnalysisError;

    /// Strict parse used for user input: only the two arms are accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Treatment::from_label(s) {
            Treatment::Other(label) => Err(AnalysisError::UnknownTreatment(label)),
            arm => Ok(arm),
        }
    }
}

/// Follow-up index of a survey administration (0 = baseline)
///
/// Always finite, so it can be totally ordered and used as a map key.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FollowUp(f64);

impl FollowUp {
    pub const BASELINE: FollowUp = FollowUp(0.0);

    /// Wrap a finite value; `None` for NaN or infinities
    pub fn new(value: f64) -> Option<Self> {
        // + 0.0 folds -0.0 into 0.0
        value.is_finite().then_some(FollowUp(value + 0.0))
    }

    /// Whole-number follow-up index
    pub fn from_index(index: u32) -> Self {
        FollowUp(f64::from(index))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_baseline(self) -> bool {
        self.0 == 0.0
    }
}

impl PartialEq for FollowUp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FollowUp {}

impl PartialOrd for FollowUp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FollowUp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for FollowUp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_number(self.0))
    }
}

impl FromStr for FollowUp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_number(s)
            .and_then(FollowUp::new)
            .ok_or_else(|| format!("'{}' is not a finite follow-up number", s))
    }
}

/// A typed survey row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedRecord {
    pub survey_name: String,
    pub q_category: String,
    pub patient: String,
    pub treatment: Treatment,
    pub follow_up: FollowUp,
    pub score: f64,
}

/// Why a row was excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    Score,
    FollowUp,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Score => f.write_str("unparseable score"),
            DropReason::FollowUp => f.write_str("unparseable follow_up_number"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRow {
    pub row: usize,
    pub reason: DropReason,
    pub raw_value: String,
}

/// Side-channel account of what cleaning removed or could not classify
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped: Vec<DroppedRow>,
    /// Unrecognised treatment labels and how many kept rows carry them
    pub unrecognized_treatments: BTreeMap<String, usize>,
}

impl CleaningReport {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.unrecognized_treatments.is_empty()
    }
}

/// Output of [`clean`]: the typed rows plus the report
#[derive(Debug, Clone, Default)]
pub struct Cleaned {
    pub records: Vec<CleanedRecord>,
    pub report: CleaningReport,
}

/// Clean one row, or say why it was dropped
pub fn clean_record(raw: &RawRecord) -> Result<CleanedRecord, DroppedRow> {
    let dropped = |reason, value: &str| DroppedRow {
        row: raw.row,
        reason,
        raw_value: value.to_string(),
    };

    let score = parse_number(&raw.score).ok_or_else(|| dropped(DropReason::Score, &raw.score))?;
    let follow_up = parse_number(&raw.follow_up_number)
        .and_then(FollowUp::new)
        .ok_or_else(|| dropped(DropReason::FollowUp, &raw.follow_up_number))?;

    Ok(CleanedRecord {
        survey_name: raw.survey_name.clone(),
        q_category: raw.q_category.clone(),
        patient: normalize_identifier(&raw.patient_number),
        treatment: Treatment::from_label(&raw.patient_fmt_or_p),
        follow_up,
        score,
    })
}

/// Apply the cleaning policy to every raw row
pub fn clean(records: &[RawRecord]) -> Cleaned {
    let mut cleaned = Cleaned::default();
    cleaned.report.total_rows = records.len();

    for raw in records {
        match clean_record(raw) {
            Ok(record) => {
                if let Treatment::Other(label) = &record.treatment {
                    *cleaned
                        .report
                        .unrecognized_treatments
                        .entry(label.clone())
                        .or_insert(0) += 1;
                }
                cleaned.records.push(record);
            }
            Err(dropped) => cleaned.report.dropped.push(dropped),
        }
    }
    cleaned.report.kept_rows = cleaned.records.len();

    if !cleaned.report.dropped.is_empty() {
        tracing::warn!(
            dropped = cleaned.report.dropped_count(),
            total = cleaned.report.total_rows,
            "rows excluded during cleaning"
        );
    }
    for (label, count) in &cleaned.report.unrecognized_treatments {
        tracing::warn!(label = %label, rows = count, "unrecognized treatment label");
    }

    cleaned
}
