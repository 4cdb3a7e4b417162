use serde::Serialize;
use std::io::Read;
use std::path::Path;

use crate::utils::AnalysisError;

/// Columns every survey dataset must provide, in canonical order
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "survey_name",
    "q_category",
    "patient_number",
    "patient_fmt_or_p",
    "follow_up_number",
    "score",
];

/// One untyped row of the flat survey CSV
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct RawRecord {
    /// 1-based data row number (header excluded)
    pub row: usize,
    pub survey_name: String,
    pub q_category: String,
    pub patient_number: String,
    pub patient_fmt_or_p: String,
    pub follow_up_number: String,
    pub score: String,
}

/// A loaded survey table
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub name: String,
    pub records: Vec<RawRecord>,
}

impl Dataset {
    /// Create a new empty dataset
    pub fn new(name: String) -> Self {
        Self {
            name,
            records: Vec::new(),
        }
    }

    /// Add a record to the dataset
    pub fn add_record(&mut self, record: RawRecord) {
        self.records.push(record);
    }

    /// Get the number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load dataset from CSV text
    pub fn from_csv(name: String, csv_data: &str) -> Result<Self, AnalysisError> {
        Self::from_reader(name, csv_data.as_bytes())
    }

    /// Load dataset from any CSV byte source
    ///
    /// Only the presence of the required columns is validated. Extra columns
    /// are ignored and short rows read their missing cells as empty text.
    pub fn from_reader<R: Read>(name: String, source: R) -> Result<Self, AnalysisError> {
        let mut dataset = Dataset::new(name);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let headers = reader.headers()?.clone();
        let mut index = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, column) in index.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| AnalysisError::MissingColumn(column.to_string()))?;
        }

        for (i, result) in reader.records().enumerate() {
            let record = result?;
            let cell = |col: usize| record.get(index[col]).unwrap_or_default().to_string();
            dataset.add_record(RawRecord {
                row: i + 1,
                survey_name: cell(0),
                q_category: cell(1),
                patient_number: cell(2),
                patient_fmt_or_p: cell(3),
                follow_up_number: cell(4),
                score: cell(5),
            });
        }

        Ok(dataset)
    }
}

/// Read the survey CSV at `path`
///
/// # Returns
/// * `Ok(Dataset)` named after the file stem
/// * `Err(AnalysisError::DatasetNotFound)` if the file does not exist
pub fn load_dataset(path: &Path) -> Result<Dataset, AnalysisError> {
    if !path.is_file() {
        return Err(AnalysisError::DatasetNotFound {
            path: path.to_path_buf(),
        });
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    let file = std::fs::File::open(path)?;
    let dataset = Dataset::from_reader(name, std::io::BufReader::new(file))?;

    tracing::debug!(
        path = %path.display(),
        records = dataset.len(),
        "loaded survey dataset"
    );
    Ok(dataset)
}
