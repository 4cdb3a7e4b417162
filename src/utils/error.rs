use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, analysing or rendering survey data
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The input dataset does not exist; the run must abort
    #[error("DatasetNotFound: '{}' not found. Make sure the file is in the expected directory.", path.display())]
    DatasetNotFound { path: PathBuf },
    /// A required column is absent from the CSV header
    #[error("MissingColumn: required column '{0}' is not present in the header")]
    MissingColumn(String),
    /// CSV syntax or encoding errors
    #[error("CsvError: malformed CSV input")]
    Csv(#[from] csv::Error),
    /// Cause is exposed through `source()`
    #[error("IoError: file system operation failed")]
    Io(#[from] std::io::Error),
    /// Chart rendering failures
    #[error("PlotError: {0}")]
    Plot(String),
    /// Nothing left to present after filtering
    #[error("NoData: {0}")]
    NoData(String),
    #[error("UnknownTreatment: '{0}' is not one of FMT, PLACEBO")]
    UnknownTreatment(String),
}
