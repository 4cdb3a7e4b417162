/// Utility modules for error handling and type conversions
pub mod error;
pub mod type_convert;

// Re-export commonly used types
pub use error::AnalysisError;
pub use type_convert::{format_number, normalize_identifier, parse_number};
