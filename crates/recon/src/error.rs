use thiserror::Error;

use crate::model::{SourceKind, TerritoryKind};

/// Fatal errors. Cross-dataset discrepancies are never reported through this
/// type; they end up as [`crate::report::ReconWarning`]s instead.
#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (bad delimiter, duplicate level policy, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// Missing required column in a source header row.
    #[error("{dataset} source: missing column '{column}'")]
    MissingColumn { dataset: SourceKind, column: String },

    /// The CSV reader itself failed (bad UTF-8, unbalanced quotes, ...).
    #[error("{dataset} source: CSV error: {message}")]
    Csv { dataset: SourceKind, message: String },

    /// A required field is blank or cannot be parsed. Aborts the load.
    #[error("{dataset} source, line {line}: malformed field '{field}': {message}")]
    MalformedRecord {
        dataset: SourceKind,
        line: u64,
        field: String,
        message: String,
    },

    /// The name directory could not be queried. Only the matching stage fails.
    #[error("name directory lookup for {kind} failed: {message}")]
    DirectorySource { kind: TerritoryKind, message: String },
}

impl ReconError {
    pub(crate) fn malformed(
        dataset: SourceKind,
        line: u64,
        field: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedRecord {
            dataset,
            line,
            field: field.to_string(),
            message: message.into(),
        }
    }
}
