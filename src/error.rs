use thiserror::Error;

/// Dataset-level failures surfaced to callers.
///
/// Per-row problems (bad dates, missing coordinates) never show up here: the
/// offending row is excluded and counted in the report instead.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AnalyticsError {
    /// Columns reported missing, empty for every other variant.
    pub fn missing_columns(&self) -> &[String] {
        match self {
            AnalyticsError::MissingColumns(cols) => cols,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
