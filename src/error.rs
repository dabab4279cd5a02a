//! Error types for loading, configuring, and exporting reports.
//!
//! The aggregation core itself never fails; only the edges that touch files
//! or user-supplied configuration return a `ReportError`.

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No data: {0}")]
    NoData(String),
}

pub type ReportResult<T> = Result<T, ReportError>;
