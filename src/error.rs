use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the ingestion pipeline.
///
/// Zero rows matching a region is not represented here: empty tables flow
/// through every stage as ordinary values.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A source file could not be opened or read.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A column the loader depends on is absent from the header row.
    #[error("{dataset}: missing column '{column}'")]
    MissingColumn { dataset: &'static str, column: String },

    /// A region-filtered row carries a date that cannot be placed on the calendar.
    #[error("{dataset}: row {row}: invalid date '{value}'")]
    DateParse {
        dataset: &'static str,
        row: usize,
        value: String,
    },

    /// A numeric field is missing where required, negative, or not a number.
    #[error("{dataset}: row {row}: invalid value '{value}' in column '{column}'")]
    InvalidField {
        dataset: &'static str,
        row: usize,
        column: String,
        value: String,
    },

    /// The year/month columns of an incident disagree with its occurrence date.
    #[error("incidents: row {row}: date {date} does not match year {year} / month {month}")]
    InconsistentCalendar {
        row: usize,
        date: chrono::NaiveDate,
        year: i32,
        month: u32,
    },

    /// A cached pipeline result was requested for a different set of input files.
    #[error("pipeline cache holds results for a different input file set")]
    CacheMismatch,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
