use chrono::NaiveDate;
use thiserror::Error;

/// Anomalies raised while turning traffic rows into a flow diagram.
///
/// Per-row variants are absorbed by the caller (logged and skipped); only
/// `EmptyResult` stops a render, and it is recoverable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error("unconfigured channel: {0}")]
    UnknownChannel(String),

    #[error("channel {channel} references unregistered site {site}")]
    UnregisteredSite { channel: String, site: String },

    #[error("row {row}: unparseable date {value:?}")]
    InvalidDate { row: usize, value: String },

    #[error("row {row}: malformed record: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("no positive flows between {start} and {end}")]
    EmptyResult { start: NaiveDate, end: NaiveDate },

    #[error("{name} scale {value} outside {min}..={max}")]
    InvalidScale {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl FlowError {
    /// Configuration problems are worth a warning; everything else is noise
    /// from the source sheet.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FlowError::UnknownChannel(_) | FlowError::UnregisteredSite { .. }
        )
    }
}
