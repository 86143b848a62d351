//! Error and Result types for the lazy loader.

use thiserror::Error;

/// A convenience `Result` type for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// The error type for loading and querying test data.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The load block is malformed.
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number inside the load block.
        line: usize,
        /// What was wrong with the line.
        message: String,
    },

    /// A sample was appended at a timestamp the series already holds.
    #[error("Duplicate sample for {series} at timestamp {timestamp}")]
    DuplicateSample {
        /// Rendered label set of the series.
        series: String,
        /// Timestamp of the rejected sample.
        timestamp: i64,
    },

    /// A sample was appended before the newest sample of its series.
    #[error("Out of order sample for {series}: timestamp {timestamp} is before {last}")]
    OutOfOrderSample {
        /// Rendered label set of the series.
        series: String,
        /// Timestamp of the rejected sample.
        timestamp: i64,
        /// Newest timestamp already stored for the series.
        last: i64,
    },

    /// The store cannot accept another series.
    #[error("Series limit of {limit} reached")]
    SeriesLimitExceeded {
        /// Configured maximum number of series.
        limit: usize,
    },

    /// The store cannot accept another sample for a series.
    #[error("Sample limit of {limit} reached for {series}")]
    SampleLimitExceeded {
        /// Rendered label set of the series.
        series: String,
        /// Configured maximum number of samples per series.
        limit: usize,
    },

    /// The backing store rejected a sample during materialization.
    #[error("Failed to append sample for {series} at timestamp {timestamp}: {source}")]
    AppendFailed {
        /// Rendered label set of the series.
        series: String,
        /// Absolute timestamp of the rejected sample.
        timestamp: i64,
        /// Error reported by the store.
        #[source]
        source: Box<LoadError>,
    },

    /// A query returned more than one series for a single label set.
    #[error("Expected exactly one series for {series}, store returned {count}")]
    StoreConsistency {
        /// Rendered label set that was queried.
        series: String,
        /// Number of series the store returned.
        count: usize,
    },

    /// A regex matcher could not be compiled.
    #[error("Invalid regex for label {name}: {source}")]
    InvalidMatcher {
        /// Label name the matcher applies to.
        name: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// An underlying read failed while iterating a series.
    #[error("Read error: {0}")]
    Read(String),
}

impl LoadError {
    /// Builds a parse error for the given 1-based line.
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        LoadError::Parse {
            line,
            message: message.into(),
        }
    }

    /// Returns true if retrying the same `advance_to` call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LoadError::AppendFailed { .. })
    }
}
