//! Backing store primitives.
//!
//! The loader writes through [`SeriesStore::append`] and the query facade
//! reads through [`SeriesStore::select`]. [`MemSeriesStore`] is the default
//! in-memory implementation.

pub mod memtable;
pub mod series;

pub use memtable::{
    MemSeriesStore, MemStoreConfig, MemStoreStats, DEFAULT_MAX_SAMPLES_PER_SERIES,
    DEFAULT_MAX_SERIES,
};
pub use series::{Series, SeriesIterator};

use crate::error::Result;
use crate::labels::{Labels, Matcher};

/// Absolute timestamp in milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Identifier of a series inside a store, derived from its label set.
pub type SeriesId = u64;

/// A single `(timestamp, value)` point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Timestamp in milliseconds.
    pub timestamp: Timestamp,
    /// Sample value.
    pub value: f64,
}

impl Sample {
    /// Creates a new sample.
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

impl From<(Timestamp, f64)> for Sample {
    fn from((timestamp, value): (Timestamp, f64)) -> Self {
        Self { timestamp, value }
    }
}

/// An inclusive `[min, max]` time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Earliest timestamp (inclusive).
    pub min: Timestamp,
    /// Latest timestamp (inclusive).
    pub max: Timestamp,
}

impl TimeRange {
    /// Creates a window covering `[min, max]`.
    pub fn new(min: Timestamp, max: Timestamp) -> Self {
        Self { min, max }
    }

    /// A window covering every representable timestamp.
    pub fn all() -> Self {
        Self::new(Timestamp::MIN, Timestamp::MAX)
    }

    /// Returns true if `ts` lies inside the window.
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.min <= ts && ts <= self.max
    }

    /// Returns true if the window contains no timestamps.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

/// A time-indexed, per-series, append-only sample log.
pub trait SeriesStore {
    /// Appends one sample to the series identified by `labels`.
    ///
    /// Creates the series on first use. Stores are not required to be
    /// idempotent: callers must not append the same timestamp twice.
    fn append(&mut self, labels: &Labels, timestamp: Timestamp, value: f64) -> Result<()>;

    /// Returns a snapshot of every series accepted by all `matchers`,
    /// restricted to samples inside `range`.
    ///
    /// Series with no samples inside the window are omitted.
    fn select(&self, range: TimeRange, matchers: &[Matcher]) -> Result<Vec<Series>>;
}

impl<S: SeriesStore + ?Sized> SeriesStore for &mut S {
    fn append(&mut self, labels: &Labels, timestamp: Timestamp, value: f64) -> Result<()> {
        (**self).append(labels, timestamp, value)
    }

    fn select(&self, range: TimeRange, matchers: &[Matcher]) -> Result<Vec<Series>> {
        (**self).select(range, matchers)
    }
}

impl<S: SeriesStore + ?Sized> SeriesStore for Box<S> {
    fn append(&mut self, labels: &Labels, timestamp: Timestamp, value: f64) -> Result<()> {
        (**self).append(labels, timestamp, value)
    }

    fn select(&self, range: TimeRange, matchers: &[Matcher]) -> Result<Vec<Series>> {
        (**self).select(range, matchers)
    }
}
