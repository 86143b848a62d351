//! MemSeriesStore - in-memory, append-only backing store.
//!
//! Samples are kept per series in a `BTreeMap` keyed by timestamp. Series are
//! addressed by a hash of their label set and kept in creation order so that
//! queries return them deterministically.
//!
//! The store only ever grows: there is no delete or overwrite path. Appending
//! at or before a series' newest timestamp is rejected.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use crate::error::{LoadError, Result};
use crate::labels::{matches_all, Labels, Matcher};
use crate::storage::{Sample, Series, SeriesId, SeriesStore, TimeRange, Timestamp};

/// Default maximum number of series per store.
pub const DEFAULT_MAX_SERIES: usize = 100_000;

/// Default maximum number of samples per series.
pub const DEFAULT_MAX_SAMPLES_PER_SERIES: usize = 1_000_000;

/// Capacity limits for a [`MemSeriesStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemStoreConfig {
    /// Maximum number of distinct series.
    ///
    /// Appending to a new series beyond this limit fails with
    /// `LoadError::SeriesLimitExceeded`. Default: 100,000.
    pub max_series: usize,

    /// Maximum number of samples held by a single series.
    ///
    /// Appending beyond this limit fails with
    /// `LoadError::SampleLimitExceeded`. Default: 1,000,000.
    pub max_samples_per_series: usize,
}

impl Default for MemStoreConfig {
    fn default() -> Self {
        Self {
            max_series: DEFAULT_MAX_SERIES,
            max_samples_per_series: DEFAULT_MAX_SAMPLES_PER_SERIES,
        }
    }
}

impl MemStoreConfig {
    /// Sets the maximum number of series.
    pub fn with_max_series(mut self, max: usize) -> Self {
        self.max_series = max;
        self
    }

    /// Sets the maximum number of samples per series.
    pub fn with_max_samples_per_series(mut self, max: usize) -> Self {
        self.max_samples_per_series = max;
        self
    }
}

/// Statistics for a MemSeriesStore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemStoreStats {
    /// Total number of samples.
    pub point_count: u64,
    /// Number of unique series.
    pub series_count: usize,
    /// Minimum timestamp across all samples.
    pub min_timestamp: Option<Timestamp>,
    /// Maximum timestamp across all samples.
    pub max_timestamp: Option<Timestamp>,
}

impl MemStoreStats {
    fn record(&mut self, ts: Timestamp) {
        self.point_count += 1;
        self.min_timestamp = Some(self.min_timestamp.map_or(ts, |min| min.min(ts)));
        self.max_timestamp = Some(self.max_timestamp.map_or(ts, |max| max.max(ts)));
    }
}

#[derive(Debug)]
struct MemSeries {
    labels: Labels,
    samples: BTreeMap<Timestamp, f64>,
}

/// In-memory series store.
#[derive(Debug, Default)]
pub struct MemSeriesStore {
    config: MemStoreConfig,
    /// Series in creation order.
    series: Vec<MemSeries>,
    /// Positions in `series` per label hash. Collisions share a bucket.
    index: HashMap<SeriesId, Vec<usize>>,
    stats: MemStoreStats,
}

impl MemSeriesStore {
    /// Creates an empty store with default limits.
    pub fn new() -> Self {
        Self::with_config(MemStoreConfig::default())
    }

    /// Creates an empty store with the given limits.
    pub fn with_config(config: MemStoreConfig) -> Self {
        Self {
            config,
            series: Vec::new(),
            index: HashMap::new(),
            stats: MemStoreStats::default(),
        }
    }

    /// Returns the store's configuration.
    pub fn config(&self) -> &MemStoreConfig {
        &self.config
    }

    /// Returns the statistics for this store.
    pub fn stats(&self) -> &MemStoreStats {
        &self.stats
    }

    /// Computes the series ID for a label set without modifying state.
    ///
    /// Labels are kept sorted, so equal sets always hash the same.
    pub fn compute_series_id(labels: &Labels) -> SeriesId {
        let mut hasher = DefaultHasher::new();
        labels.hash(&mut hasher);
        hasher.finish()
    }

    fn position(&self, id: SeriesId, labels: &Labels) -> Option<usize> {
        self.index
            .get(&id)?
            .iter()
            .copied()
            .find(|&pos| self.series[pos].labels == *labels)
    }

    /// Returns the position of the series, creating it if needed.
    fn get_or_create_series(&mut self, labels: &Labels) -> Result<usize> {
        let id = Self::compute_series_id(labels);
        if let Some(pos) = self.position(id, labels) {
            return Ok(pos);
        }

        if self.series.len() >= self.config.max_series {
            return Err(LoadError::SeriesLimitExceeded {
                limit: self.config.max_series,
            });
        }

        let pos = self.series.len();
        self.series.push(MemSeries {
            labels: labels.clone(),
            samples: BTreeMap::new(),
        });
        self.index.entry(id).or_default().push(pos);
        self.stats.series_count += 1;
        Ok(pos)
    }

    /// Returns all samples of a series, or `None` if it was never appended to.
    pub fn samples(&self, labels: &Labels) -> Option<Vec<Sample>> {
        let pos = self.position(Self::compute_series_id(labels), labels)?;
        Some(
            self.series[pos]
                .samples
                .iter()
                .map(|(&ts, &value)| Sample::new(ts, value))
                .collect(),
        )
    }

    /// Returns the number of unique series.
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Returns the total number of samples.
    pub fn point_count(&self) -> u64 {
        self.stats.point_count
    }
}

impl SeriesStore for MemSeriesStore {
    fn append(&mut self, labels: &Labels, timestamp: Timestamp, value: f64) -> Result<()> {
        // Check capacity and ordering against an existing series before
        // creating a new one so a rejected sample leaves no empty series.
        let existing = self.position(Self::compute_series_id(labels), labels);
        if let Some(pos) = existing {
            let series = &self.series[pos];
            if let Some((&last, _)) = series.samples.last_key_value() {
                if timestamp == last {
                    return Err(LoadError::DuplicateSample {
                        series: labels.to_string(),
                        timestamp,
                    });
                }
                if timestamp < last {
                    return Err(LoadError::OutOfOrderSample {
                        series: labels.to_string(),
                        timestamp,
                        last,
                    });
                }
            }
            if series.samples.len() >= self.config.max_samples_per_series {
                return Err(LoadError::SampleLimitExceeded {
                    series: labels.to_string(),
                    limit: self.config.max_samples_per_series,
                });
            }
        } else if self.config.max_samples_per_series == 0 {
            return Err(LoadError::SampleLimitExceeded {
                series: labels.to_string(),
                limit: 0,
            });
        }

        let pos = match existing {
            Some(pos) => pos,
            None => self.get_or_create_series(labels)?,
        };
        self.series[pos].samples.insert(timestamp, value);
        self.stats.record(timestamp);
        Ok(())
    }

    fn select(&self, range: TimeRange, matchers: &[Matcher]) -> Result<Vec<Series>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let selected = self
            .series
            .iter()
            .filter(|s| matches_all(matchers, &s.labels))
            .filter_map(|s| {
                let samples: Vec<Sample> = s
                    .samples
                    .range(range.min..=range.max)
                    .map(|(&ts, &value)| Sample::new(ts, value))
                    .collect();
                (!samples.is_empty()).then(|| Series::new(s.labels.clone(), samples))
            })
            .collect();
        Ok(selected)
    }
}
