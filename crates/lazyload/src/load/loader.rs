//! LazyLoader - watermark-driven incremental materialization.
//!
//! A [`LazyLoader`] parses a load block once and then reveals samples to its
//! backing store only up to the instant passed to
//! [`LazyLoader::advance_to`]. Samples already revealed are never touched
//! again, so asking for an earlier instant is a successful no-op.
//!
//! # Example
//!
//! ```rust,ignore
//! use alopex_lazyload::{LazyLoader, Labels, METRIC_NAME};
//!
//! let mut loader = LazyLoader::new("load 10s\n  metric1 1+1x10")?;
//! loader.with_samples_till(40_000, |loader, result| {
//!     result?;
//!     let querier = loader.querier(i64::MIN, i64::MAX);
//!     let series = querier.series_for(&Labels::from_pairs([(METRIC_NAME, "metric1")]))?;
//!     assert_eq!(series.map(|s| s.len()), Some(5));
//!     Ok(())
//! })?;
//! ```
//!
//! # Failure and retry
//!
//! The watermark only moves once every series has been materialized up to
//! the target. Each series additionally remembers the offset of its last
//! appended sample, so re-issuing a failed call resumes exactly where the
//! store stopped accepting samples and never appends an offset twice.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{LoadError, Result};
use crate::load::parser::{LoadBlock, SeriesDescriptor};
use crate::load::sequence::Offset;
use crate::query::{Querier, Queryable};
use crate::storage::{MemSeriesStore, MemStoreConfig, SeriesStore, Timestamp};

/// Default origin: samples start at the Unix epoch.
pub const DEFAULT_ORIGIN: Timestamp = 0;

/// Configuration for a [`LazyLoader`] backed by a [`MemSeriesStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyLoaderConfig {
    /// Absolute timestamp (ms) of offset 0. Default: the Unix epoch.
    pub origin: Timestamp,

    /// Limits for the in-memory backing store.
    pub store: MemStoreConfig,
}

impl Default for LazyLoaderConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN,
            store: MemStoreConfig::default(),
        }
    }
}

impl LazyLoaderConfig {
    /// Sets the absolute timestamp of the first sample.
    pub fn with_origin(mut self, origin: Timestamp) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the backing store limits.
    pub fn with_store_config(mut self, store: MemStoreConfig) -> Self {
        self.store = store;
        self
    }
}

/// The highest offset through which samples have been revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Watermark {
    /// Nothing has been revealed yet.
    #[default]
    BeforeFirstSample,
    /// Every sample at or before this offset has been revealed.
    Through(Offset),
}

impl Watermark {
    /// The watermark offset, or `None` before the first sample.
    pub fn offset(self) -> Option<Offset> {
        match self {
            Watermark::BeforeFirstSample => None,
            Watermark::Through(offset) => Some(offset),
        }
    }
}

#[derive(Debug)]
struct SeriesState {
    descriptor: SeriesDescriptor,
    /// Offset of the last sample appended for this series.
    loaded_through: Option<Offset>,
}

/// Reveals the samples of a load block incrementally.
///
/// Not synchronized: callers must serialize `advance_to` calls.
#[derive(Debug)]
pub struct LazyLoader<S = MemSeriesStore> {
    step: Duration,
    step_ms: Offset,
    origin: Timestamp,
    series: Vec<SeriesState>,
    watermark: Watermark,
    store: S,
}

impl LazyLoader<MemSeriesStore> {
    /// Parses `input` into a loader over a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Parse` if the load block is malformed.
    pub fn new(input: &str) -> Result<Self> {
        Self::with_config(input, LazyLoaderConfig::default())
    }

    /// Like [`LazyLoader::new`] with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Parse` if the load block is malformed.
    pub fn with_config(input: &str, config: LazyLoaderConfig) -> Result<Self> {
        let store = MemSeriesStore::with_config(config.store);
        LazyLoader::with_store(input, config.origin, store)
    }
}

impl<S: SeriesStore> LazyLoader<S> {
    /// Parses `input` into a loader writing to `store`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Parse` if the load block is malformed.
    pub fn with_store(input: &str, origin: Timestamp, store: S) -> Result<Self> {
        let block = LoadBlock::parse(input)?;
        Ok(Self::from_block(block, origin, store))
    }

    /// Builds a loader from an already parsed block.
    pub fn from_block(block: LoadBlock, origin: Timestamp, store: S) -> Self {
        let step_ms = block.step_millis();
        info!(series = block.series.len(), step_ms, origin, "parsed load block");

        let series = block
            .series
            .into_iter()
            .map(|descriptor| SeriesState {
                descriptor,
                loaded_through: None,
            })
            .collect();

        Self {
            step: block.step,
            step_ms,
            origin,
            series,
            watermark: Watermark::BeforeFirstSample,
            store,
        }
    }

    /// Reveals every sample at or before `ts`.
    ///
    /// A target at or before the current watermark leaves the store and the
    /// watermark untouched and succeeds. A series whose progression ends
    /// before `ts` simply contributes all of its samples.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::AppendFailed` if the store rejects a sample. The
    /// samples appended before the failure stay visible and the watermark is
    /// not moved; calling again with the same `ts` resumes the remaining work.
    pub fn advance_to(&mut self, ts: Timestamp) -> Result<()> {
        let target = ts.saturating_sub(self.origin);

        if self.watermark.offset().is_some_and(|w| target <= w) {
            debug!(
                target_offset = target,
                watermark = ?self.watermark,
                "target at or before watermark, nothing to load"
            );
            return Ok(());
        }
        if target < 0 {
            debug!(target_offset = target, "target before origin, nothing to load");
            return Ok(());
        }

        let watermark = self.watermark.offset();
        for state in &mut self.series {
            let after = watermark.max(state.loaded_through);
            let labels = &state.descriptor.labels;
            let mut appended = 0usize;

            for (offset, value) in state
                .descriptor
                .progression
                .samples(self.step_ms, after, target)
            {
                let timestamp = self.origin.saturating_add(offset);
                if let Err(source) = self.store.append(labels, timestamp, value) {
                    warn!(
                        series = %labels,
                        timestamp,
                        error = %source,
                        "append failed, holding watermark"
                    );
                    return Err(LoadError::AppendFailed {
                        series: labels.to_string(),
                        timestamp,
                        source: Box::new(source),
                    });
                }
                state.loaded_through = Some(offset);
                appended += 1;
            }

            debug!(series = %labels, appended, "materialized samples");
        }

        self.watermark = Watermark::Through(target);
        Ok(())
    }

    /// Reveals samples through `ts`, then hands the outcome to `f`.
    ///
    /// `f` runs exactly once, after the append step has finished and before
    /// any further mutation, so it can query the freshly visible data.
    pub fn with_samples_till<F, R>(&mut self, ts: Timestamp, f: F) -> R
    where
        F: FnOnce(&Self, Result<()>) -> R,
    {
        let result = self.advance_to(ts);
        f(self, result)
    }

    /// The current watermark.
    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// The step interval shared by all series.
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Absolute timestamp of offset 0.
    pub fn origin(&self) -> Timestamp {
        self.origin
    }

    /// The parsed series, in declaration order.
    pub fn series(&self) -> impl Iterator<Item = &SeriesDescriptor> {
        self.series.iter().map(|state| &state.descriptor)
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the loader, returning the backing store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// A factory for queriers over the backing store.
    pub fn queryable(&self) -> Queryable<'_, S> {
        Queryable::new(&self.store)
    }

    /// A querier over `[min, max]` on the backing store.
    pub fn querier(&self, min: Timestamp, max: Timestamp) -> Querier<'_, S> {
        self.queryable().querier(min, max)
    }
}
