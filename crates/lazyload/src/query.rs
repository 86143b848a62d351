//! Read-side facade over a backing store.
//!
//! A [`Querier`] is bounded by a `[min, max]` window that is independent of
//! how far the loader has advanced: it sees exactly what has been appended.
//! Returned series are snapshots and stay valid after further loading.

use std::collections::{BTreeSet, HashSet};

use crate::error::{LoadError, Result};
use crate::labels::{Labels, Matcher};
use crate::storage::{Series, SeriesStore, TimeRange, Timestamp};

/// Hands out [`Querier`]s over one store.
#[derive(Debug)]
pub struct Queryable<'a, S> {
    store: &'a S,
}

impl<'a, S: SeriesStore> Queryable<'a, S> {
    /// Wraps a store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// A querier over `[min, max]`.
    pub fn querier(&self, min: Timestamp, max: Timestamp) -> Querier<'a, S> {
        Querier {
            store: self.store,
            range: TimeRange::new(min, max),
        }
    }
}

/// Matcher-driven, time-bounded reads.
#[derive(Debug)]
pub struct Querier<'a, S> {
    store: &'a S,
    range: TimeRange,
}

impl<'a, S: SeriesStore> Querier<'a, S> {
    /// The window this querier reads.
    pub fn range(&self) -> TimeRange {
        self.range
    }

    /// Returns every series accepted by all `matchers`.
    ///
    /// With `sorted` the series are ordered by label set; otherwise they come
    /// in the store's order.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::StoreConsistency` if the store returns the same
    /// label set more than once.
    pub fn select(&self, sorted: bool, matchers: &[Matcher]) -> Result<SeriesSet> {
        let mut series = self.store.select(self.range, matchers)?;

        let mut seen = HashSet::with_capacity(series.len());
        if let Some(repeated) = series.iter().find(|s| !seen.insert(s.labels())) {
            let labels = repeated.labels();
            return Err(LoadError::StoreConsistency {
                series: labels.to_string(),
                count: series.iter().filter(|s| s.labels() == labels).count(),
            });
        }

        if sorted {
            series.sort_by(|a, b| a.labels().cmp(b.labels()));
        }
        Ok(SeriesSet {
            inner: series.into_iter(),
        })
    }

    /// Returns the single series whose label set equals `labels`.
    ///
    /// Series that merely carry `labels` as a subset are ignored.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::StoreConsistency` if the store returns more than
    /// one series for the label set.
    pub fn series_for(&self, labels: &Labels) -> Result<Option<Series>> {
        Ok(self
            .select(false, &labels.to_matchers())?
            .find(|s| s.labels() == labels))
    }

    /// Sorted, deduplicated label names of series with samples in the window.
    pub fn label_names(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self
            .store
            .select(self.range, &[])?
            .iter()
            .flat_map(|s| s.labels().iter().map(|l| l.name.clone()))
            .collect();
        Ok(names.into_iter().collect())
    }

    /// Sorted, deduplicated values of `name` across series with samples in
    /// the window.
    pub fn label_values(&self, name: &str) -> Result<Vec<String>> {
        let values: BTreeSet<String> = self
            .store
            .select(self.range, &[])?
            .iter()
            .filter_map(|s| s.labels().get(name).map(str::to_string))
            .collect();
        Ok(values.into_iter().collect())
    }
}

/// The series returned by [`Querier::select`].
#[derive(Debug)]
pub struct SeriesSet {
    inner: std::vec::IntoIter<Series>,
}

impl SeriesSet {
    /// Number of series not yet yielded.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if no series remain.
    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }
}

impl Iterator for SeriesSet {
    type Item = Series;

    fn next(&mut self) -> Option<Series> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for SeriesSet {}
