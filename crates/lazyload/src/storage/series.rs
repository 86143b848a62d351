//! Read-side series snapshots and their point iterators.

use std::sync::Arc;

use crate::error::{LoadError, Result};
use crate::labels::Labels;
use crate::storage::{Sample, Timestamp};

/// An immutable snapshot of one series' samples.
///
/// Cloning is cheap; samples are shared. The snapshot never observes
/// samples appended after it was taken.
#[derive(Debug, Clone)]
pub struct Series {
    labels: Labels,
    samples: Arc<[Sample]>,
    read_error: Option<Arc<str>>,
}

impl Series {
    /// Creates a snapshot from samples sorted by timestamp.
    pub fn new(labels: Labels, samples: impl Into<Arc<[Sample]>>) -> Self {
        Self {
            labels,
            samples: samples.into(),
            read_error: None,
        }
    }

    /// Creates a snapshot whose iterator yields `samples` and then reports
    /// `message` as a read error instead of ending normally.
    pub fn with_read_error(
        labels: Labels,
        samples: impl Into<Arc<[Sample]>>,
        message: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            labels,
            samples: samples.into(),
            read_error: Some(message.into()),
        }
    }

    /// The series' label set.
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Number of samples in the snapshot.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the snapshot holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns a fresh iterator positioned before the first sample.
    pub fn iter(&self) -> SeriesIterator {
        SeriesIterator {
            samples: Arc::clone(&self.samples),
            next: 0,
            read_error: self.read_error.clone(),
            err: None,
        }
    }
}

/// Iterates a series' samples in increasing timestamp order.
///
/// `next()` returning `None` means the iterator is done; call
/// [`SeriesIterator::err`] to tell normal exhaustion from a read failure.
#[derive(Debug)]
pub struct SeriesIterator {
    samples: Arc<[Sample]>,
    next: usize,
    read_error: Option<Arc<str>>,
    err: Option<LoadError>,
}

impl SeriesIterator {
    /// The sample the iterator is positioned on, if any.
    pub fn at(&self) -> Option<Sample> {
        self.next
            .checked_sub(1)
            .and_then(|idx| self.samples.get(idx))
            .copied()
    }

    /// Advances to the first sample with timestamp `>= ts`.
    ///
    /// Does not move backwards: if the current sample already satisfies the
    /// bound it is returned again.
    pub fn seek(&mut self, ts: Timestamp) -> Option<Sample> {
        if let Some(current) = self.at() {
            if current.timestamp >= ts {
                return Some(current);
            }
        }
        let start = self.next.min(self.samples.len());
        let skip = self.samples[start..].partition_point(|s| s.timestamp < ts);
        self.next = start + skip;
        self.next()
    }

    /// The read error that ended iteration, if any.
    pub fn err(&self) -> Option<&LoadError> {
        self.err.as_ref()
    }

    /// Drains the iterator.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Read` if the underlying read failed.
    pub fn collect_samples(mut self) -> Result<Vec<Sample>> {
        let samples: Vec<Sample> = self.by_ref().collect();
        match self.err.take() {
            Some(err) => Err(err),
            None => Ok(samples),
        }
    }
}

impl Iterator for SeriesIterator {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.err.is_some() {
            return None;
        }
        match self.samples.get(self.next) {
            Some(sample) => {
                self.next += 1;
                Some(*sample)
            }
            None => {
                // Park past the end so `at()` reports nothing.
                self.next = self.samples.len() + 1;
                if let Some(message) = self.read_error.take() {
                    self.err = Some(LoadError::Read(message.to_string()));
                }
                None
            }
        }
    }
}
