//! Arithmetic progressions and their sample generator.

use std::fmt;

/// Offset from the load block's origin, in milliseconds.
pub type Offset = i64;

/// `count + 1` values `start, start + step, ..., start + count * step`,
/// placed at offsets `0, interval, ..., count * interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progression {
    /// First value.
    pub start: f64,
    /// Increment between successive values.
    pub step: f64,
    /// Index of the last value.
    pub count: u64,
}

impl Progression {
    /// Creates a progression.
    pub fn new(start: f64, step: f64, count: u64) -> Self {
        Self { start, step, count }
    }

    /// A single-sample series holding `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(value, 0.0, 0)
    }

    /// Value at `index`, or `None` past the end of the progression.
    pub fn value_at(&self, index: u64) -> Option<f64> {
        (index <= self.count).then(|| self.start + self.step * index as f64)
    }

    /// Offset of the last defined sample, or `None` if it does not fit
    /// in an `Offset`.
    pub fn last_offset(&self, interval: Offset) -> Option<Offset> {
        Offset::try_from(self.count).ok()?.checked_mul(interval)
    }

    /// Returns the samples whose offsets lie in `(after, through]`.
    ///
    /// `after = None` means nothing has been emitted yet. Indices beyond
    /// `count` are never produced, however far `through` reaches; the
    /// iterator simply ends. `interval` must be positive.
    pub fn samples(&self, interval: Offset, after: Option<Offset>, through: Offset) -> Samples {
        let empty = Samples {
            progression: *self,
            interval,
            next: 1,
            last: 0,
        };
        if interval <= 0 || through < 0 {
            return empty;
        }

        let interval_u = interval as u64;
        let first = match after {
            Some(after) if after >= 0 => after as u64 / interval_u + 1,
            _ => 0,
        };
        let last = self.count.min(through as u64 / interval_u);

        Samples {
            progression: *self,
            interval,
            next: first,
            last,
        }
    }
}

impl fmt::Display for Progression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 && self.step == 0.0 {
            return write!(f, "{}", self.start);
        }
        if self.step.is_sign_negative() {
            write!(f, "{}-{}x{}", self.start, -self.step, self.count)
        } else {
            write!(f, "{}+{}x{}", self.start, self.step, self.count)
        }
    }
}

/// Iterator over `(offset, value)` pairs produced by [`Progression::samples`].
#[derive(Debug, Clone)]
pub struct Samples {
    progression: Progression,
    interval: Offset,
    next: u64,
    last: u64,
}

impl Iterator for Samples {
    type Item = (Offset, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.last {
            return None;
        }
        let index = self.next;
        self.next += 1;
        // index <= through / interval, so the product fits.
        let offset = index as Offset * self.interval;
        self.progression.value_at(index).map(|value| (offset, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.last + 1).saturating_sub(self.next);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
