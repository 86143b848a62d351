//! Label sets and label matchers.
//!
//! A series is identified by its [`Labels`]: a set of name/value pairs kept
//! sorted by name, with unique names. The metric name lives under the
//! reserved [`METRIC_NAME`] label. [`Matcher`]s select series by comparing a
//! single label value by equality, inequality or regular expression.

use std::fmt;

use regex::Regex;

use crate::error::{LoadError, Result};

/// Reserved label holding the metric name.
pub const METRIC_NAME: &str = "__name__";

/// A single name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label {
    /// Label name.
    pub name: String,
    /// Label value.
    pub value: String,
}

impl Label {
    /// Creates a new label.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A label set, sorted by name with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Labels(Vec<Label>);

impl Labels {
    /// Creates an empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a label set from name/value pairs.
    ///
    /// When a name appears more than once the last value wins.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        let mut labels = Self::new();
        for (name, value) in pairs {
            labels.set(name, value);
        }
        labels
    }

    /// Sets `name` to `value`, returning the previous value if any.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let label = Label::new(name, value);
        match self.0.binary_search_by(|l| l.name.as_str().cmp(&label.name)) {
            Ok(idx) => Some(std::mem::replace(&mut self.0[idx].value, label.value)),
            Err(idx) => {
                self.0.insert(idx, label);
                None
            }
        }
    }

    /// Returns the value of `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .binary_search_by(|l| l.name.as_str().cmp(name))
            .ok()
            .map(|idx| self.0[idx].value.as_str())
    }

    /// Returns the metric name, if present.
    pub fn metric_name(&self) -> Option<&str> {
        self.get(METRIC_NAME)
    }

    /// Returns true if `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates the labels in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set has no labels.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns equality matchers that select exactly this label set's series.
    pub fn to_matchers(&self) -> Vec<Matcher> {
        self.0
            .iter()
            .map(|l| Matcher::equal(l.name.clone(), l.value.clone()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.metric_name() {
            f.write_str(name)?;
        }
        let rest: Vec<&Label> = self.0.iter().filter(|l| l.name != METRIC_NAME).collect();
        if rest.is_empty() && self.metric_name().is_some() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, label) in rest.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}=\"", label.name)?;
            for c in label.value.chars() {
                match c {
                    '"' => f.write_str("\\\"")?,
                    '\\' => f.write_str("\\\\")?,
                    '\n' => f.write_str("\\n")?,
                    c => write!(f, "{c}")?,
                }
            }
            f.write_str("\"")?;
        }
        f.write_str("}")
    }
}

/// How a [`Matcher`] compares a label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// `name="value"`
    Equal,
    /// `name!="value"`
    NotEqual,
    /// `name=~"regex"`
    Regex,
    /// `name!~"regex"`
    NotRegex,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchKind::Equal => "=",
            MatchKind::NotEqual => "!=",
            MatchKind::Regex => "=~",
            MatchKind::NotRegex => "!~",
        })
    }
}

/// A predicate over a single label's value.
///
/// A series that does not carry the label is matched as if its value were
/// the empty string.
#[derive(Debug, Clone)]
pub struct Matcher {
    kind: MatchKind,
    name: String,
    value: String,
    re: Option<Regex>,
}

impl Matcher {
    /// Creates a matcher, compiling the pattern for regex kinds.
    ///
    /// Regex patterns are fully anchored.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidMatcher` if a regex pattern does not compile.
    pub fn new(kind: MatchKind, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let value = value.into();
        let re = match kind {
            MatchKind::Regex | MatchKind::NotRegex => {
                let re = Regex::new(&format!("^(?:{value})$")).map_err(|source| {
                    LoadError::InvalidMatcher {
                        name: name.clone(),
                        source,
                    }
                })?;
                Some(re)
            }
            MatchKind::Equal | MatchKind::NotEqual => None,
        };
        Ok(Self {
            kind,
            name,
            value,
            re,
        })
    }

    /// Creates an equality matcher. Never fails.
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: MatchKind::Equal,
            name: name.into(),
            value: value.into(),
            re: None,
        }
    }

    /// The matcher kind.
    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    /// The label name this matcher inspects.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The literal value or regex source.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Tests a single label value.
    pub fn matches(&self, value: &str) -> bool {
        match (self.kind, &self.re) {
            (MatchKind::Equal, _) => value == self.value,
            (MatchKind::NotEqual, _) => value != self.value,
            (MatchKind::Regex, Some(re)) => re.is_match(value),
            (MatchKind::NotRegex, Some(re)) => !re.is_match(value),
            // Regex kinds always carry a compiled pattern.
            (MatchKind::Regex | MatchKind::NotRegex, None) => false,
        }
    }

    /// Tests a whole label set.
    pub fn matches_labels(&self, labels: &Labels) -> bool {
        self.matches(labels.get(&self.name).unwrap_or(""))
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.kind, self.value)
    }
}

/// Returns true if every matcher accepts `labels`.
pub fn matches_all(matchers: &[Matcher], labels: &Labels) -> bool {
    matchers.iter().all(|m| m.matches_labels(labels))
}
