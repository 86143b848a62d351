//! Parser for load blocks.
//!
//! ```text
//! load 10s
//!     metric1 1+1x10
//!     http_requests{job="api", code="200"} 0+5x100
//!     {__name__="temperature", room="a"} -3.5
//! ```
//!
//! The first non-blank line declares the step interval. Every following line
//! declares one series: a label set followed by a progression
//! `<start>[+|-]<step>x<count>`, or a bare number for a single sample.
//! Blank lines and `#` comments are skipped but still counted for error
//! line numbers.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{LoadError, Result};
use crate::labels::{Labels, METRIC_NAME};
use crate::load::sequence::{Offset, Progression};

/// One series declared in a load block.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDescriptor {
    /// The series' label set.
    pub labels: Labels,
    /// The series' value rule.
    pub progression: Progression,
    /// 1-based line the series was declared on.
    pub line: usize,
}

/// A parsed load block.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBlock {
    /// Spacing between successive samples of every series.
    pub step: Duration,
    /// Declared series, in declaration order.
    pub series: Vec<SeriesDescriptor>,
}

impl LoadBlock {
    /// Parses a load block.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Parse` naming the offending line if the `load`
    /// command, a duration, a label set or a progression is malformed, or if
    /// a series is declared twice.
    pub fn parse(input: &str) -> Result<Self> {
        let mut lines = input
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let (load_line, header) = lines
            .next()
            .ok_or_else(|| LoadError::parse(1, "missing `load <duration>` command"))?;
        let step = parse_load_command(header).map_err(|msg| LoadError::parse(load_line, msg))?;

        let mut series = Vec::new();
        let mut seen: HashMap<Labels, usize> = HashMap::new();
        for (line_no, line) in lines {
            let (labels, progression) =
                parse_series_line(line).map_err(|msg| LoadError::parse(line_no, msg))?;
            if let Some(first) = seen.insert(labels.clone(), line_no) {
                return Err(LoadError::parse(
                    line_no,
                    format!("series {labels} already defined at line {first}"),
                ));
            }
            series.push(SeriesDescriptor {
                labels,
                progression,
                line: line_no,
            });
        }

        Ok(Self { step, series })
    }

    /// The step interval in milliseconds.
    pub fn step_millis(&self) -> Offset {
        Offset::try_from(self.step.as_millis()).unwrap_or(Offset::MAX)
    }
}

fn parse_load_command(line: &str) -> std::result::Result<Duration, String> {
    let rest = line
        .strip_prefix("load")
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .ok_or_else(|| format!("expected `load <duration>`, got {line:?}"))?;
    let mut parts = rest.split_whitespace();
    let duration = parts
        .next()
        .ok_or_else(|| "missing step duration after `load`".to_string())?;
    if let Some(extra) = parts.next() {
        return Err(format!("unexpected token {extra:?} after step duration"));
    }
    parse_duration(duration)
}

/// Parses a duration such as `10s`, `5m`, `1h30m` or `250ms`.
///
/// Units must appear in decreasing order and at most once. Zero durations
/// are rejected.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    const UNITS: [(&str, u64); 7] = [
        ("y", 365 * 24 * 60 * 60 * 1000),
        ("w", 7 * 24 * 60 * 60 * 1000),
        ("d", 24 * 60 * 60 * 1000),
        ("h", 60 * 60 * 1000),
        ("m", 60 * 1000),
        ("s", 1000),
        ("ms", 1),
    ];

    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total: u64 = 0;
    let mut next_rank = 0;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("invalid duration {input:?}: expected a number"));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration {input:?}: number too large"))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let rank = UNITS
            .iter()
            .position(|(name, _)| *name == unit)
            .ok_or_else(|| format!("invalid duration {input:?}: unknown unit {unit:?}"))?;
        if rank < next_rank {
            return Err(format!("invalid duration {input:?}: units out of order"));
        }
        next_rank = rank + 1;

        total = amount
            .checked_mul(UNITS[rank].1)
            .and_then(|ms| total.checked_add(ms))
            .ok_or_else(|| format!("invalid duration {input:?}: overflow"))?;
    }

    if total == 0 {
        return Err(format!("invalid duration {input:?}: must be positive"));
    }
    Ok(Duration::from_millis(total))
}

fn parse_series_line(line: &str) -> std::result::Result<(Labels, Progression), String> {
    let mut cursor = Cursor::new(line);
    let labels = parse_labels(&mut cursor)?;

    let rest = cursor.rest();
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return Err(format!("unexpected {rest:?} after label set"));
    }

    let mut tokens = rest.split_whitespace();
    let progression = tokens
        .next()
        .ok_or_else(|| format!("missing values for series {labels}"))?;
    if tokens.next().is_some() {
        return Err(format!(
            "multi-segment values are not supported: {:?}",
            rest.trim()
        ));
    }
    Ok((labels, parse_progression(progression)?))
}

/// Parses `<start>[+|-]<step>x<count>` or a bare `<number>`.
pub fn parse_progression(token: &str) -> std::result::Result<Progression, String> {
    let Some((head, count)) = token.rsplit_once('x') else {
        return Ok(Progression::constant(parse_number(token)?));
    };

    if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid repeat count in {token:?}"));
    }
    let count: u64 = count
        .parse()
        .map_err(|_| format!("repeat count too large in {token:?}"))?;

    let sign_at = head
        .char_indices()
        .skip(1)
        .find(|&(idx, c)| {
            (c == '+' || c == '-') && !matches!(head.as_bytes()[idx - 1], b'e' | b'E')
        })
        .map(|(idx, _)| idx)
        .ok_or_else(|| format!("missing `+<step>` or `-<step>` in {token:?}"))?;

    let start = parse_number(&head[..sign_at])?;
    let step_text = &head[sign_at + 1..];
    if step_text.starts_with(['+', '-']) {
        return Err(format!("invalid step in {token:?}"));
    }
    let step = parse_number(step_text)?;
    let step = if head.as_bytes()[sign_at] == b'-' { -step } else { step };

    Ok(Progression::new(start, step, count))
}

fn parse_number(text: &str) -> std::result::Result<f64, String> {
    text.parse::<f64>()
        .map_err(|_| format!("invalid number {text:?}"))
}

fn parse_labels(cursor: &mut Cursor<'_>) -> std::result::Result<Labels, String> {
    let mut labels = Labels::new();

    if cursor.peek().is_some_and(is_metric_name_start) {
        let name = cursor.take_while(is_metric_name_char);
        labels.set(METRIC_NAME, name);
    }

    if cursor.rest().trim_start().starts_with('{') {
        cursor.skip_whitespace();
    }
    if cursor.eat('{') {
        loop {
            cursor.skip_whitespace();
            if cursor.eat('}') {
                break;
            }

            if !cursor.peek().is_some_and(is_label_name_start) {
                return Err(format!("expected label name at {:?}", cursor.rest()));
            }
            let name = cursor.take_while(is_label_name_char);
            cursor.skip_whitespace();

            for op in ["!=", "=~", "!~"] {
                if cursor.rest().starts_with(op) {
                    return Err(format!(
                        "operator {op:?} is not allowed in a series definition"
                    ));
                }
            }
            if !cursor.eat('=') {
                return Err(format!("expected `=` after label {name:?}"));
            }
            cursor.skip_whitespace();
            let value = cursor.quoted_string()?;

            if labels.contains(name) {
                return Err(format!("label {name:?} assigned more than once"));
            }
            // Empty values are equivalent to an absent label.
            if !value.is_empty() {
                labels.set(name, value);
            }

            cursor.skip_whitespace();
            if cursor.eat(',') {
                continue;
            }
            if cursor.eat('}') {
                break;
            }
            return Err(format!("expected `,` or `}}` at {:?}", cursor.rest()));
        }
    }

    if labels.is_empty() {
        return Err("series must have a metric name or at least one label".to_string());
    }
    Ok(labels)
}

fn is_metric_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_metric_name_char(c: char) -> bool {
    is_metric_name_start(c) || c.is_ascii_digit()
}

fn is_label_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_label_name_char(c: char) -> bool {
    is_label_name_start(c) || c.is_ascii_digit()
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn quoted_string(&mut self) -> std::result::Result<String, String> {
        if !self.eat('"') {
            return Err(format!("expected quoted value at {:?}", self.rest()));
        }
        let mut value = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((idx, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += idx + 1;
                    return Ok(value);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, c @ ('"' | '\\'))) => value.push(c),
                    Some((_, other)) => return Err(format!("invalid escape `\\{other}`")),
                    None => break,
                },
                c => value.push(c),
            }
        }
        Err("unterminated quoted value".to_string())
    }
}
