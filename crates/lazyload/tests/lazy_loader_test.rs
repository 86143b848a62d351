//! Integration tests for incremental loading and the query facade.
//!
//! These tests drive the full path:
//! - load block → LazyLoader → MemSeriesStore
//! - advance_to at successive instants, including backwards and past the end
//! - Querier reads of what has been revealed so far

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use alopex_lazyload::{
    LazyLoader, LoadError, Labels, Matcher, MemSeriesStore, Result, Sample, Series, SeriesStore,
    TimeRange, Timestamp, Watermark, METRIC_NAME,
};

fn metric(name: &str) -> Labels {
    Labels::from_pairs([(METRIC_NAME, name)])
}

fn points(pairs: &[(i64, f64)]) -> Vec<Sample> {
    pairs.iter().copied().map(Sample::from).collect()
}

/// Reads one series through equality matchers, asserting exactly one match.
fn read_series<S: SeriesStore>(loader: &LazyLoader<S>, labels: &Labels) -> Vec<Sample> {
    let querier = loader.querier(i64::MIN, i64::MAX);
    let mut set = querier.select(false, &labels.to_matchers()).unwrap();
    let series = set.next().expect("series should be loaded");
    assert!(set.next().is_none(), "Expecting only 1 series");
    assert_eq!(series.labels(), labels);
    series.iter().collect_samples().unwrap()
}

// ============================================================================
// Sequential scenarios
// ============================================================================

struct Step {
    ts: Timestamp,
    series: Vec<(&'static str, Vec<Sample>)>,
    check_only_error: bool,
}

fn run_case(load: &str, steps: Vec<Step>) {
    let mut loader = LazyLoader::new(load).unwrap();

    for step in steps {
        loader.with_samples_till(step.ts, |loader, result| {
            result.unwrap();
            if step.check_only_error {
                return;
            }
            for (name, expected) in &step.series {
                assert_eq!(&read_series(loader, &metric(name)), expected, "{name}");
            }
        });
    }
}

/// Forward, backward, then forward again over a single series.
#[test]
fn test_single_series_forward_and_backward() {
    let first_five = points(&[
        (0, 1.0),
        (10_000, 2.0),
        (20_000, 3.0),
        (30_000, 4.0),
        (40_000, 5.0),
    ]);

    run_case(
        r#"
            load 10s
                metric1 1+1x10
        "#,
        vec![
            Step {
                ts: 40_000,
                series: vec![("metric1", first_five.clone())],
                check_only_error: false,
            },
            Step {
                ts: 10_000,
                series: vec![("metric1", first_five)],
                check_only_error: false,
            },
            Step {
                ts: 60_000,
                series: vec![(
                    "metric1",
                    points(&[
                        (0, 1.0),
                        (10_000, 2.0),
                        (20_000, 3.0),
                        (30_000, 4.0),
                        (40_000, 5.0),
                        (50_000, 6.0),
                        (60_000, 7.0),
                    ]),
                )],
                check_only_error: false,
            },
        ],
    );
}

/// One series runs out before the target, the other keeps going, and a
/// target far past every series' end still succeeds.
#[test]
fn test_series_exhausted_before_target() {
    run_case(
        r#"
            load 10s
                metric1 1+0x5
                metric2 1+1x100
        "#,
        vec![
            Step {
                ts: 70_000,
                series: vec![
                    (
                        "metric1",
                        points(&[
                            (0, 1.0),
                            (10_000, 1.0),
                            (20_000, 1.0),
                            (30_000, 1.0),
                            (40_000, 1.0),
                            (50_000, 1.0),
                        ]),
                    ),
                    (
                        "metric2",
                        points(&[
                            (0, 1.0),
                            (10_000, 2.0),
                            (20_000, 3.0),
                            (30_000, 4.0),
                            (40_000, 5.0),
                            (50_000, 6.0),
                            (60_000, 7.0),
                            (70_000, 8.0),
                        ]),
                    ),
                ],
                check_only_error: false,
            },
            Step {
                ts: 300_000,
                series: vec![],
                check_only_error: true,
            },
        ],
    );
}

#[test]
fn test_past_end_loads_remaining_samples() {
    let mut loader = LazyLoader::new("load 10s\n metric1 1+0x5\n metric2 1+1x100").unwrap();
    loader.advance_to(70_000).unwrap();
    loader.advance_to(300_000).unwrap();

    assert_eq!(read_series(&loader, &metric("metric1")).len(), 6);
    let metric2 = read_series(&loader, &metric("metric2"));
    assert_eq!(metric2.len(), 31);
    assert_eq!(metric2.last(), Some(&Sample::new(300_000, 31.0)));
    assert_eq!(loader.watermark(), Watermark::Through(300_000));
}

#[test]
fn test_repeated_target_is_idempotent() {
    let mut loader = LazyLoader::new("load 10s\n m 1+1x10").unwrap();

    loader.advance_to(35_000).unwrap();
    let once = read_series(&loader, &metric("m"));
    loader.advance_to(35_000).unwrap();
    let twice = read_series(&loader, &metric("m"));

    assert_eq!(once, twice);
    assert_eq!(loader.store().point_count(), 4);
}

#[test]
fn test_target_between_steps() {
    let mut loader = LazyLoader::new("load 1m\n m 0+1x10").unwrap();

    loader.advance_to(59_999).unwrap();
    assert_eq!(read_series(&loader, &metric("m")), points(&[(0, 0.0)]));

    loader.advance_to(60_000).unwrap();
    assert_eq!(
        read_series(&loader, &metric("m")),
        points(&[(0, 0.0), (60_000, 1.0)])
    );
}

#[test]
fn test_negative_progression_and_labels() {
    let mut loader = LazyLoader::new(
        r#"
            load 5s
                http_requests{job="api", code="500"} 10-2.5x4
                http_requests{job="api", code="200"} 0+100x4
        "#,
    )
    .unwrap();
    loader.advance_to(20_000).unwrap();

    let errors = Labels::from_pairs([
        (METRIC_NAME, "http_requests"),
        ("job", "api"),
        ("code", "500"),
    ]);
    assert_eq!(
        read_series(&loader, &errors),
        points(&[
            (0, 10.0),
            (5_000, 7.5),
            (10_000, 5.0),
            (15_000, 2.5),
            (20_000, 0.0)
        ])
    );

    let querier = loader.querier(i64::MIN, i64::MAX);
    let all = querier
        .select(true, &[Matcher::equal(METRIC_NAME, "http_requests")])
        .unwrap();
    let codes: Vec<String> = all
        .map(|s| s.labels().get("code").unwrap_or_default().to_string())
        .collect();
    assert_eq!(codes, vec!["200", "500"]);
}

#[test]
fn test_parse_failure_prevents_construction() {
    let err = LazyLoader::new("load 10s\n metric1 1+1x10\n metric1 2").unwrap_err();
    assert!(matches!(err, LoadError::Parse { line: 3, .. }), "{err}");

    let err = LazyLoader::new("load 10q\n metric1 1").unwrap_err();
    assert!(matches!(err, LoadError::Parse { line: 1, .. }), "{err}");
}

// ============================================================================
// Query facade
// ============================================================================

#[test]
fn test_query_window_wider_than_watermark() {
    let mut loader = LazyLoader::new("load 10s\n m 1+1x10").unwrap();
    loader.advance_to(20_000).unwrap();

    let querier = loader.querier(0, 1_000_000);
    let series = querier.series_for(&metric("m")).unwrap().unwrap();
    assert_eq!(series.len(), 3);
}

#[test]
fn test_query_window_narrower_than_data() {
    let mut loader = LazyLoader::new("load 10s\n m 1+1x10").unwrap();
    loader.advance_to(100_000).unwrap();

    let querier = loader.querier(25_000, 45_000);
    let series = querier.series_for(&metric("m")).unwrap().unwrap();
    assert_eq!(
        series.iter().collect_samples().unwrap(),
        points(&[(30_000, 4.0), (40_000, 5.0)])
    );
}

#[test]
fn test_snapshot_unchanged_by_later_loading() {
    let mut loader = LazyLoader::new("load 10s\n m 1+1x10").unwrap();
    loader.advance_to(10_000).unwrap();

    let snapshot = loader
        .querier(i64::MIN, i64::MAX)
        .series_for(&metric("m"))
        .unwrap()
        .unwrap();
    loader.advance_to(50_000).unwrap();

    assert_eq!(snapshot.iter().count(), 2);
    assert_eq!(read_series(&loader, &metric("m")).len(), 6);
}

#[test]
fn test_unloaded_series_is_absent() {
    let loader = LazyLoader::new("load 10s\n m 1+1x10").unwrap();
    let querier = loader.querier(i64::MIN, i64::MAX);

    assert!(querier.series_for(&metric("m")).unwrap().is_none());
    assert!(querier.label_names().unwrap().is_empty());
}

// ============================================================================
// Failure and retry
// ============================================================================

/// Wraps a MemSeriesStore and rejects appends once a shared budget is used up.
struct FlakyStore {
    inner: MemSeriesStore,
    budget: Rc<Cell<usize>>,
    appended: Vec<(Labels, Timestamp)>,
}

impl FlakyStore {
    fn new(budget: usize) -> (Self, Rc<Cell<usize>>) {
        let budget = Rc::new(Cell::new(budget));
        let store = Self {
            inner: MemSeriesStore::new(),
            budget: Rc::clone(&budget),
            appended: Vec::new(),
        };
        (store, budget)
    }
}

impl SeriesStore for FlakyStore {
    fn append(&mut self, labels: &Labels, timestamp: Timestamp, value: f64) -> Result<()> {
        let remaining = self.budget.get();
        if remaining == 0 {
            return Err(LoadError::SeriesLimitExceeded { limit: 0 });
        }
        self.budget.set(remaining - 1);
        self.inner.append(labels, timestamp, value)?;
        self.appended.push((labels.clone(), timestamp));
        Ok(())
    }

    fn select(&self, range: TimeRange, matchers: &[Matcher]) -> Result<Vec<Series>> {
        self.inner.select(range, matchers)
    }
}

const THREE_SERIES: &str = "load 10s\n a 1+1x10\n b 100+1x10\n c 0+0x10";

#[test]
fn test_append_failure_holds_watermark() {
    // a gets 0..=40s (5 samples), b gets 2 samples, then the store fails.
    let (store, _budget) = FlakyStore::new(7);
    let mut loader = LazyLoader::with_store(THREE_SERIES, 0, store).unwrap();

    let err = loader.with_samples_till(40_000, |_, result| result.unwrap_err());
    match &err {
        LoadError::AppendFailed {
            series, timestamp, ..
        } => {
            assert_eq!(series, "b");
            assert_eq!(*timestamp, 20_000);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_retryable());
    assert_eq!(loader.watermark(), Watermark::BeforeFirstSample);

    // Data appended before the failure stays visible.
    assert_eq!(read_series(&loader, &metric("a")).len(), 5);
    assert_eq!(read_series(&loader, &metric("b")).len(), 2);
    assert!(loader
        .querier(i64::MIN, i64::MAX)
        .series_for(&metric("c"))
        .unwrap()
        .is_none());

    // Still failing: the same sample is retried and rejected again.
    let err = loader.with_samples_till(40_000, |_, result| result.unwrap_err());
    assert!(matches!(err, LoadError::AppendFailed { timestamp: 20_000, .. }));
    assert_eq!(loader.watermark(), Watermark::BeforeFirstSample);
    assert_eq!(loader.store().appended.len(), 7);
}

#[test]
fn test_retry_never_duplicates_offsets() {
    let (store, budget) = FlakyStore::new(7);
    let mut loader = LazyLoader::with_store(THREE_SERIES, 0, store).unwrap();

    assert!(loader.advance_to(40_000).is_err());

    // Open the store back up and retry the same target.
    budget.set(1_000);
    loader.with_samples_till(40_000, |_, result| result.unwrap());
    assert_eq!(loader.watermark(), Watermark::Through(40_000));

    for name in ["a", "b", "c"] {
        assert_eq!(read_series(&loader, &metric(name)).len(), 5, "{name}");
    }

    let mut seen = HashSet::new();
    for (labels, ts) in &loader.store().appended {
        assert!(seen.insert((labels.clone(), *ts)), "{labels} appended twice at {ts}");
    }
    assert_eq!(loader.store().appended.len(), 15);

    loader.advance_to(100_000).unwrap();
    assert_eq!(loader.store().appended.len(), 33);
}

// ============================================================================
// Read errors
// ============================================================================

/// A store whose reads fail after the first sample of every series.
struct CorruptStore(MemSeriesStore);

impl SeriesStore for CorruptStore {
    fn append(&mut self, labels: &Labels, timestamp: Timestamp, value: f64) -> Result<()> {
        self.0.append(labels, timestamp, value)
    }

    fn select(&self, range: TimeRange, matchers: &[Matcher]) -> Result<Vec<Series>> {
        Ok(self
            .0
            .select(range, matchers)?
            .into_iter()
            .map(|s| {
                let head: Vec<Sample> = s.iter().take(1).collect();
                Series::with_read_error(s.labels().clone(), head, "chunk checksum mismatch")
            })
            .collect())
    }
}

#[test]
fn test_read_error_surfaces_through_iterator() {
    let mut loader =
        LazyLoader::with_store("load 10s\n m 1+1x10", 0, CorruptStore(MemSeriesStore::new()))
            .unwrap();
    loader.advance_to(30_000).unwrap();

    let series = loader
        .querier(i64::MIN, i64::MAX)
        .series_for(&metric("m"))
        .unwrap()
        .unwrap();

    let mut it = series.iter();
    assert_eq!(it.next(), Some(Sample::new(0, 1.0)));
    assert_eq!(it.next(), None);
    assert!(matches!(it.err(), Some(LoadError::Read(_))));

    let err = series.iter().collect_samples().unwrap_err();
    assert!(err.to_string().contains("chunk checksum mismatch"));
}
