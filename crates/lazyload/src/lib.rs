//! Alopex LazyLoad - incremental test data for the time series query engine.
//!
//! This crate materializes synthetic series into a backing store a little at
//! a time, so query behaviour can be asserted at any point during ingestion.
//!
//! # Components
//!
//! - [`LoadBlock`]: parses the `load <step>` mini-language
//! - [`Progression`]: arithmetic value rules and their sample generator
//! - [`LazyLoader`]: reveals samples up to a caller-chosen instant
//! - [`Querier`]: matcher-driven, time-bounded reads over the store
//! - [`MemSeriesStore`]: the default in-memory, append-only store
//!
//! # Example
//!
//! ```rust,ignore
//! use alopex_lazyload::{LazyLoader, Labels, METRIC_NAME};
//!
//! let mut loader = LazyLoader::new(
//!     r#"
//!     load 10s
//!         metric1 1+0x5
//!         metric2 1+1x100
//!     "#,
//! )?;
//!
//! // Reveal everything up to t=70s.
//! loader.advance_to(70_000)?;
//!
//! let querier = loader.querier(i64::MIN, i64::MAX);
//! let metric1 = querier
//!     .series_for(&Labels::from_pairs([(METRIC_NAME, "metric1")]))?
//!     .expect("metric1 is loaded");
//! assert_eq!(metric1.len(), 6);
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod labels;
pub mod load;
pub mod query;
pub mod storage;

pub use error::{LoadError, Result};
pub use labels::{Label, Labels, MatchKind, Matcher, METRIC_NAME};
pub use load::{
    LazyLoader, LazyLoaderConfig, LoadBlock, Offset, Progression, SeriesDescriptor, Watermark,
};
pub use query::{Querier, Queryable, SeriesSet};
pub use storage::{
    MemSeriesStore, MemStoreConfig, Sample, Series, SeriesIterator, SeriesStore, TimeRange,
    Timestamp,
};
