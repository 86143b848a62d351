//! The load language and the incremental loader.
//!
//! - [`sequence`]: arithmetic progressions and their sample generator
//! - [`parser`]: load block parsing
//! - [`loader`]: the watermark-driven [`LazyLoader`]

pub mod loader;
pub mod parser;
pub mod sequence;

pub use loader::{LazyLoader, LazyLoaderConfig, Watermark, DEFAULT_ORIGIN};
pub use parser::{parse_duration, parse_progression, LoadBlock, SeriesDescriptor};
pub use sequence::{Offset, Progression, Samples};
