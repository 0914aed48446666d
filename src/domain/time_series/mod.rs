//! Time-series aggregate: tagging, deduplication, range filtering, smoothing,
//! stale continuation and multi-series alignment.

pub mod aligner;
pub mod processor;
pub mod value_objects;

pub use aligner::*;
pub use processor::*;
pub use value_objects::*;
