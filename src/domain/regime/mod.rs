//! Regime and divergence classification over aggregated indicator groups.

pub mod classifier;
pub mod value_objects;

pub use classifier::*;
pub use value_objects::*;
