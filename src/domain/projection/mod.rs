//! Uncertainty cones around multi-horizon projections.

pub mod cone;

pub use cone::*;
