//! Deterministic bubble layout for per-sector stock panels.

pub mod bubble;

pub use bubble::*;
