//! Graph storage layer
//!
//! Provides the per-rank DCSR edge slice and optional Parquet persistence of
//! that slice.

pub mod csr;
#[cfg(feature = "storage")]
pub mod parquet;

pub use csr::LocalGraph;
