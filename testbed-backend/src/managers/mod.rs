//! Per-kind front ends over the shared queue and store.

mod bench;
mod compliance;

pub use bench::{BenchManager, BenchRunDesc};
pub use compliance::ComplianceManager;
