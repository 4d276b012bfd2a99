//! Storage-throughput benchmark jobs.

mod plots;
mod runner;
mod task;
mod types;

pub use plots::{BenchPlots, BenchSummary, Histogram, Plots, TargetOps};
pub use runner::{BenchProgressFn, BenchmarkRunner};
pub use task::{BenchmarkTask, HOST_PORT_RANGE};
pub use types::{
    BenchConfig, BenchOutput, BenchParams, BenchProgress, BenchResult, BenchTarget,
    BenchTargetError, TargetProgress, TargetSpec, TargetState,
};
