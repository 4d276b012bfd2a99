//! Latency histograms derived from raw benchmark samples.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use testbed_cache::{CacheError, Materializer, Views};
use testbed_job_queue::JobProgress;
use uuid::Uuid;

use crate::bench::types::{BenchConfig, BenchProgress, BenchResult, BenchTargetError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub op: String,
    /// Per-operation latencies in milliseconds, in sample order.
    pub data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct Sample {
    #[serde(default)]
    op: Option<String>,
    #[serde(default)]
    duration_ms: Option<f64>,
    #[serde(default)]
    duration_ns: Option<f64>,
}

impl Sample {
    fn latency_ms(&self) -> Option<f64> {
        self.duration_ms.or(self.duration_ns.map(|ns| ns * 1e-6))
    }
}

/// Operations and per-operation histograms for one target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plots {
    ops: Vec<String>,
    histograms: BTreeMap<String, Histogram>,
}

impl Plots {
    /// Parse a JSON array of operation records.
    ///
    /// Records without an `op` or a duration are ignored. Operations keep the
    /// order of their first appearance.
    pub fn from_samples(raw: &str) -> Result<Self, serde_json::Error> {
        let samples: Vec<Sample> = serde_json::from_str(raw)?;
        let mut plots = Self::default();
        for sample in &samples {
            let (Some(op), Some(latency)) = (sample.op.as_ref(), sample.latency_ms()) else {
                continue;
            };
            plots
                .histograms
                .entry(op.clone())
                .or_insert_with(|| {
                    plots.ops.push(op.clone());
                    Histogram {
                        op: op.clone(),
                        data: Vec::new(),
                    }
                })
                .data
                .push(latency);
        }
        Ok(plots)
    }

    pub fn ops(&self) -> &[String] {
        &self.ops
    }

    pub fn histogram(&self, op: &str) -> Option<&Histogram> {
        self.histograms.get(op)
    }

    pub fn histograms(&self) -> &BTreeMap<String, Histogram> {
        &self.histograms
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOps {
    pub name: String,
    pub ops: Vec<String>,
}

/// Permanent, lightweight description of a benchmark result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchSummary {
    pub uuid: Uuid,
    pub is_error: bool,
    pub error: Option<String>,
    pub errors: Vec<BenchTargetError>,
    pub progress: JobProgress<BenchProgress>,
    pub config: BenchConfig,
    pub ops: Vec<TargetOps>,
}

/// Builds [`Plots`] for every target of a persisted [`BenchResult`].
#[derive(Debug, Clone)]
pub struct BenchPlots {
    namespace: String,
}

impl BenchPlots {
    /// `namespace` is where benchmark results are persisted, keyed by uuid.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl Materializer for BenchPlots {
    type Raw = BenchResult;
    type View = Plots;
    type Summary = BenchSummary;

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn uuid(&self, raw: &BenchResult) -> Uuid {
        raw.uuid
    }

    fn materialize(&self, raw: &BenchResult) -> Result<Views<Plots>, CacheError> {
        let mut views = Views::new();
        for (target, samples) in &raw.results {
            match Plots::from_samples(samples) {
                Ok(plots) => {
                    views.insert(target.clone(), plots);
                }
                Err(e) => {
                    tracing::warn!(
                        uuid = %raw.uuid,
                        target = %target,
                        error = %e,
                        "skipping unparsable samples"
                    );
                }
            }
        }
        Ok(views)
    }

    fn summarize(&self, raw: &BenchResult, views: &Views<Plots>) -> BenchSummary {
        BenchSummary {
            uuid: raw.uuid,
            is_error: raw.is_error,
            error: raw.error.clone(),
            errors: raw.errors.clone(),
            progress: raw.progress.clone(),
            config: raw.config.clone(),
            ops: views
                .iter()
                .map(|(name, plots)| TargetOps {
                    name: name.clone(),
                    ops: plots.ops().to_vec(),
                })
                .collect(),
        }
    }
}
