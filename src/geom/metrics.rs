//! Opt-in timing hooks for the fitting engine.
//!
//! Timing is only collected when the `fit_metrics` feature is enabled.
//! Otherwise every call compiles down to running the closure.
//!
//! ```ignore
//! use lanefit_engine::geom::{FitMetrics, TimingBucket};
//!
//! let mut metrics = FitMetrics::default();
//! metrics.begin();
//! let params = metrics.time(TimingBucket::Association, || chord_length(&points));
//! if let Some(report) = metrics.end() {
//!     println!("association: {} ns", report.association_ns);
//! }
//! ```

use serde::Serialize;

/// Phases of a fit that accumulate time separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Parameter association and knot placement.
    Association,
    /// Basis evaluation and normal-equation assembly.
    Assembly,
    /// Dense linear solve.
    Solve,
    /// Foot-point projection and residual evaluation.
    Projection,
    /// Output sampling.
    Sampling,
}

/// Cumulative nanoseconds per bucket.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FitTimingReport {
    pub association_ns: u64,
    pub assembly_ns: u64,
    pub solve_ns: u64,
    pub projection_ns: u64,
    pub sampling_ns: u64,
}

impl FitTimingReport {
    /// Returns the total time across all buckets in nanoseconds.
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.association_ns
            .saturating_add(self.assembly_ns)
            .saturating_add(self.solve_ns)
            .saturating_add(self.projection_ns)
            .saturating_add(self.sampling_ns)
    }

    /// Returns the total time in milliseconds (for display purposes).
    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }
}

/// Accumulator for timing fit phases.
///
/// Call [`begin`](Self::begin) to reset, wrap work with [`time`](Self::time),
/// and read the report with [`end`](Self::end). With `fit_metrics` disabled
/// `end` returns `None`.
#[derive(Debug, Default)]
pub struct FitMetrics {
    #[cfg(feature = "fit_metrics")]
    report: FitTimingReport,
}

impl FitMetrics {
    pub fn begin(&mut self) {
        #[cfg(feature = "fit_metrics")]
        {
            self.report = FitTimingReport::default();
        }
    }

    #[must_use]
    pub fn end(&self) -> Option<FitTimingReport> {
        #[cfg(feature = "fit_metrics")]
        {
            Some(self.report.clone())
        }
        #[cfg(not(feature = "fit_metrics"))]
        {
            None
        }
    }

    /// Times `f` and adds the elapsed time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(feature = "fit_metrics")]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
            self.add_to_bucket(bucket, nanos);
            result
        }

        #[cfg(not(feature = "fit_metrics"))]
        {
            let _ = bucket;
            f()
        }
    }

    #[cfg(feature = "fit_metrics")]
    fn add_to_bucket(&mut self, bucket: TimingBucket, nanos: u64) {
        let slot = match bucket {
            TimingBucket::Association => &mut self.report.association_ns,
            TimingBucket::Assembly => &mut self.report.assembly_ns,
            TimingBucket::Solve => &mut self.report.solve_ns,
            TimingBucket::Projection => &mut self.report.projection_ns,
            TimingBucket::Sampling => &mut self.report.sampling_ns,
        };
        *slot = slot.saturating_add(nanos);
    }
}
