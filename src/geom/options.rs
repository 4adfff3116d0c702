//! Per-call configuration for the approximators.
//!
//! All options are plain values with `Default`, `#[must_use]` builders and a
//! `validate()` that is called again by every fitting entry point, so
//! deserialised configurations are checked before use.

use serde::{Deserialize, Serialize};

use super::core::Tolerance;
use super::error::{FitError, FitResult};

/// Default iteration cap for iterative re-parameterisation.
pub const DEFAULT_MAX_ITER: usize = 20;

/// Default stop threshold on the mean-residual improvement between passes.
pub const DEFAULT_RES_DELTA_TLD: f64 = 5e-2;

/// How samples are ordered before chord-length style association.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointOrdering {
    /// Use the input order.
    #[default]
    AsGiven,
    /// Sort samples along the dominant covariance axis first.
    PrincipalAxis,
}

/// Foot-point search settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    /// Polyline samples used for the coarse closest-point search.
    /// Raised to at least `4 * ctrl_count` per curve.
    pub coarse_samples: usize,

    /// Newton refinement steps after the coarse search.
    pub newton_iterations: usize,

    /// Stop refining once the parameter step falls below this.
    pub tolerance: Tolerance,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            coarse_samples: 64,
            newton_iterations: 8,
            tolerance: Tolerance::PARAMETER,
        }
    }
}

impl ProjectionOptions {
    #[must_use]
    pub fn with_coarse_samples(mut self, coarse_samples: usize) -> Self {
        self.coarse_samples = coarse_samples;
        self
    }

    #[must_use]
    pub fn with_newton_iterations(mut self, newton_iterations: usize) -> Self {
        self.newton_iterations = newton_iterations;
        self
    }

    pub fn validate(&self) -> FitResult<()> {
        if self.coarse_samples < 2 {
            return Err(FitError::invalid(format!(
                "coarse_samples must be >= 2, got {}",
                self.coarse_samples
            )));
        }
        validate_tolerance("projection tolerance", self.tolerance)
    }
}

/// Options for [`CubicBSplineApproximator`](super::approx::CubicBSplineApproximator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproximatorOptions {
    /// Maximum re-parameterisation passes for the iterative method. Must be >= 1.
    pub max_iter: usize,

    /// The loop stops once a pass improves the mean residual by less than
    /// this (absolute, in input units). Must be > 0.
    pub res_delta_tld: f64,

    /// Control point count; `None` picks `clamp(n / 4, 4, 20)` capped at `n`.
    pub num_ctrl_points: Option<usize>,

    pub ordering: PointOrdering,

    pub projection: ProjectionOptions,

    /// Coincidence tolerance for input points, relative to their
    /// bounding-box diagonal.
    pub tolerance: Tolerance,
}

impl Default for ApproximatorOptions {
    fn default() -> Self {
        Self {
            max_iter: DEFAULT_MAX_ITER,
            res_delta_tld: DEFAULT_RES_DELTA_TLD,
            num_ctrl_points: None,
            ordering: PointOrdering::AsGiven,
            projection: ProjectionOptions::default(),
            tolerance: Tolerance::default_geom(),
        }
    }
}

impl ApproximatorOptions {
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    #[must_use]
    pub fn with_res_delta_tld(mut self, res_delta_tld: f64) -> Self {
        self.res_delta_tld = res_delta_tld;
        self
    }

    #[must_use]
    pub fn with_ctrl_points(mut self, num_ctrl_points: usize) -> Self {
        self.num_ctrl_points = Some(num_ctrl_points);
        self
    }

    #[must_use]
    pub fn with_ordering(mut self, ordering: PointOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    #[must_use]
    pub fn with_projection(mut self, projection: ProjectionOptions) -> Self {
        self.projection = projection;
        self
    }

    pub fn validate(&self) -> FitResult<()> {
        if self.max_iter == 0 {
            return Err(FitError::invalid("max_iter must be a positive integer"));
        }
        if !self.res_delta_tld.is_finite() || self.res_delta_tld <= 0.0 {
            return Err(FitError::invalid(format!(
                "res_delta_tld must be a positive finite number, got {}",
                self.res_delta_tld
            )));
        }
        if let Some(count) = self.num_ctrl_points {
            if count < 4 {
                return Err(FitError::invalid(format!(
                    "a cubic fit needs at least 4 control points, got {count}"
                )));
            }
        }
        self.projection.validate()?;
        validate_tolerance("tolerance", self.tolerance)
    }

    /// Control point count for `point_count` samples.
    #[must_use]
    pub fn ctrl_count_for(&self, point_count: usize) -> usize {
        self.num_ctrl_points
            .unwrap_or_else(|| (point_count / 4).clamp(4, 20))
            .min(point_count)
    }
}

/// Options for [`BSplineGridApproximator`](super::grid::BSplineGridApproximator).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridFitOptions {
    /// Control points laid over the parameter grid. Must be >= 2.
    pub resolution: usize,

    /// Weight of the second-difference penalty, relative to the data term.
    pub smoothing: f64,

    /// Output sample count; `None` returns one sample per input point.
    pub sample_count: Option<usize>,

    /// Principal-axis extent below this fraction of the bounding-box
    /// diagonal is degenerate.
    pub tolerance: Tolerance,
}

impl Default for GridFitOptions {
    fn default() -> Self {
        Self {
            resolution: 5,
            smoothing: 1e-4,
            sample_count: None,
            tolerance: Tolerance::default_geom(),
        }
    }
}

impl GridFitOptions {
    #[must_use]
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    #[must_use]
    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    #[must_use]
    pub fn with_sample_count(mut self, sample_count: usize) -> Self {
        self.sample_count = Some(sample_count);
        self
    }

    pub fn validate(&self) -> FitResult<()> {
        if self.resolution < 2 {
            return Err(FitError::invalid(format!(
                "grid resolution must be >= 2, got {}",
                self.resolution
            )));
        }
        if !self.smoothing.is_finite() || self.smoothing < 0.0 {
            return Err(FitError::invalid(format!(
                "smoothing must be finite and non-negative, got {}",
                self.smoothing
            )));
        }
        validate_tolerance("tolerance", self.tolerance)
    }
}

fn validate_tolerance(name: &str, tolerance: Tolerance) -> FitResult<()> {
    if tolerance.eps.is_finite() && tolerance.eps > 0.0 {
        Ok(())
    } else {
        Err(FitError::invalid(format!(
            "{name} must be positive and finite, got {}",
            tolerance.eps
        )))
    }
}
