//! Cubic B-spline least-squares approximation with optional iterative
//! re-parameterisation.
//!
//! Given samples `Q_k` with parameters `t_k`, the fit pins the end control
//! points to the first and last sample and solves the normal equations
//! `(NᵀN) P = Nᵀ R` for the interior control points, where `N` holds the
//! cubic basis functions at every interior parameter and
//! `R_k = Q_k - N_0(t_k) Q_0 - N_h(t_k) Q_m`.
//!
//! The iterative method repeats: fit, project every sample onto the fit,
//! take the foot-point parameters, refit. A pass that raises the mean
//! residual is rejected and ends the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::basis::{
    approximation_knot_vector, averaging_knot_vector, basis_funs, check_interior_knots, find_span,
    solve_linear_system,
};
use super::core::{Point3, PointSet, Vec3};
use super::curve::BSplineCurve;
use super::diagnostics::FitDiagnostics;
use super::error::{FitError, FitResult};
use super::metrics::{FitMetrics, TimingBucket};
use super::options::ApproximatorOptions;
use super::param::{AssociationMethod, MIN_FIT_POINTS, one_shot_parameters};
use super::projection::{Residual, project_points};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Degree of every curve produced by the approximator.
pub const CUBIC: usize = 3;

/// Cooperative cancellation flag for long iterative fits.
///
/// Clones share the flag. The approximator checks it once per iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Fits clamped cubic B-splines to point sets.
#[derive(Debug, Clone, Default)]
pub struct CubicBSplineApproximator {
    options: ApproximatorOptions,
}

impl CubicBSplineApproximator {
    #[must_use]
    pub fn new(options: ApproximatorOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &ApproximatorOptions {
        &self.options
    }

    pub fn approximate(
        &self,
        points: &PointSet,
        method: AssociationMethod,
    ) -> FitResult<BSplineCurve> {
        self.run(points, method, None).map(|outcome| outcome.curve)
    }

    pub fn approximate_with_diagnostics(
        &self,
        points: &PointSet,
        method: AssociationMethod,
    ) -> FitResult<(BSplineCurve, FitDiagnostics)> {
        self.run(points, method, None)
            .map(|outcome| (outcome.curve, outcome.diagnostics))
    }

    /// Like [`approximate_with_diagnostics`](Self::approximate_with_diagnostics),
    /// failing with [`FitError::Cancelled`] once `cancel` is set.
    pub fn approximate_with_cancel(
        &self,
        points: &PointSet,
        method: AssociationMethod,
        cancel: &CancelToken,
    ) -> FitResult<(BSplineCurve, FitDiagnostics)> {
        self.run(points, method, Some(cancel))
            .map(|outcome| (outcome.curve, outcome.diagnostics))
    }

    /// Least-squares fit for caller-supplied parameters, one per sample.
    ///
    /// Parameters are rescaled to `[0, 1]` by their minimum and maximum.
    pub fn fit_with_parameters(&self, points: &PointSet, params: &[f64]) -> FitResult<BSplineCurve> {
        self.options.validate()?;
        check_point_count(points)?;
        if params.len() != points.len() {
            return Err(FitError::invalid(format!(
                "expected {} parameters, got {}",
                points.len(),
                params.len()
            )));
        }
        if params.iter().any(|t| !t.is_finite()) {
            return Err(FitError::invalid("parameters must be finite"));
        }
        let params = renormalize(params)
            .ok_or_else(|| FitError::degenerate("all parameters are equal"))?;

        let ctrl_count = self.options.ctrl_count_for(points.len());
        fit_least_squares(points, &params, ctrl_count, &mut FitMetrics::default())
    }

    fn run(
        &self,
        points: &PointSet,
        method: AssociationMethod,
        cancel: Option<&CancelToken>,
    ) -> FitResult<FitOutcome> {
        self.options.validate()?;
        check_point_count(points)?;

        let outcome = if method.is_iterative() {
            run_iterative(points, &self.options, cancel)?
        } else {
            check_cancel(cancel, 0)?;
            run_one_shot(points, method, &self.options)?
        };

        log::debug!("{method} fit: {}", outcome.diagnostics);
        Ok(outcome)
    }
}

/// Result of one approximation run.
pub(crate) struct FitOutcome {
    pub curve: BSplineCurve,
    pub params: Vec<f64>,
    pub diagnostics: FitDiagnostics,
}

fn check_point_count(points: &PointSet) -> FitResult<()> {
    if points.len() < MIN_FIT_POINTS {
        return Err(FitError::InsufficientData {
            provided: points.len(),
            required: MIN_FIT_POINTS,
        });
    }
    Ok(())
}

fn check_cancel(cancel: Option<&CancelToken>, iteration: usize) -> FitResult<()> {
    match cancel {
        Some(token) if token.is_cancelled() => {
            log::debug!("fit cancelled before iteration {iteration}");
            Err(FitError::Cancelled { iteration })
        }
        _ => Ok(()),
    }
}

fn run_one_shot(
    points: &PointSet,
    method: AssociationMethod,
    options: &ApproximatorOptions,
) -> FitResult<FitOutcome> {
    let mut metrics = FitMetrics::default();
    metrics.begin();

    let params = metrics.time(TimingBucket::Association, || {
        one_shot_parameters(points, method, options.ordering, options.tolerance)
    })?;
    let ctrl_count = options.ctrl_count_for(points.len());
    let curve = fit_least_squares(points, &params, ctrl_count, &mut metrics)?;
    let feet = metrics.time(TimingBucket::Projection, || {
        project_points(&curve, points.points(), &options.projection)
    });
    let residual = Residual::from_foot_points(&feet);

    let mut diagnostics = FitDiagnostics::new(points.len());
    diagnostics.ctrl_point_count = curve.control_points().len();
    diagnostics.residual = residual;
    diagnostics.residual_history = vec![residual.mean];
    diagnostics.converged = true;
    diagnostics.timing = metrics.end();

    Ok(FitOutcome {
        curve,
        params,
        diagnostics,
    })
}

/// The fit / project / re-associate loop.
pub(crate) fn run_iterative(
    points: &PointSet,
    options: &ApproximatorOptions,
    cancel: Option<&CancelToken>,
) -> FitResult<FitOutcome> {
    let mut metrics = FitMetrics::default();
    metrics.begin();
    let mut diagnostics = FitDiagnostics::new(points.len());

    check_cancel(cancel, 0)?;
    let mut params = metrics.time(TimingBucket::Association, || {
        one_shot_parameters(
            points,
            AssociationMethod::ChordLength,
            options.ordering,
            options.tolerance,
        )
    })?;
    let ctrl_count = options.ctrl_count_for(points.len());
    let mut curve = fit_least_squares(points, &params, ctrl_count, &mut metrics)?;
    let mut feet = metrics.time(TimingBucket::Projection, || {
        project_points(&curve, points.points(), &options.projection)
    });
    let mut residual = Residual::from_foot_points(&feet);
    diagnostics.residual_history.push(residual.mean);

    let mut converged = false;
    for iteration in 1..=options.max_iter {
        check_cancel(cancel, iteration)?;

        let foot_params: Vec<f64> = feet.iter().map(|f| f.parameter).collect();
        let Some(next_params) = renormalize(&foot_params) else {
            diagnostics.add_warning(format!(
                "iteration {iteration}: foot points collapsed to a single parameter"
            ));
            converged = true;
            break;
        };

        let candidate = match fit_least_squares(points, &next_params, ctrl_count, &mut metrics) {
            Ok(candidate) => candidate,
            Err(FitError::Fitting { reason }) => {
                log::warn!("iteration {iteration}: refit failed, keeping previous curve: {reason}");
                diagnostics.add_warning(format!("iteration {iteration}: refit failed: {reason}"));
                converged = true;
                break;
            }
            Err(err) => return Err(err),
        };
        let candidate_feet = metrics.time(TimingBucket::Projection, || {
            project_points(&candidate, points.points(), &options.projection)
        });
        let candidate_residual = Residual::from_foot_points(&candidate_feet);

        if candidate_residual.mean > residual.mean {
            log::warn!(
                "iteration {iteration}: residual rose from {:.6} to {:.6}, pass rejected",
                residual.mean,
                candidate_residual.mean
            );
            diagnostics.add_warning(format!(
                "iteration {iteration} rejected: residual {:.6} > {:.6}",
                candidate_residual.mean, residual.mean
            ));
            converged = true;
            break;
        }

        let improvement = residual.mean - candidate_residual.mean;
        curve = candidate;
        feet = candidate_feet;
        residual = candidate_residual;
        params = next_params;
        diagnostics.iterations = iteration;
        diagnostics.residual_history.push(residual.mean);
        log::debug!(
            "iteration {iteration}: mean residual {:.6} (improved by {improvement:.3e})",
            residual.mean
        );

        if improvement < options.res_delta_tld {
            converged = true;
            break;
        }
    }

    if !converged {
        diagnostics.add_warning(format!(
            "max_iter ({}) reached before the residual settled",
            options.max_iter
        ));
    }

    diagnostics.ctrl_point_count = curve.control_points().len();
    diagnostics.residual = residual;
    diagnostics.converged = converged;
    diagnostics.timing = metrics.end();

    Ok(FitOutcome {
        curve,
        params,
        diagnostics,
    })
}

/// Maps values linearly onto `[0, 1]`; `None` when they are all equal.
fn renormalize(values: &[f64]) -> Option<Vec<f64>> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = max - min;
    if !span.is_finite() || span <= 0.0 {
        return None;
    }
    Some(values.iter().map(|&v| ((v - min) / span).clamp(0.0, 1.0)).collect())
}

/// One least-squares solve with pinned endpoints.
///
/// `params` are in `[0, 1]` with index correspondence to `points`; pairs are
/// sorted by parameter before knot placement.
fn fit_least_squares(
    points: &PointSet,
    params: &[f64],
    ctrl_count: usize,
    metrics: &mut FitMetrics,
) -> FitResult<BSplineCurve> {
    let p = CUBIC;
    if ctrl_count <= p || ctrl_count > points.len() {
        return Err(FitError::fitting(format!(
            "cannot fit {ctrl_count} control points to {} samples",
            points.len()
        )));
    }

    let mut pairs: Vec<(f64, Point3)> = params
        .iter()
        .copied()
        .zip(points.iter().copied())
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let sorted_params: Vec<f64> = pairs.iter().map(|(t, _)| *t).collect();

    let knots = metrics.time(TimingBucket::Association, || {
        if ctrl_count == pairs.len() {
            averaging_knot_vector(&sorted_params, p)
        } else {
            approximation_knot_vector(&sorted_params, ctrl_count, p)
        }
    });
    check_interior_knots(&knots, p)?;

    let (first, last) = match (pairs.first(), pairs.last()) {
        (Some(first), Some(last)) => (first.1, last.1),
        _ => return Err(FitError::InsufficientData { provided: 0, required: MIN_FIT_POINTS }),
    };

    let (matrix, rhs) = metrics.time(TimingBucket::Assembly, || {
        assemble_normal_equations(&pairs, &knots, ctrl_count, first, last)
    });
    let interior = metrics.time(TimingBucket::Solve, || solve_linear_system(&matrix, &rhs))?;

    let mut control_points = Vec::with_capacity(ctrl_count);
    control_points.push(first);
    control_points.extend(interior.into_iter().map(Point3::from));
    control_points.push(last);

    BSplineCurve::new(p, control_points, knots, points.dims())
}

/// `(NᵀN, NᵀR)` over the interior samples for the interior control points.
fn assemble_normal_equations(
    pairs: &[(f64, Point3)],
    knots: &[f64],
    ctrl_count: usize,
    first: Point3,
    last: Point3,
) -> (Vec<Vec<f64>>, Vec<Vec3>) {
    let p = CUBIC;
    let n = ctrl_count - 1;
    let unknowns = ctrl_count - 2;
    let mut ntn = vec![vec![0.0; unknowns]; unknowns];
    let mut ntr = vec![Vec3::ZERO; unknowns];

    for &(t, q) in &pairs[1..pairs.len() - 1] {
        let span = find_span(n, p, t, knots);
        let funs = basis_funs(span, t, p, knots);

        let mut weight_first = 0.0;
        let mut weight_last = 0.0;
        let mut row: Vec<(usize, f64)> = Vec::with_capacity(p + 1);
        for (j, &value) in funs.iter().enumerate() {
            match span - p + j {
                0 => weight_first = value,
                idx if idx == n => weight_last = value,
                idx => row.push((idx - 1, value)),
            }
        }

        let r = q.to_vec3() - first.to_vec3() * weight_first - last.to_vec3() * weight_last;
        for &(a, va) in &row {
            ntr[a] = ntr[a] + r * va;
            for &(b, vb) in &row {
                ntn[a][b] += va * vb;
            }
        }
    }

    (ntn, ntr)
}

/// Fits `points` once per association method.
///
/// Methods run independently (in parallel with the `parallel` feature); the
/// result order follows [`AssociationMethod::ALL`].
#[cfg(feature = "parallel")]
#[must_use]
pub fn fit_all_methods(
    points: &PointSet,
    options: &ApproximatorOptions,
) -> Vec<(AssociationMethod, FitResult<(BSplineCurve, FitDiagnostics)>)> {
    let approximator = CubicBSplineApproximator::new(*options);
    AssociationMethod::ALL
        .par_iter()
        .map(|&method| (method, approximator.approximate_with_diagnostics(points, method)))
        .collect()
}

/// Fits `points` once per association method.
///
/// Methods run independently (in parallel with the `parallel` feature); the
/// result order follows [`AssociationMethod::ALL`].
#[cfg(not(feature = "parallel"))]
#[must_use]
pub fn fit_all_methods(
    points: &PointSet,
    options: &ApproximatorOptions,
) -> Vec<(AssociationMethod, FitResult<(BSplineCurve, FitDiagnostics)>)> {
    let approximator = CubicBSplineApproximator::new(*options);
    AssociationMethod::ALL
        .iter()
        .map(|&method| (method, approximator.approximate_with_diagnostics(points, method)))
        .collect()
}
