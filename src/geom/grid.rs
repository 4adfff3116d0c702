//! One-shot global B-spline approximation on a regular control grid.
//!
//! Samples are parameterised by their position along the principal axis of
//! the set, scaled over its extent. `resolution` control points sit on a
//! uniform clamped knot grid over that range and are found with a single
//! penalised least-squares solve:
//!
//! `(NᵀN + λ DᵀD) P = NᵀQ`
//!
//! where `D` takes second differences of neighbouring control points,
//! divided over their Greville abscissae so straight lines carry no penalty,
//! and `λ = smoothing * trace(NᵀN) / resolution`. No foot-point search and no
//! re-association loop.

use serde::Serialize;

use super::basis::{basis_funs, find_span, solve_linear_system, uniform_knot_vector};
use super::core::{BBox, Point3, PointSet, Vec3};
use super::curve::{BSplineCurve, Curve3};
use super::error::{FitError, FitResult};
use super::metrics::{FitMetrics, FitTimingReport, TimingBucket};
use super::options::GridFitOptions;
use super::param::principal_projections;
use super::projection::Residual;

/// Output of [`BSplineGridApproximator::fit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridFit {
    pub curve: BSplineCurve,
    /// Grid parameter of every input sample, in input order.
    pub parameters: Vec<f64>,
    /// Curve evaluated at each sample's parameter, in input order.
    pub fitted: PointSet,
    /// Distance between each sample and its fitted point.
    pub residual: Residual,
    pub timing: Option<FitTimingReport>,
}

#[derive(Debug, Clone, Default)]
pub struct BSplineGridApproximator {
    options: GridFitOptions,
}

impl BSplineGridApproximator {
    #[must_use]
    pub fn new(options: GridFitOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &GridFitOptions {
        &self.options
    }

    /// Fits with `resolution` control points and returns the sampled curve:
    /// `sample_count` points, or one per input point when unset.
    pub fn global_optimize(&self, points: &PointSet, resolution: usize) -> FitResult<PointSet> {
        let grid = self.fit_with_resolution(points, resolution)?;
        let count = self.options.sample_count.unwrap_or(points.len());
        Ok(grid.curve.get_points_final(count))
    }

    /// Fits with the configured resolution.
    pub fn fit(&self, points: &PointSet) -> FitResult<GridFit> {
        self.fit_with_resolution(points, self.options.resolution)
    }

    fn fit_with_resolution(&self, points: &PointSet, resolution: usize) -> FitResult<GridFit> {
        if resolution < 2 {
            return Err(FitError::invalid(format!(
                "grid resolution must be >= 2, got {resolution}"
            )));
        }
        let options = self.options.with_resolution(resolution);
        options.validate()?;

        if points.len() < 2 {
            return Err(FitError::InsufficientData {
                provided: points.len(),
                required: 2,
            });
        }

        let mut metrics = FitMetrics::default();
        metrics.begin();

        let parameters = metrics.time(TimingBucket::Association, || {
            grid_parameters(points.points(), &options)
        })?;

        let degree = resolution.saturating_sub(1).min(3);
        let knots = uniform_knot_vector(resolution, degree);

        let (matrix, rhs) = metrics.time(TimingBucket::Assembly, || {
            assemble_penalised_system(points.points(), &parameters, &knots, degree, &options)
        });
        let solution = metrics.time(TimingBucket::Solve, || solve_linear_system(&matrix, &rhs))?;
        let control_points: Vec<Point3> = solution.into_iter().map(Point3::from).collect();
        let curve = BSplineCurve::new(degree, control_points, knots, points.dims())?;

        let fitted_points: Vec<Point3> = metrics.time(TimingBucket::Sampling, || {
            parameters.iter().map(|&u| curve.point_at(u)).collect()
        });
        let distances: Vec<f64> = fitted_points
            .iter()
            .zip(points.iter())
            .map(|(f, q)| f.distance_to(*q))
            .collect();
        let residual = Residual::from_distances(&distances);

        log::debug!(
            "grid fit: {} points, resolution {resolution}, degree {degree}, residual mean {:.6} max {:.6}",
            points.len(),
            residual.mean,
            residual.max
        );

        Ok(GridFit {
            fitted: PointSet::from_trusted(fitted_points, points.dims()),
            curve,
            parameters,
            residual,
            timing: metrics.end(),
        })
    }
}

/// Principal-axis position of every sample scaled onto `[0, 1]`, oriented so
/// the first sample does not come after the last.
fn grid_parameters(points: &[Point3], options: &GridFitOptions) -> FitResult<Vec<f64>> {
    let mut s = principal_projections(points);
    let (min, max) = s
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let extent = max - min;
    let diagonal = BBox::from_points(points).map_or(0.0, BBox::diagonal);
    if !extent.is_finite() || extent <= options.tolerance.relative_to(diagonal) {
        return Err(FitError::degenerate(
            "points have zero extent along their principal axis",
        ));
    }

    let flip = matches!((s.first(), s.last()), (Some(a), Some(b)) if a > b);
    for v in &mut s {
        let u = (*v - min) / extent;
        *v = if flip { 1.0 - u } else { u };
    }
    Ok(s)
}

fn assemble_penalised_system(
    points: &[Point3],
    parameters: &[f64],
    knots: &[f64],
    degree: usize,
    options: &GridFitOptions,
) -> (Vec<Vec<f64>>, Vec<Vec3>) {
    let n_ctrl = options.resolution;
    let mut matrix = vec![vec![0.0; n_ctrl]; n_ctrl];
    let mut rhs = vec![Vec3::ZERO; n_ctrl];

    for (&u, q) in parameters.iter().zip(points) {
        let span = find_span(n_ctrl - 1, degree, u, knots);
        let funs = basis_funs(span, u, degree, knots);
        let first = span - degree;
        for (a, &va) in funs.iter().enumerate() {
            rhs[first + a] = rhs[first + a] + q.to_vec3() * va;
            for (b, &vb) in funs.iter().enumerate() {
                matrix[first + a][first + b] += va * vb;
            }
        }
    }

    let trace: f64 = (0..n_ctrl).map(|i| matrix[i][i]).sum();
    let lambda = options.smoothing * trace / n_ctrl as f64;
    if lambda > 0.0 && n_ctrl > 2 {
        let xi = greville_abscissae(knots, degree, n_ctrl);
        let mean_spacing = 1.0 / (n_ctrl - 1) as f64;
        for row in 0..n_ctrl - 2 {
            let h0 = xi[row + 1] - xi[row];
            let h1 = xi[row + 2] - xi[row + 1];
            let stencil = [
                mean_spacing / h0,
                -mean_spacing * (1.0 / h0 + 1.0 / h1),
                mean_spacing / h1,
            ];
            for (a, &da) in stencil.iter().enumerate() {
                for (b, &db) in stencil.iter().enumerate() {
                    matrix[row + a][row + b] += lambda * da * db;
                }
            }
        }
    }

    (matrix, rhs)
}

/// Knot averages `(u_{i+1} + ... + u_{i+p}) / p`, strictly increasing on a
/// clamped uniform knot vector.
fn greville_abscissae(knots: &[f64], degree: usize, n_ctrl: usize) -> Vec<f64> {
    (0..n_ctrl)
        .map(|i| knots[i + 1..=i + degree].iter().sum::<f64>() / degree as f64)
        .collect()
}
