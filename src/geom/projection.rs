//! Closest-point (foot point) search on fitted curves and the residual it drives.
//!
//! B-splines have no closed-form closest point. The search samples the curve
//! as a polyline, projects onto the nearest segment, then refines the
//! parameter with a capped number of Newton steps on
//! `f(u) = (C(u) - Q) · C'(u)`, the derivative of half the squared distance.

use serde::Serialize;

use super::core::Point3;
use super::curve::{BSplineCurve, Curve3, parameters_by_count};
use super::options::ProjectionOptions;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Closest point on a curve to one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootPoint {
    pub parameter: f64,
    pub point: Point3,
    pub distance: f64,
}

/// Aggregate sample-to-curve distance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Residual {
    pub mean: f64,
    pub max: f64,
    pub rms: f64,
}

impl Residual {
    /// Aggregates a set of distances; an empty set yields zeros.
    #[must_use]
    pub fn from_distances(distances: &[f64]) -> Self {
        if distances.is_empty() {
            return Self::default();
        }
        let n = distances.len() as f64;
        let (sum, sum_sq, max) = distances
            .iter()
            .fold((0.0, 0.0, 0.0_f64), |(s, sq, m), &d| (s + d, sq + d * d, m.max(d)));
        Self {
            mean: sum / n,
            max,
            rms: (sum_sq / n).sqrt(),
        }
    }

    #[must_use]
    pub fn from_foot_points(feet: &[FootPoint]) -> Self {
        let distances: Vec<f64> = feet.iter().map(|f| f.distance).collect();
        Self::from_distances(&distances)
    }
}

/// Polyline approximation of a curve used to seed the Newton search.
struct CoarsePolyline {
    params: Vec<f64>,
    points: Vec<Point3>,
}

impl CoarsePolyline {
    fn new(curve: &BSplineCurve, options: &ProjectionOptions) -> Self {
        let count = options
            .coarse_samples
            .max(4 * curve.control_points().len())
            .max(2);
        let params = parameters_by_count(curve.domain(), count);
        let points = params.iter().map(|&u| curve.point_at(u)).collect();
        Self { params, points }
    }

    /// Parameter of the closest point on the polyline.
    fn closest_parameter(&self, q: Point3) -> f64 {
        let mut best_u = self.params[0];
        let mut best_d2 = f64::INFINITY;

        for i in 0..self.points.len() - 1 {
            let a = self.points[i];
            let ab = self.points[i + 1].sub_point(a);
            let len2 = ab.length_squared();
            let t = if len2 > 0.0 {
                (q.sub_point(a).dot(ab) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let d2 = a.add_vec(ab * t).distance_squared_to(q);
            if d2 < best_d2 {
                best_d2 = d2;
                best_u = self.params[i] + t * (self.params[i + 1] - self.params[i]);
            }
        }
        best_u
    }
}

fn refine(curve: &BSplineCurve, q: Point3, u0: f64, options: &ProjectionOptions) -> FootPoint {
    let (a, b) = curve.domain();
    let step_tol = options.tolerance.relative_to(b - a);

    let mut u = u0;
    for _ in 0..options.newton_iterations {
        let d = curve.derivatives_at(u, 2);
        let diff = d[0] - q.to_vec3();
        let f = diff.dot(d[1]);
        let df = d[1].dot(d[1]) + diff.dot(d[2]);
        if df.abs() <= f64::EPSILON || !df.is_finite() {
            break;
        }
        let next = (u - f / df).clamp(a, b);
        let step = (next - u).abs();
        u = next;
        if step <= step_tol {
            break;
        }
    }

    let seed = curve.point_at(u0);
    let refined = curve.point_at(u);
    let (parameter, point) = if refined.distance_squared_to(q) <= seed.distance_squared_to(q) {
        (u, refined)
    } else {
        (u0, seed)
    };
    FootPoint {
        parameter,
        point,
        distance: point.distance_to(q),
    }
}

/// Foot point of a single sample.
#[must_use]
pub fn project_point(curve: &BSplineCurve, q: Point3, options: &ProjectionOptions) -> FootPoint {
    let polyline = CoarsePolyline::new(curve, options);
    refine(curve, q, polyline.closest_parameter(q), options)
}

/// Foot points of all samples, in input order.
#[cfg(feature = "parallel")]
#[must_use]
pub fn project_points(
    curve: &BSplineCurve,
    points: &[Point3],
    options: &ProjectionOptions,
) -> Vec<FootPoint> {
    let polyline = CoarsePolyline::new(curve, options);
    points
        .par_iter()
        .map(|&q| refine(curve, q, polyline.closest_parameter(q), options))
        .collect()
}

/// Foot points of all samples, in input order.
#[cfg(not(feature = "parallel"))]
#[must_use]
pub fn project_points(
    curve: &BSplineCurve,
    points: &[Point3],
    options: &ProjectionOptions,
) -> Vec<FootPoint> {
    let polyline = CoarsePolyline::new(curve, options);
    points
        .iter()
        .map(|&q| refine(curve, q, polyline.closest_parameter(q), options))
        .collect()
}

/// Residual of `points` against `curve`.
#[must_use]
pub fn residual(curve: &BSplineCurve, points: &[Point3], options: &ProjectionOptions) -> Residual {
    Residual::from_foot_points(&project_points(curve, points, options))
}
