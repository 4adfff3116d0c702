use serde::Serialize;

use super::basis::{ders_basis_funs, find_span, is_non_decreasing};
use super::core::{Point3, PointSet, Vec3};
use super::error::{FitError, FitResult};

/// A parametric curve over a closed domain.
pub trait Curve3 {
    fn point_at(&self, t: f64) -> Point3;

    #[must_use]
    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }
}

/// `count` parameters evenly spaced over `domain`, first and last exactly on
/// the domain ends.
#[must_use]
pub fn parameters_by_count(domain: (f64, f64), count: usize) -> Vec<f64> {
    let (a, b) = domain;
    match count {
        0 => Vec::new(),
        1 => vec![a],
        _ => {
            let last = count - 1;
            (0..count)
                .map(|i| {
                    if i == last {
                        b
                    } else {
                        a + (b - a) * (i as f64 / last as f64)
                    }
                })
                .collect()
        }
    }
}

/// Samples `count` points evenly spaced in parameter space.
#[must_use]
pub fn sample_curve_uniform(curve: &impl Curve3, count: usize) -> Vec<Point3> {
    parameters_by_count(curve.domain(), count)
        .into_iter()
        .map(|t| curve.point_at(t))
        .collect()
}

/// Non-rational clamped B-spline curve.
///
/// Immutable once built: the approximators produce a fresh curve per fit.
/// `dims` is the dimensionality of the samples the curve was fitted to and
/// sets the width of sampled output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BSplineCurve {
    degree: usize,
    knots: Vec<f64>,
    control_points: Vec<Point3>,
    dims: usize,
}

impl BSplineCurve {
    pub fn new(
        degree: usize,
        control_points: Vec<Point3>,
        knots: Vec<f64>,
        dims: usize,
    ) -> FitResult<Self> {
        if dims != 2 && dims != 3 {
            return Err(FitError::invalid(format!(
                "curve dimensionality must be 2 or 3, got {dims}"
            )));
        }
        if degree == 0 {
            return Err(FitError::invalid("b-spline degree must be >= 1"));
        }
        if control_points.len() <= degree {
            return Err(FitError::InsufficientData {
                provided: control_points.len(),
                required: degree + 1,
            });
        }

        let expected_knot_len = control_points.len() + degree + 1;
        if knots.len() != expected_knot_len {
            return Err(FitError::invalid(format!(
                "b-spline knot length must be {}, got {}",
                expected_knot_len,
                knots.len()
            )));
        }
        if knots.iter().any(|k| !k.is_finite()) || !is_non_decreasing(&knots) {
            return Err(FitError::invalid(
                "b-spline knots must be finite and non-decreasing",
            ));
        }
        if knots[degree] >= knots[control_points.len()] {
            return Err(FitError::invalid("b-spline knot domain is empty"));
        }
        if control_points.iter().any(|p| !p.is_finite()) {
            return Err(FitError::invalid(
                "b-spline control points must be finite",
            ));
        }

        Ok(Self {
            degree,
            knots,
            control_points,
            dims,
        })
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        self.degree
    }

    #[must_use]
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    #[must_use]
    pub fn control_points(&self) -> &[Point3] {
        &self.control_points
    }

    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Whether the first and last `degree + 1` knots coincide.
    #[must_use]
    pub fn is_clamped(&self) -> bool {
        let p = self.degree;
        let head = &self.knots[..=p];
        let tail = &self.knots[self.knots.len() - p - 1..];
        head.iter().all(|k| *k == head[0]) && tail.iter().all(|k| *k == tail[0])
    }

    /// Position and derivatives up to order `order` at `u` (clamped to the domain).
    ///
    /// Entry 0 is the position as a vector; orders above the degree are zero.
    #[must_use]
    pub fn derivatives_at(&self, u: f64, order: usize) -> Vec<Vec3> {
        let p = self.degree;
        let (a, b) = self.domain();
        let u = u.clamp(a, b);
        let n = self.control_points.len() - 1;
        let span = find_span(n, p, u, &self.knots);
        let ders = ders_basis_funs(span, u, p, order, &self.knots);

        let mut result = vec![Vec3::ZERO; order + 1];
        for (k, row) in ders.iter().enumerate() {
            result[k] = row.iter().enumerate().fold(Vec3::ZERO, |acc, (j, &nj)| {
                acc + self.control_points[span - p + j].to_vec3() * nj
            });
        }
        result
    }

    /// `num` samples evenly spaced over the parameter domain, ordered from
    /// the curve start to its end.
    ///
    /// Each call samples independently; `num == 1` yields the start point and
    /// `num == 0` an empty set.
    #[must_use]
    pub fn get_points_final(&self, num: usize) -> PointSet {
        PointSet::from_trusted(sample_curve_uniform(self, num), self.dims)
    }
}

impl Curve3 for BSplineCurve {
    fn point_at(&self, t: f64) -> Point3 {
        let p = self.degree;
        let (a, b) = self.domain();
        let u = t.clamp(a, b);

        let n = self.control_points.len() - 1;
        let span = find_span(n, p, u, &self.knots);

        let mut d: Vec<Point3> = (0..=p).map(|j| self.control_points[span - p + j]).collect();
        de_boor(&mut d, span, p, u, &self.knots);
        d[p]
    }

    fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.control_points.len()])
    }
}

fn de_boor(d: &mut [Point3], span: usize, p: usize, u: f64, knots: &[f64]) {
    for r in 1..=p {
        for j in (r..=p).rev() {
            let i = span - p + j;
            let denom = knots[i + p + 1 - r] - knots[i];
            let alpha = if denom == 0.0 { 0.0 } else { (u - knots[i]) / denom };
            d[j] = lerp_exact(d[j - 1], d[j], alpha);
        }
    }
}

/// `a (1 - t) + b t`, exact at `t = 0` and `t = 1` so clamped curves hit
/// their end control points bit for bit.
fn lerp_exact(a: Point3, b: Point3, t: f64) -> Point3 {
    let s = 1.0 - t;
    Point3::new(a.x * s + b.x * t, a.y * s + b.y * t, a.z * s + b.z * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s_curve() -> BSplineCurve {
        BSplineCurve::new(
            3,
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 2.0, 0.0),
                Point3::new(3.0, -1.0, 0.0),
                Point3::new(4.0, 1.0, 0.0),
                Point3::new(6.0, 0.0, 0.0),
            ],
            vec![0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0, 1.0],
            2,
        )
        .unwrap()
    }

    #[test]
    fn clamped_curve_hits_end_control_points() {
        let curve = s_curve();
        assert!(curve.is_clamped());
        assert_eq!(curve.point_at(0.0), Point3::new(0.0, 0.0, 0.0));
        assert_eq!(curve.point_at(1.0), Point3::new(6.0, 0.0, 0.0));
        // Outside the domain clamps to the ends.
        assert_eq!(curve.point_at(-3.0), curve.point_at(0.0));
        assert_eq!(curve.point_at(7.0), curve.point_at(1.0));
    }

    #[test]
    fn de_boor_matches_basis_evaluation() {
        let curve = s_curve();
        for step in 0..=10 {
            let u = f64::from(step) / 10.0;
            let a = curve.point_at(u);
            let b = Point3::from(curve.derivatives_at(u, 0)[0]);
            assert!(a.distance_to(b) < 1e-9, "u = {u}");
        }
    }

    #[test]
    fn analytic_derivative_matches_numeric() {
        let curve = s_curve();
        let h = 1e-6;
        for &u in &[0.2, 0.45, 0.7] {
            let d = curve.derivatives_at(u, 1)[1];
            let fd = curve.point_at(u + h).sub_point(curve.point_at(u - h)) / (2.0 * h);
            assert!((d - fd).length() < 1e-5, "u = {u}");
        }
    }

    #[test]
    fn new_rejects_malformed_curves() {
        let pts: Vec<Point3> = (0..4).map(|i| Point3::new(f64::from(i), 0.0, 0.0)).collect();
        assert!(matches!(
            BSplineCurve::new(3, pts.clone(), vec![0.0; 7], 3),
            Err(FitError::InvalidInput { .. })
        ));
        assert!(matches!(
            BSplineCurve::new(3, pts.clone(), vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.5], 3),
            Err(FitError::InvalidInput { .. })
        ));
        assert!(matches!(
            BSplineCurve::new(4, pts.clone(), vec![0.0; 9], 3),
            Err(FitError::InsufficientData { .. })
        ));
        assert!(BSplineCurve::new(3, pts, vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0], 3).is_ok());
    }

    #[test]
    fn get_points_final_counts_and_orders() {
        let curve = s_curve();
        let samples = curve.get_points_final(25);
        assert_eq!(samples.len(), 25);
        assert_eq!(samples.dims(), 2);
        assert_eq!(samples.get(0), Some(curve.point_at(0.0)));
        assert_eq!(samples.get(24), Some(curve.point_at(1.0)));

        let params = parameters_by_count(curve.domain(), 25);
        assert!(params.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(curve.get_points_final(1).len(), 1);
        assert!(curve.get_points_final(0).is_empty());
        // Independent re-sampling.
        assert_eq!(curve.get_points_final(25), samples);
    }
}
