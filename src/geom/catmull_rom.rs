//! Interpolating Catmull-Rom splines through ordered control points.
//!
//! Both variants evaluate one cubic Hermite segment between each pair of
//! consecutive control points, with tangents estimated from the neighbours
//! on either side. The first and last control points get mirrored phantom
//! neighbours `2 P_0 - P_1` and `2 P_{n-1} - P_{n-2}`.
//!
//! As curves both are parameterised over `[0, n - 1]`, one unit per segment.

use super::core::{BBox, Point3, PointSet, Tolerance, Vec3};
use super::curve::Curve3;
use super::error::{FitError, FitResult};

/// Minimum control point count for either variant.
pub const MIN_CONTROL_POINTS: usize = 4;

fn check_control_points(points: &PointSet) -> FitResult<()> {
    if points.len() < MIN_CONTROL_POINTS {
        return Err(FitError::InsufficientControlPoints {
            provided: points.len(),
            required: MIN_CONTROL_POINTS,
        });
    }
    Ok(())
}

/// Control point `index`, extended by one mirrored phantom point on each end.
fn extended_point(points: &[Point3], index: isize) -> Point3 {
    let last = points.len() - 1;
    match index {
        -1 => points[0].add_vec(points[0].sub_point(points[1])),
        i if i as usize > last => points[last].add_vec(points[last].sub_point(points[last - 1])),
        i => points[i as usize],
    }
}

/// Segment index and local parameter for a global parameter in `[0, n - 1]`.
fn locate(t: f64, segment_count: usize) -> (usize, f64) {
    let t = t.clamp(0.0, segment_count as f64);
    let segment = (t.floor() as usize).min(segment_count - 1);
    (segment, t - segment as f64)
}

/// Samples every segment at `samples_per_segment` evenly spaced local
/// parameters, emitting control points verbatim at segment starts and at
/// the end.
fn sample_segments(
    points: &[Point3],
    samples_per_segment: usize,
    eval: impl Fn(usize, f64) -> Point3,
) -> FitResult<Vec<Point3>> {
    if samples_per_segment == 0 {
        return Err(FitError::invalid("samples_per_segment must be >= 1"));
    }

    let segments = points.len() - 1;
    let mut out = Vec::with_capacity(samples_per_segment * segments + 1);
    for segment in 0..segments {
        out.push(points[segment]);
        for k in 1..samples_per_segment {
            out.push(eval(segment, k as f64 / samples_per_segment as f64));
        }
    }
    out.push(points[segments]);
    Ok(out)
}

/// Cubic Hermite blend of `p1 -> p2` with end tangents `m1`, `m2`.
fn hermite(p1: Point3, p2: Point3, m1: Vec3, m2: Vec3, t: f64) -> Point3 {
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    Point3::from(p1.to_vec3() * h00 + m1 * h10 + p2.to_vec3() * h01 + m2 * h11)
}

/// Uniform Catmull-Rom spline with tension `tau`.
///
/// The tangent at `P_i` is `tau (P_{i+1} - P_{i-1})`; `tau = 0.5` is the
/// classic spline. Lower values tighten the curve around the control points.
#[derive(Debug, Clone, PartialEq)]
pub struct CatmullRomSplineList {
    control_points: PointSet,
    tau: f64,
}

impl CatmullRomSplineList {
    pub fn new(control_points: &PointSet, tau: f64) -> FitResult<Self> {
        check_control_points(control_points)?;
        if !tau.is_finite() {
            return Err(FitError::invalid(format!("tau must be finite, got {tau}")));
        }
        if tau <= 0.0 || tau > 1.0 {
            log::warn!("tau {tau} is outside the recommended range (0, 1]");
        }
        Ok(Self {
            control_points: control_points.clone(),
            tau,
        })
    }

    #[must_use]
    pub fn control_points(&self) -> &PointSet {
        &self.control_points
    }

    #[must_use]
    pub fn tau(&self) -> f64 {
        self.tau
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.control_points.len() - 1
    }

    /// `samples_per_segment * (n - 1) + 1` points through every control point.
    pub fn get_points(&self, samples_per_segment: usize) -> FitResult<PointSet> {
        let points = self.control_points.points();
        let samples = sample_segments(points, samples_per_segment, |segment, t| {
            self.segment_point(segment, t)
        })?;
        Ok(PointSet::from_trusted(samples, self.control_points.dims()))
    }

    fn segment_point(&self, segment: usize, t: f64) -> Point3 {
        let points = self.control_points.points();
        let i = segment as isize;
        cardinal_point(
            extended_point(points, i - 1),
            extended_point(points, i),
            extended_point(points, i + 1),
            extended_point(points, i + 2),
            t,
            self.tau,
        )
    }
}

impl Curve3 for CatmullRomSplineList {
    fn point_at(&self, t: f64) -> Point3 {
        let (segment, local) = locate(t, self.segment_count());
        self.segment_point(segment, local)
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, self.segment_count() as f64)
    }
}

/// Cardinal spline between `p1` and `p2`, with `p0` and `p3` as tangent guides.
fn cardinal_point(p0: Point3, p1: Point3, p2: Point3, p3: Point3, t: f64, tau: f64) -> Point3 {
    let t2 = t * t;
    let t3 = t2 * t;

    let b0 = -tau * t3 + 2.0 * tau * t2 - tau * t;
    let b1 = (2.0 - tau) * t3 + (tau - 3.0) * t2 + 1.0;
    let b2 = (tau - 2.0) * t3 + (3.0 - 2.0 * tau) * t2 + tau * t;
    let b3 = tau * t3 - tau * t2;

    Point3::new(
        b0 * p0.x + b1 * p1.x + b2 * p2.x + b3 * p3.x,
        b0 * p0.y + b1 * p1.y + b2 * p2.y + b3 * p3.y,
        b0 * p0.z + b1 * p1.z + b2 * p2.z + b3 * p3.z,
    )
}

/// Catmull-Rom spline with knot spacing `|P_{i+1} - P_i|^alpha`.
///
/// `alpha = 0.5` is the centripetal spline, `0` the uniform one and `1`
/// chord-length spacing.
#[derive(Debug, Clone, PartialEq)]
pub struct CentripetalCatmullRomSpline {
    control_points: PointSet,
    alpha: f64,
    /// Knots of the extended sequence, phantom points included.
    knots: Vec<f64>,
}

impl CentripetalCatmullRomSpline {
    pub fn new(control_points: &PointSet, alpha: f64) -> FitResult<Self> {
        check_control_points(control_points)?;
        if !alpha.is_finite() {
            return Err(FitError::invalid(format!("alpha must be finite, got {alpha}")));
        }
        if !(0.0..=1.0).contains(&alpha) {
            log::warn!("alpha {alpha} is outside the recommended range [0, 1]");
        }

        let points = control_points.points();
        let n = points.len() as isize;
        let min_chord = Tolerance::ZERO_LENGTH
            .relative_to(BBox::from_points(points).map_or(0.0, BBox::diagonal));
        let mut knots = Vec::with_capacity(points.len() + 2);
        knots.push(0.0);
        for i in -1..n {
            let a = extended_point(points, i);
            let b = extended_point(points, i + 1);
            let chord = a.distance_to(b);
            if chord <= min_chord {
                return Err(FitError::degenerate(format!(
                    "control points {} and {} coincide",
                    i.max(0),
                    (i + 1).min(n - 1)
                )));
            }
            let last = knots.last().copied().unwrap_or(0.0);
            knots.push(last + chord.powf(alpha));
        }

        Ok(Self {
            control_points: control_points.clone(),
            alpha,
            knots,
        })
    }

    #[must_use]
    pub fn control_points(&self) -> &PointSet {
        &self.control_points
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.control_points.len() - 1
    }

    /// `samples_per_segment * (n - 1) + 1` points through every control point.
    pub fn get_points(&self, samples_per_segment: usize) -> FitResult<PointSet> {
        let points = self.control_points.points();
        let samples = sample_segments(points, samples_per_segment, |segment, t| {
            self.segment_point(segment, t)
        })?;
        Ok(PointSet::from_trusted(samples, self.control_points.dims()))
    }

    fn segment_point(&self, segment: usize, t: f64) -> Point3 {
        let points = self.control_points.points();
        let i = segment as isize;
        let (p0, p1, p2, p3) = (
            extended_point(points, i - 1),
            extended_point(points, i),
            extended_point(points, i + 1),
            extended_point(points, i + 2),
        );
        // knots[k] belongs to extended index k - 1.
        let (t0, t1, t2, t3) = (
            self.knots[segment],
            self.knots[segment + 1],
            self.knots[segment + 2],
            self.knots[segment + 3],
        );

        // Non-uniform tangents scaled to the unit Hermite interval.
        let dt = t2 - t1;
        let m1 = (p1.sub_point(p0) / (t1 - t0) - p2.sub_point(p0) / (t2 - t0)
            + p2.sub_point(p1) / dt)
            * dt;
        let m2 = (p2.sub_point(p1) / dt - p3.sub_point(p1) / (t3 - t1)
            + p3.sub_point(p2) / (t3 - t2))
            * dt;
        hermite(p1, p2, m1, m2, t)
    }
}

impl Curve3 for CentripetalCatmullRomSpline {
    fn point_at(&self, t: f64) -> Point3 {
        let (segment, local) = locate(t, self.segment_count());
        self.segment_point(segment, local)
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, self.segment_count() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinal_basis_endpoints() {
        let p0 = Point3::new(0.0, 0.0, 0.0);
        let p1 = Point3::new(1.0, 0.0, 0.0);
        let p2 = Point3::new(2.0, 1.0, 0.0);
        let p3 = Point3::new(3.0, 1.0, 0.0);

        let start = cardinal_point(p0, p1, p2, p3, 0.0, 0.5);
        let end = cardinal_point(p0, p1, p2, p3, 1.0, 0.5);
        assert!(start.distance_to(p1) < 1e-12);
        assert!(end.distance_to(p2) < 1e-12);
    }

    #[test]
    fn test_phantom_points_mirror_ends() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 2.0, 0.0),
        ];
        assert_eq!(extended_point(&points, -1), Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(extended_point(&points, 4), Point3::new(4.0, 4.0, 0.0));
        assert_eq!(extended_point(&points, 2), points[2]);
    }

    #[test]
    fn test_locate_clamps_to_last_segment() {
        assert_eq!(locate(3.0, 3), (2, 1.0));
        assert_eq!(locate(-1.0, 3), (0, 0.0));
        assert_eq!(locate(1.25, 3), (1, 0.25));
    }

    #[test]
    fn test_centripetal_knots_include_phantoms() {
        let set = PointSet::from_xy(&[[0.0, 0.0], [4.0, 0.0], [4.0, 1.0], [4.0, 10.0]]).unwrap();
        let spline = CentripetalCatmullRomSpline::new(&set, 0.5).unwrap();
        // Chords: phantom 4, 4, 1, 9, phantom 9.
        let expected = [0.0, 2.0, 4.0, 5.0, 8.0, 11.0];
        assert_eq!(spline.knots.len(), expected.len());
        for (a, b) in spline.knots.iter().zip(expected) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
