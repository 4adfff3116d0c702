//! Parameter association: one curve parameter in `[0, 1]` per sample.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::approx::run_iterative;
use super::core::{BBox, Point3, PointSet, Tolerance, Vec3};
use super::error::{FitError, FitResult};
use super::options::{ApproximatorOptions, PointOrdering};

/// Minimum sample count for a cubic fit (degree + 1).
pub const MIN_FIT_POINTS: usize = 4;

/// Strategy used to assign a parameter to each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationMethod {
    /// Normalised cumulative Euclidean distance.
    ChordLength,
    /// Normalised cumulative distance with every axis scaled by its extent.
    XyzNorm,
    /// Chord length refined by repeated foot-point projection onto trial fits.
    Iterative,
}

impl AssociationMethod {
    pub const ALL: [Self; 3] = [Self::ChordLength, Self::XyzNorm, Self::Iterative];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ChordLength => "chord_length",
            Self::XyzNorm => "xyz_norm",
            Self::Iterative => "iterative",
        }
    }

    /// Whether the method re-fits and re-projects in a loop.
    #[must_use]
    pub const fn is_iterative(self) -> bool {
        matches!(self, Self::Iterative)
    }
}

impl fmt::Display for AssociationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssociationMethod {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.name() == s.trim())
            .ok_or_else(|| {
                FitError::invalid(format!(
                    "unknown association method '{s}' (expected chord_length, xyz_norm or iterative)"
                ))
            })
    }
}

/// Parameters for every sample of `points`, index for index.
///
/// `Iterative` runs the full re-parameterisation loop of the cubic
/// approximator configured by `options` and returns its final parameters.
pub fn associate(
    points: &PointSet,
    method: AssociationMethod,
    options: &ApproximatorOptions,
) -> FitResult<Vec<f64>> {
    options.validate()?;
    if points.len() < MIN_FIT_POINTS {
        return Err(FitError::InsufficientData {
            provided: points.len(),
            required: MIN_FIT_POINTS,
        });
    }

    match method {
        AssociationMethod::ChordLength | AssociationMethod::XyzNorm => {
            one_shot_parameters(points, method, options.ordering, options.tolerance)
        }
        AssociationMethod::Iterative => {
            run_iterative(points, options, None).map(|outcome| outcome.params)
        }
    }
}

/// Chord-length or axis-normalised parameters, computed along `ordering`
/// and scattered back to input indices.
pub(crate) fn one_shot_parameters(
    points: &PointSet,
    method: AssociationMethod,
    ordering: PointOrdering,
    tolerance: Tolerance,
) -> FitResult<Vec<f64>> {
    let order = match ordering {
        PointOrdering::AsGiven => None,
        PointOrdering::PrincipalAxis => Some(order_along_principal_axis(points)),
    };
    let ordered: Vec<Point3> = match &order {
        Some(order) => points.reordered(order).into_points(),
        None => points.points().to_vec(),
    };

    let along = match method {
        AssociationMethod::XyzNorm => xyz_norm_parameters(&ordered, tolerance)?,
        _ => chord_length_parameters(&ordered, tolerance)?,
    };

    Ok(match order {
        Some(order) => {
            let mut params = vec![0.0; along.len()];
            for (rank, &index) in order.iter().enumerate() {
                params[index] = along[rank];
            }
            params
        }
        None => along,
    })
}

/// Normalised cumulative chord length; first = 0, last = 1.
///
/// The set is degenerate when the total length is within `tolerance` of zero
/// relative to the bounding-box diagonal, so the check is scale invariant.
pub fn chord_length_parameters(points: &[Point3], tolerance: Tolerance) -> FitResult<Vec<f64>> {
    let diagonal = BBox::from_points(points).map_or(0.0, BBox::diagonal);
    cumulative_parameters(points, tolerance.relative_to(diagonal), |a, b| {
        a.distance_to(b)
    })
}

/// Normalised cumulative distance where each axis delta is divided by that
/// axis' extent over the set. Axes whose extent is negligible next to the
/// bounding-box diagonal do not contribute.
pub fn xyz_norm_parameters(points: &[Point3], tolerance: Tolerance) -> FitResult<Vec<f64>> {
    let bbox = BBox::from_points(points).ok_or_else(|| FitError::degenerate("empty point set"))?;
    let size = bbox.size();
    let min_extent = tolerance.relative_to(bbox.diagonal());
    let inv = |extent: f64| if extent <= min_extent { 0.0 } else { 1.0 / extent };
    let scale = Vec3::new(inv(size.x), inv(size.y), inv(size.z));

    // Normalised steps are unitless, so the threshold is relative to 1.
    cumulative_parameters(points, tolerance.relative_to(1.0), |a, b| {
        let d = b.sub_point(a);
        Vec3::new(d.x * scale.x, d.y * scale.y, d.z * scale.z).length()
    })
}

fn cumulative_parameters(
    points: &[Point3],
    min_total: f64,
    step: impl Fn(Point3, Point3) -> f64,
) -> FitResult<Vec<f64>> {
    if points.len() < 2 {
        return Err(FitError::InsufficientData {
            provided: points.len(),
            required: 2,
        });
    }

    let mut params = Vec::with_capacity(points.len());
    let mut total = 0.0;
    params.push(0.0);
    for w in points.windows(2) {
        total += step(w[0], w[1]);
        params.push(total);
    }

    if !total.is_finite() || total <= min_total {
        return Err(FitError::degenerate(
            "points are coincident; total parameter length is zero",
        ));
    }

    for t in &mut params {
        *t /= total;
    }
    // Guard the end against rounding in the division.
    if let Some(last) = params.last_mut() {
        *last = 1.0;
    }
    Ok(params)
}

/// Centroid and dominant covariance direction of `points`.
///
/// Returns `None` for empty input. For coincident points the direction is
/// an arbitrary unit axis.
pub(crate) fn principal_axis(points: &[Point3]) -> Option<(Point3, Vec3)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let sum = points.iter().fold(Vec3::ZERO, |acc, p| acc + p.to_vec3());
    let centroid = Point3::from(sum / n);

    let mut cov = [[0.0_f64; 3]; 3];
    for p in points {
        let d = p.sub_point(centroid);
        cov[0][0] += d.x * d.x;
        cov[0][1] += d.x * d.y;
        cov[0][2] += d.x * d.z;
        cov[1][1] += d.y * d.y;
        cov[1][2] += d.y * d.z;
        cov[2][2] += d.z * d.z;
    }
    cov[1][0] = cov[0][1];
    cov[2][0] = cov[0][2];
    cov[2][1] = cov[1][2];

    // Seed on the highest-variance coordinate axis.
    let seed = if cov[0][0] >= cov[1][1] && cov[0][0] >= cov[2][2] {
        Vec3::X
    } else if cov[1][1] >= cov[2][2] {
        Vec3::Y
    } else {
        Vec3::Z
    };
    let axis = power_iteration(&cov, seed, 32);
    Some((centroid, axis.normalized().unwrap_or(seed)))
}

fn power_iteration(cov: &[[f64; 3]; 3], initial: Vec3, iterations: usize) -> Vec3 {
    let mut v = initial;
    for _ in 0..iterations {
        let next = Vec3::new(
            cov[0][0] * v.x + cov[0][1] * v.y + cov[0][2] * v.z,
            cov[1][0] * v.x + cov[1][1] * v.y + cov[1][2] * v.z,
            cov[2][0] * v.x + cov[2][1] * v.y + cov[2][2] * v.z,
        );
        match next.normalized() {
            Some(unit) => v = unit,
            None => break,
        }
    }
    v
}

/// Signed positions of `points` along the principal axis.
pub(crate) fn principal_projections(points: &[Point3]) -> Vec<f64> {
    match principal_axis(points) {
        Some((centroid, axis)) => points.iter().map(|p| p.sub_point(centroid).dot(axis)).collect(),
        None => Vec::new(),
    }
}

/// Permutation ordering `points` by their projection onto the dominant
/// covariance axis. Ties keep input order.
#[must_use]
pub fn order_along_principal_axis(points: &PointSet) -> Vec<usize> {
    let projections = principal_projections(points.points());
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| projections[a].total_cmp(&projections[b]));

    // Orient the ordering so it starts at the end nearest the first sample.
    if let (Some(&first), Some(&last)) = (order.first(), order.last()) {
        if last == 0 && first != 0 {
            order.reverse();
        }
    }
    order
}
