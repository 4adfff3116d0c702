use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use super::error::{FitError, FitResult};

// ─────────────────────────────────────────────────────────────────────────────
// Vec3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// Unit vector along the X axis.
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    /// Unit vector along the Y axis.
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    /// Unit vector along the Z axis.
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[must_use]
    pub const fn length_squared(self) -> f64 {
        self.dot(self)
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len.is_finite() && len > 0.0 {
            Some(Self::new(self.x / len, self.y / len, self.z / len))
        } else {
            None
        }
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Mul<Vec3> for f64 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Self::Output {
        Vec3::new(self * rhs.x, self * rhs.y, self * rhs.z)
    }
}

impl Div<f64> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Point3
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// The origin point (0, 0, 0).
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Create a point in the XY plane.
    #[must_use]
    pub const fn new_2d(x: f64, y: f64) -> Self {
        Self::new(x, y, 0.0)
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Convert point to a position vector from the origin.
    #[must_use]
    pub const fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    #[must_use]
    pub const fn add_vec(self, v: Vec3) -> Self {
        Self::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }

    #[must_use]
    pub const fn sub_point(self, rhs: Self) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        self.sub_point(other).length()
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared_to(self, other: Self) -> f64 {
        self.sub_point(other).length_squared()
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Default for Point3 {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }
}

impl From<[f64; 2]> for Point3 {
    fn from(arr: [f64; 2]) -> Self {
        Self::new_2d(arr[0], arr[1])
    }
}

impl From<Vec3> for Point3 {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Point3> for Vec3 {
    fn from(p: Point3) -> Self {
        p.to_vec3()
    }
}

impl Add<Vec3> for Point3 {
    type Output = Self;
    fn add(self, rhs: Vec3) -> Self::Output {
        self.add_vec(rhs)
    }
}

impl Sub for Point3 {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Self::Output {
        self.sub_point(rhs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BBox
// ─────────────────────────────────────────────────────────────────────────────

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min: Point3,
    pub max: Point3,
}

impl BBox {
    #[must_use]
    pub const fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all points, `None` for an empty slice.
    #[must_use]
    pub fn from_points(points: &[Point3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let start = Self::new(*first, *first);
        Some(rest.iter().fold(start, |bbox, p| bbox.expand_point(*p)))
    }

    /// Size (dimensions) of the bounding box.
    #[must_use]
    pub fn size(self) -> Vec3 {
        self.max.sub_point(self.min)
    }

    /// Diagonal length of the bounding box.
    #[must_use]
    pub fn diagonal(self) -> f64 {
        self.size().length()
    }

    #[must_use]
    pub fn expand_point(self, p: Point3) -> Self {
        Self::new(
            Point3::new(
                self.min.x.min(p.x),
                self.min.y.min(p.y),
                self.min.z.min(p.z),
            ),
            Point3::new(
                self.max.x.max(p.x),
                self.max.y.max(p.y),
                self.max.z.max(p.z),
            ),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

/// Tolerance configuration for fitting operations.
///
/// Use the named constants for specific use cases to avoid epsilon scatter:
/// - `Tolerance::default_geom()` - General geometry comparisons (1e-9)
/// - `Tolerance::ZERO_LENGTH` - Coincident control points, relative to their extent (1e-12)
/// - `Tolerance::PIVOT` - Relative pivot threshold for linear solves (1e-12)
/// - `Tolerance::PARAMETER` - Newton step convergence in parameter space (1e-12)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    /// Default geometric tolerance (1e-9).
    pub const DEFAULT: Self = Self { eps: 1e-9 };

    /// Chords shorter than this fraction of the bounding-box diagonal count as zero (1e-12).
    pub const ZERO_LENGTH: Self = Self { eps: 1e-12 };

    /// Pivot magnitude, relative to the matrix scale, below which a system is singular.
    pub const PIVOT: Self = Self { eps: 1e-12 };

    /// Newton refinement stops once the parameter step drops below this (1e-12).
    pub const PARAMETER: Self = Self { eps: 1e-12 };

    #[must_use]
    pub const fn default_geom() -> Self {
        Self::DEFAULT
    }

    /// Create tolerance relative to a span/domain size.
    #[must_use]
    pub fn relative_to(self, span: f64) -> f64 {
        self.eps * span.abs()
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PointSet
// ─────────────────────────────────────────────────────────────────────────────

/// An ordered, validated array of 2D or 3D samples.
///
/// 2D samples are stored with `z = 0`; `dims` records the input width so that
/// [`PointSet::to_rows`] hands back arrays of the same shape. A `PointSet` is
/// never mutated by the engine; reordering produces a new set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointSet {
    points: Vec<Point3>,
    dims: usize,
}

impl PointSet {
    /// Wrap points of the given dimensionality.
    ///
    /// Fails with [`FitError::InvalidInput`] when `dims` is not 2 or 3, a
    /// coordinate is NaN/infinite, or a 2D set carries a non-zero `z`.
    pub fn new(points: Vec<Point3>, dims: usize) -> FitResult<Self> {
        if dims != 2 && dims != 3 {
            return Err(FitError::invalid(format!(
                "points must have 2 or 3 coordinates, got {dims}"
            )));
        }
        for (i, p) in points.iter().enumerate() {
            if !p.is_finite() {
                return Err(FitError::invalid(format!(
                    "point {i} contains NaN or infinite values"
                )));
            }
            if dims == 2 && p.z != 0.0 {
                return Err(FitError::invalid(format!(
                    "point {i} has a z coordinate in a 2D point set"
                )));
            }
        }
        Ok(Self { points, dims })
    }

    /// Build from an `(n, 2)` or `(n, 3)` row array.
    ///
    /// The width of the first row fixes the dimensionality; an empty array
    /// yields an empty 3D set.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> FitResult<Self> {
        let dims = rows.first().map_or(3, |row| row.as_ref().len());
        if dims != 2 && dims != 3 {
            return Err(FitError::invalid(format!(
                "points must have 2 or 3 coordinates, got {dims}"
            )));
        }

        let mut points = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != dims {
                return Err(FitError::invalid(format!(
                    "row {i} has {} coordinates, expected {dims}",
                    row.len()
                )));
            }
            let z = if dims == 3 { row[2] } else { 0.0 };
            points.push(Point3::new(row[0], row[1], z));
        }
        Self::new(points, dims)
    }

    pub fn from_xy(rows: &[[f64; 2]]) -> FitResult<Self> {
        Self::new(rows.iter().copied().map(Point3::from).collect(), 2)
    }

    pub fn from_xyz(rows: &[[f64; 3]]) -> FitResult<Self> {
        Self::new(rows.iter().copied().map(Point3::from).collect(), 3)
    }

    /// Engine-produced points are finite by construction.
    pub(crate) fn from_trusted(points: Vec<Point3>, dims: usize) -> Self {
        debug_assert!(dims == 2 || dims == 3);
        Self { points, dims }
    }

    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3> {
        self.points.iter()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Point3> {
        self.points.get(index).copied()
    }

    #[must_use]
    pub fn into_points(self) -> Vec<Point3> {
        self.points
    }

    /// Row-major `(n, dims)` array.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.points
            .iter()
            .map(|p| p.to_array()[..self.dims].to_vec())
            .collect()
    }

    /// New set holding `self[order[0]], self[order[1]], ...`.
    ///
    /// Indices outside the set are skipped.
    #[must_use]
    pub fn reordered(&self, order: &[usize]) -> Self {
        let points = order
            .iter()
            .filter_map(|&i| self.points.get(i).copied())
            .collect();
        Self::from_trusted(points, self.dims)
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point3;
    type IntoIter = std::slice::Iter<'a, Point3>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
