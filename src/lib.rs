#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Curve fitting for sampled 2D/3D point sequences such as LIDAR lane
//! markings.
//!
//! - [`geom::CubicBSplineApproximator`] fits clamped cubic B-splines by least
//!   squares, with chord-length, axis-normalised or iterative foot-point
//!   parameter association.
//! - [`geom::BSplineGridApproximator`] solves one penalised global fit over a
//!   regular control grid.
//! - [`geom::CatmullRomSplineList`] and [`geom::CentripetalCatmullRomSpline`]
//!   interpolate ordered control points.
//!
//! ```
//! use lanefit_engine::geom::{
//!     ApproximatorOptions, AssociationMethod, CubicBSplineApproximator, PointSet,
//! };
//!
//! let rows: Vec<[f64; 2]> = (0..20)
//!     .map(|i| {
//!         let x = f64::from(i);
//!         [x, 0.05 * x * x]
//!     })
//!     .collect();
//! let points = PointSet::from_xy(&rows)?;
//! let curve = CubicBSplineApproximator::new(ApproximatorOptions::default())
//!     .approximate(&points, AssociationMethod::Iterative)?;
//! assert_eq!(curve.get_points_final(50).len(), 50);
//! # Ok::<(), lanefit_engine::geom::FitError>(())
//! ```

pub mod geom;

pub use geom::{
    AssociationMethod, BSplineCurve, BSplineGridApproximator, CatmullRomSplineList,
    CentripetalCatmullRomSpline, CubicBSplineApproximator, FitError, FitResult, PointSet,
};

cfg_if::cfg_if! {
    if #[cfg(feature = "parallel")] {
        /// Worker threads available to parallel fits.
        #[must_use]
        pub fn worker_threads() -> usize {
            rayon::current_num_threads()
        }
    } else {
        /// Worker threads available to parallel fits; always 1 without the
        /// `parallel` feature.
        #[must_use]
        pub fn worker_threads() -> usize {
            1
        }
    }
}
