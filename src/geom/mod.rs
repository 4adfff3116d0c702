mod approx;
mod basis;
mod catmull_rom;
mod core;
mod curve;
mod diagnostics;
mod error;
mod grid;
mod metrics;
mod options;
mod param;
mod projection;

pub use approx::{CUBIC, CancelToken, CubicBSplineApproximator, fit_all_methods};
pub use catmull_rom::{CatmullRomSplineList, CentripetalCatmullRomSpline, MIN_CONTROL_POINTS};
pub use core::{BBox, Point3, PointSet, Tolerance, Vec3};
pub use curve::{BSplineCurve, Curve3, parameters_by_count, sample_curve_uniform};
pub use diagnostics::FitDiagnostics;
pub use error::{FitError, FitResult};
pub use grid::{BSplineGridApproximator, GridFit};
pub use metrics::{FitMetrics, FitTimingReport, TimingBucket};
pub use options::{
    ApproximatorOptions, DEFAULT_MAX_ITER, DEFAULT_RES_DELTA_TLD, GridFitOptions, PointOrdering,
    ProjectionOptions,
};
pub use param::{
    AssociationMethod, MIN_FIT_POINTS, associate, chord_length_parameters,
    order_along_principal_axis, xyz_norm_parameters,
};
pub use projection::{FootPoint, Residual, project_point, project_points, residual};

#[cfg(test)]
mod tests;
