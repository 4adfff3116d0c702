use thiserror::Error;

/// Result type for curve fitting operations.
pub type FitResult<T> = Result<T, FitError>;

/// Errors raised by the fitting engine.
///
/// Every error aborts the requested fit before any curve is produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Fewer samples than the curve degree requires.
    #[error("insufficient data: {provided} points provided, at least {required} required")]
    InsufficientData { provided: usize, required: usize },
    /// Coincident samples or a zero-length point set.
    #[error("degenerate input: {reason}")]
    DegenerateInput { reason: String },
    /// The least-squares system is singular or ill-conditioned.
    #[error("fitting failed: {reason}")]
    Fitting { reason: String },
    /// Non-finite values, wrong dimensionality or invalid configuration.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
    /// An interpolating spline was given too few control points.
    #[error("insufficient control points: {provided} provided, at least {required} required")]
    InsufficientControlPoints { provided: usize, required: usize },
    /// The caller cancelled an iterative fit.
    #[error("fit cancelled before iteration {iteration}")]
    Cancelled { iteration: usize },
}

impl FitError {
    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn fitting(reason: impl Into<String>) -> Self {
        Self::Fitting {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}
