//! Fit diagnostics returned alongside approximated curves.
//!
//! ```ignore
//! let (curve, diagnostics) = approximator.approximate_with_diagnostics(&points, method)?;
//! if !diagnostics.converged {
//!     for warning in &diagnostics.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//! }
//! ```

use std::fmt;

use serde::Serialize;

use super::metrics::FitTimingReport;
use super::projection::Residual;

/// Summary of a single approximation run.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FitDiagnostics {
    /// Number of input samples.
    pub input_point_count: usize,

    /// Number of control points of the produced curve.
    pub ctrl_point_count: usize,

    /// Accepted re-parameterisation passes (0 for one-shot methods).
    pub iterations: usize,

    /// Mean residual after the initial fit and after every accepted pass.
    ///
    /// Non-increasing by construction: passes that would raise the residual
    /// are rejected and not recorded.
    pub residual_history: Vec<f64>,

    /// Residual of the returned curve.
    pub residual: Residual,

    /// Whether the iterative loop stopped on the improvement threshold
    /// rather than the iteration cap. Always `true` for one-shot methods.
    pub converged: bool,

    /// Only populated when the `fit_metrics` feature is enabled.
    pub timing: Option<FitTimingReport>,

    pub warnings: Vec<String>,
}

impl FitDiagnostics {
    #[must_use]
    pub fn new(input_point_count: usize) -> Self {
        Self {
            input_point_count,
            ..Self::default()
        }
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Relative improvement of the mean residual from the first fit to the last.
    #[must_use]
    pub fn improvement(&self) -> f64 {
        match (self.residual_history.first(), self.residual_history.last()) {
            (Some(&first), Some(&last)) if first > 0.0 => (first - last) / first,
            _ => 0.0,
        }
    }
}

impl fmt::Display for FitDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} points -> {} control points, {} iterations, residual mean {:.6} max {:.6} rms {:.6}",
            self.input_point_count,
            self.ctrl_point_count,
            self.iterations,
            self.residual.mean,
            self.residual.max,
            self.residual.rms,
        )?;
        if !self.converged {
            write!(f, " (not converged)")?;
        }
        if !self.warnings.is_empty() {
            write!(f, " [{} warnings]", self.warnings.len())?;
        }
        Ok(())
    }
}
