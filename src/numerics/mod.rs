pub mod comm;
pub mod krylov;
pub mod solver;
pub mod sparse;
pub mod timing;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::TransportResult;
use comm::ExecutionContext;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tolerance {
    Absolute(f64),
    Relative(f64),
    Combined(f64, f64),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConvergenceMetric {
    #[default]
    L2Norm,
    MaxNorm,
}

/// Convergence test on successive iterates of a set of flux vectors.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Convergence {
    pub tolerance: Tolerance,
    #[serde(default)]
    pub metric: ConvergenceMetric,
}

impl Default for Convergence {
    fn default() -> Self {
        Self::relative(1e-6)
    }
}

impl Convergence {
    pub fn relative(tol: f64) -> Self {
        Self {
            tolerance: Tolerance::Relative(tol),
            metric: ConvergenceMetric::L2Norm,
        }
    }

    pub fn with_metric(mut self, metric: ConvergenceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Norm of `current - previous` and of `current` over the owned `cells`
    /// of every vector in the set (groups), reduced over all workers.
    ///
    /// Collective: every worker must call it with the same metric.
    pub fn change(
        &self,
        current: &[DVector<f64>],
        previous: &[DVector<f64>],
        cells: &[usize],
        ctx: &ExecutionContext,
    ) -> TransportResult<FluxChange> {
        let entries = current.iter().zip(previous).flat_map(move |(c, p)| {
            cells.iter().map(move |&i| (c[i], p.get(i).copied().unwrap_or(0.0)))
        });
        let change = match self.metric {
            ConvergenceMetric::L2Norm => {
                let (diff, reference) = entries.fold((0.0, 0.0), |(d, r), (c, p)| {
                    (d + (c - p) * (c - p), r + c * c)
                });
                FluxChange {
                    absolute: ctx.sum(diff)?.sqrt(),
                    reference: ctx.sum(reference)?.sqrt(),
                }
            }
            ConvergenceMetric::MaxNorm => {
                let (diff, reference) = entries.fold((0.0_f64, 0.0_f64), |(d, r), (c, p)| {
                    (d.max((c - p).abs()), r.max(c.abs()))
                });
                FluxChange {
                    absolute: ctx.max(diff)?,
                    reference: ctx.max(reference)?,
                }
            }
        };
        Ok(change)
    }

    /// Error measure and verdict for a reduced change. The reported error is
    /// the quantity the verdict was taken on: the absolute norm for
    /// `Absolute`, the relative one for `Relative`, and for `Combined`
    /// whichever criterion passed (the relative one when neither did).
    pub fn assess(&self, change: FluxChange) -> Assessment {
        let relative = change.relative();
        match self.tolerance {
            Tolerance::Absolute(tol) => Assessment {
                error: change.absolute,
                converged: change.absolute <= tol,
            },
            Tolerance::Relative(tol) => Assessment {
                error: relative,
                converged: relative <= tol,
            },
            Tolerance::Combined(abs_tol, rel_tol) => {
                if change.absolute <= abs_tol && relative > rel_tol {
                    Assessment {
                        error: change.absolute,
                        converged: true,
                    }
                } else {
                    Assessment {
                        error: relative,
                        converged: relative <= rel_tol,
                    }
                }
            }
        }
    }

    /// [`Convergence::change`] followed by [`Convergence::assess`].
    pub fn check(
        &self,
        current: &[DVector<f64>],
        previous: &[DVector<f64>],
        cells: &[usize],
        ctx: &ExecutionContext,
    ) -> TransportResult<Assessment> {
        Ok(self.assess(self.change(current, previous, cells, ctx)?))
    }
}

/// Globally reduced norms of an update and of the current iterate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FluxChange {
    pub absolute: f64,
    pub reference: f64,
}

impl FluxChange {
    /// Falls back to the absolute change when the current iterate vanishes.
    pub fn relative(&self) -> f64 {
        if self.reference > 0.0 {
            self.absolute / self.reference
        } else {
            self.absolute
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Assessment {
    pub error: f64,
    pub converged: bool,
}
