use nalgebra::DVector;

use super::{EquationSet, InGroupIterator};
use crate::error::{TransportError, TransportResult};
use crate::numerics::Convergence;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MultigroupReport {
    pub sweeps: usize,
    pub inner_iterations: usize,
    pub linear_iterations: usize,
    /// Globally reduced change of all moments over the last sweep.
    pub error: f64,
    pub converged: bool,
}

/// Gauss–Seidel over groups in ascending order.
#[derive(Clone, Copy, Debug)]
pub struct MultigroupIterator {
    pub in_group: InGroupIterator,
    pub convergence: Convergence,
    pub max_sweeps: usize,
}

impl Default for MultigroupIterator {
    fn default() -> Self {
        Self {
            in_group: InGroupIterator::default(),
            convergence: Convergence::relative(1e-7),
            max_sweeps: 200,
        }
    }
}

impl MultigroupIterator {
    pub fn new(in_group: InGroupIterator, convergence: Convergence, max_sweeps: usize) -> Self {
        Self {
            in_group,
            convergence,
            max_sweeps,
        }
    }

    /// Converge the scattering coupling for the fixed right-hand sides
    /// currently assembled. Without up-scattering one sweep is exact.
    ///
    /// Non-convergence is reported, not raised.
    pub fn iterate(
        &self,
        equations: &mut EquationSet<'_>,
        moments: &mut [DVector<f64>],
    ) -> TransportResult<MultigroupReport> {
        let problem = equations.problem();
        let single_sweep = !problem.materials.has_upscatter();
        let mut report = MultigroupReport::default();

        for sweep in 1..=self.max_sweeps.max(1) {
            let previous = moments.to_vec();
            for group in 0..equations.n_group() {
                let inner = self.in_group.iterate(equations, moments, group)?;
                report.inner_iterations += inner.iterations;
                report.linear_iterations += inner.linear_iterations;
            }
            report.sweeps = sweep;
            let check = self.convergence.check(
                moments,
                &previous,
                problem.mesh.owned_cells(),
                problem.ctx,
            )?;
            report.error = check.error;
            log::debug!("multigroup sweep {sweep}: error {:.3e}", report.error);
            if single_sweep || check.converged {
                report.converged = true;
                break;
            }
        }

        if !report.converged && problem.ctx.is_root() {
            log::warn!(
                "multigroup iteration did not converge in {} sweeps (error {:.3e})",
                report.sweeps,
                report.error
            );
        }
        Ok(report)
    }
}

/// Fixed-source driver: initialize, assemble, converge the groups.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedSourceSolver {
    pub multigroup: MultigroupIterator,
}

impl FixedSourceSolver {
    pub fn new(multigroup: MultigroupIterator) -> Self {
        Self { multigroup }
    }

    pub fn solve(
        &self,
        equations: &mut EquationSet<'_>,
        moments: &mut [DVector<f64>],
    ) -> TransportResult<MultigroupReport> {
        if equations.is_eigen() {
            return Err(TransportError::config(
                "fixed-source solve requested for an eigenvalue problem",
            ));
        }
        equations.initialize(moments)?;
        equations.assemble_fixed_linear_form(moments)?;
        let report = self.multigroup.iterate(equations, moments)?;
        if !report.converged {
            return Err(TransportError::MultigroupNonConvergence {
                sweeps: report.sweeps,
                error: report.error,
            });
        }
        if equations.problem().ctx.is_root() {
            log::info!(
                "fixed-source solve converged: {} sweeps, {} inner iterations",
                report.sweeps,
                report.inner_iterations
            );
        }
        Ok(report)
    }
}
