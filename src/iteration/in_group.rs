use nalgebra::DVector;

use super::EquationSet;
use crate::error::TransportResult;
use crate::numerics::Convergence;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InGroupReport {
    pub iterations: usize,
    pub linear_iterations: usize,
    /// Globally reduced moment change of the last iteration, in the measure
    /// the tolerance was tested on.
    pub error: f64,
    pub converged: bool,
}

/// Source iteration on the within-group scattering of one group.
#[derive(Clone, Copy, Debug)]
pub struct InGroupIterator {
    pub convergence: Convergence,
    pub max_iterations: usize,
}

impl Default for InGroupIterator {
    fn default() -> Self {
        Self {
            convergence: Convergence::relative(1e-8),
            max_iterations: 1000,
        }
    }
}

impl InGroupIterator {
    pub fn new(convergence: Convergence, max_iterations: usize) -> Self {
        Self {
            convergence,
            max_iterations,
        }
    }

    /// Converge `moments[group]` with all other groups held fixed.
    ///
    /// Without within-group scattering and without reflective boundaries the
    /// right-hand side does not depend on the group's own solution, so a
    /// single solve is exact. With a low-order equation, every transport
    /// sweep is followed by a closure update and a low-order solve whose
    /// scalar flux replaces the moment.
    pub fn iterate(
        &self,
        equations: &mut EquationSet<'_>,
        moments: &mut [DVector<f64>],
        group: usize,
    ) -> TransportResult<InGroupReport> {
        let problem = equations.problem();
        let single_solve =
            !problem.materials.has_self_scatter(group) && !problem.boundaries.has_reflective();
        let EquationSet {
            high_order,
            low_order,
        } = equations;

        let mut report = InGroupReport::default();
        let mut previous = DVector::zeros(0);
        for iteration in 1..=self.max_iterations.max(1) {
            high_order.assemble_linear_form(moments, group)?;
            report.linear_iterations += high_order.solve_in_group(group)?;
            high_order.generate_group_moment(group, &mut moments[group], &mut previous)?;

            if !single_solve {
                if let Some(low_order) = low_order.as_mut() {
                    low_order.assemble_closure_bilinear_form(high_order, group)?;
                    low_order.assemble_linear_form(moments, group)?;
                    report.linear_iterations += low_order.solve_in_group(group)?;
                    moments[group] = low_order.scalar_flux(group)?.clone();
                }
            }

            let current = &moments[group..=group];
            let last = std::slice::from_ref(&previous);
            report.iterations = iteration;
            let check =
                self.convergence
                    .check(current, last, problem.mesh.owned_cells(), problem.ctx)?;
            report.error = check.error;
            log::trace!(
                "group {group} iteration {iteration}: error {:.3e}",
                report.error
            );
            if single_solve || check.converged {
                report.converged = true;
                break;
            }
        }

        if !report.converged && problem.ctx.is_root() {
            log::warn!(
                "group {group} did not converge in {} iterations (error {:.3e})",
                report.iterations,
                report.error
            );
        }
        Ok(report)
    }
}
