use std::sync::Arc;

use kryst::solver::LinearSolver as _;
use kryst::{
    parallel::{NoComm, UniverseComm},
    preconditioner::PcSide,
};
use nalgebra::DVector;

use crate::numerics::solver::{
    check_dimensions, relative_residual, LinearSolveStats, LinearSolver, SolverError,
};
use crate::numerics::sparse::SystemMatrix;

/// Accepted ratio between the unscaled residual after the solve and the
/// Krylov tolerance. The solver works on the row-scaled system, so the
/// residual of the original system may sit somewhat above its tolerance.
const RESIDUAL_SLACK: f64 = 1e3;

/// BiCGStab on the Jacobi row-scaled system.
#[derive(Clone, Copy, Debug)]
pub struct BiCgStab {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl BiCgStab {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }

    fn row_scaling(matrix: &SystemMatrix) -> Vec<f64> {
        matrix
            .diagonal()
            .iter()
            .map(|&diag| if diag.abs() < 1e-12 { 1.0 } else { diag })
            .collect()
    }
}

impl LinearSolver for BiCgStab {
    fn name(&self) -> &'static str {
        "bicgstab"
    }

    fn solve(
        &mut self,
        matrix: &SystemMatrix,
        rhs: &DVector<f64>,
        solution: &mut DVector<f64>,
    ) -> Result<LinearSolveStats, SolverError> {
        check_dimensions(matrix, rhs, solution)?;
        let n = matrix.n();
        if rhs.norm() == 0.0 {
            solution.fill(0.0);
            return Ok(LinearSolveStats::default());
        }

        let d = Self::row_scaling(matrix);
        let mut data = matrix.values().to_vec();
        for row_idx in 0..n {
            let range = matrix.row_ptr()[row_idx]..matrix.row_ptr()[row_idx + 1];
            let scale = 1.0 / d[row_idx];
            for val in &mut data[range] {
                *val *= scale;
            }
        }
        let scaled = kryst::matrix::sparse::CsrMatrix::from_csr(
            n,
            n,
            matrix.row_ptr().to_vec(),
            matrix.col_idx().to_vec(),
            data,
        );
        let op = kryst::matrix::op::CsrOp::new(Arc::new(scaled));

        let mut bicgstab_solver =
            kryst::solver::bicgstab::BiCgStabSolver::new(self.tolerance, self.max_iterations);
        let mut workspace = kryst::context::ksp_context::Workspace::new(n);
        bicgstab_solver.setup_workspace(&mut workspace);

        let b: DVector<f64> = DVector::from_iterator(n, (0..n).map(|idx| rhs[idx] / d[idx]));
        let mut x = solution.clone();

        let stats = bicgstab_solver
            .solve(
                &op,
                None,
                b.as_slice(),
                x.as_mut_slice(),
                PcSide::Left,
                &UniverseComm::NoComm(NoComm {}),
                None,
                Some(&mut workspace),
            )
            .map_err(|e| SolverError::Krylov(format!("{e:?}")))?;

        if !x.iter().all(|val| val.is_finite()) {
            return Err(SolverError::NonFinite);
        }
        let iterations = stats.iterations as usize;
        let residual = relative_residual(matrix, &x, rhs);
        if residual > RESIDUAL_SLACK * self.tolerance {
            return Err(SolverError::NonConvergence {
                iterations,
                residual,
                tolerance: self.tolerance,
            });
        }
        log::trace!("bicgstab: {iterations} iterations, relative residual {residual:.3e}");

        *solution = x;
        Ok(LinearSolveStats {
            iterations,
            residual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::solver::DenseLu;
    use crate::numerics::sparse::SparseBuilder;

    fn upwind_chain(n: usize) -> SystemMatrix {
        let mut b = SparseBuilder::new(n);
        for i in 0..n {
            b.add(i, i, 1.5);
            if i > 0 {
                b.add(i, i - 1, -0.5);
            }
        }
        b.compress()
    }

    #[test]
    fn agrees_with_dense_lu() {
        let a = upwind_chain(20);
        let rhs = DVector::from_fn(20, |i, _| 1.0 + i as f64);
        let mut x_lu = DVector::zeros(20);
        DenseLu.solve(&a, &rhs, &mut x_lu).unwrap();
        let mut x = DVector::zeros(20);
        let stats = BiCgStab::new(1e-12, 500).solve(&a, &rhs, &mut x).unwrap();
        assert!(stats.residual < 1e-8);
        assert!((x - x_lu).amax() < 1e-8);
    }

    #[test]
    fn zero_rhs_gives_zero_solution() {
        let a = upwind_chain(4);
        let mut x = DVector::from_element(4, 3.0);
        BiCgStab::new(1e-10, 10).solve(&a, &DVector::zeros(4), &mut x).unwrap();
        assert_eq!(x.amax(), 0.0);
    }
}
