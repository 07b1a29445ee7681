use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::numerics::krylov::BiCgStab;
use crate::numerics::sparse::SystemMatrix;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("matrix is singular")]
    Singular,
    #[error("dimension mismatch: matrix is {matrix}x{matrix}, vector has {vector} entries")]
    DimensionMismatch { matrix: usize, vector: usize },
    #[error("solution contains NaN or Inf")]
    NonFinite,
    #[error("Krylov solver failed: {0}")]
    Krylov(String),
    #[error("residual {residual:.3e} above tolerance {tolerance:.3e} after {iterations} iterations")]
    NonConvergence {
        iterations: usize,
        residual: f64,
        tolerance: f64,
    },
}

/// Outcome of a successful linear solve.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LinearSolveStats {
    pub iterations: usize,
    /// Relative residual `|b - A x| / |b|` of the returned solution.
    pub residual: f64,
}

/// Solves `A x = b` for one component system.
///
/// `solution` holds the initial guess on entry and the solution on exit.
pub trait LinearSolver {
    fn name(&self) -> &'static str;

    fn solve(
        &mut self,
        matrix: &SystemMatrix,
        rhs: &DVector<f64>,
        solution: &mut DVector<f64>,
    ) -> Result<LinearSolveStats, SolverError>;
}

pub(crate) fn check_dimensions(
    matrix: &SystemMatrix,
    rhs: &DVector<f64>,
    solution: &DVector<f64>,
) -> Result<(), SolverError> {
    for len in [rhs.len(), solution.len()] {
        if len != matrix.n() {
            return Err(SolverError::DimensionMismatch {
                matrix: matrix.n(),
                vector: len,
            });
        }
    }
    Ok(())
}

pub(crate) fn relative_residual(matrix: &SystemMatrix, x: &DVector<f64>, b: &DVector<f64>) -> f64 {
    let r = matrix.residual(x, b).norm();
    let b_norm = b.norm();
    if b_norm > 0.0 { r / b_norm } else { r }
}

/// Direct solve through a dense LU factorisation. Meant for small systems
/// and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenseLu;

impl LinearSolver for DenseLu {
    fn name(&self) -> &'static str {
        "dense-lu"
    }

    fn solve(
        &mut self,
        matrix: &SystemMatrix,
        rhs: &DVector<f64>,
        solution: &mut DVector<f64>,
    ) -> Result<LinearSolveStats, SolverError> {
        check_dimensions(matrix, rhs, solution)?;
        let x = matrix.to_dense().lu().solve(rhs).ok_or(SolverError::Singular)?;
        if !x.iter().all(|v| v.is_finite()) {
            return Err(SolverError::NonFinite);
        }
        *solution = x;
        Ok(LinearSolveStats {
            iterations: 1,
            residual: relative_residual(matrix, solution, rhs),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinearSolverKind {
    DenseLu,
    #[default]
    BiCgStab,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearSolverConfig {
    #[serde(default)]
    pub kind: LinearSolverKind,
    #[serde(default = "default_linear_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_linear_max_iterations")]
    pub max_iterations: usize,
}

fn default_linear_tolerance() -> f64 {
    1e-10
}

fn default_linear_max_iterations() -> usize {
    2000
}

impl Default for LinearSolverConfig {
    fn default() -> Self {
        Self {
            kind: LinearSolverKind::default(),
            tolerance: default_linear_tolerance(),
            max_iterations: default_linear_max_iterations(),
        }
    }
}

impl LinearSolverConfig {
    pub fn build(&self) -> Box<dyn LinearSolver> {
        match self.kind {
            LinearSolverKind::DenseLu => Box::new(DenseLu),
            LinearSolverKind::BiCgStab => Box::new(BiCgStab::new(self.tolerance, self.max_iterations)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::sparse::SparseBuilder;
    use nalgebra::DMatrix;

    fn tridiagonal(n: usize) -> SystemMatrix {
        let mut b = SparseBuilder::new(n);
        for i in 0..n {
            b.add(i, i, 4.0);
            if i + 1 < n {
                b.add_block(&[i, i + 1], &[i, i + 1], &DMatrix::from_row_slice(2, 2, &[0.0, -1.0, -1.0, 0.0]));
            }
        }
        b.compress()
    }

    #[test]
    fn dense_lu_solves_tridiagonal_system() {
        let a = tridiagonal(6);
        let rhs = DVector::from_element(6, 1.0);
        let mut x = DVector::zeros(6);
        let stats = DenseLu.solve(&a, &rhs, &mut x).unwrap();
        assert!(stats.residual < 1e-12);
    }

    #[test]
    fn singular_matrix_is_reported() {
        let a = SparseBuilder::new(2).compress();
        let mut x = DVector::zeros(2);
        let err = DenseLu.solve(&a, &DVector::from_element(2, 1.0), &mut x).unwrap_err();
        assert!(matches!(err, SolverError::Singular));
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let a = tridiagonal(3);
        let mut x = DVector::zeros(2);
        let err = DenseLu.solve(&a, &DVector::zeros(3), &mut x).unwrap_err();
        assert!(matches!(err, SolverError::DimensionMismatch { matrix: 3, vector: 2 }));
    }
}
