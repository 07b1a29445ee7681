use nalgebra::DVector;

use crate::numerics::sparse::SystemMatrix;

/// Linear system of a single component: `matrix * solution = rhs`.
///
/// `fixed_rhs` holds the part of the right-hand side that only changes once
/// per outer iteration; `rhs` is rebuilt from it before every solve.
#[derive(Clone, Debug)]
pub struct ComponentSystem {
    pub matrix: SystemMatrix,
    pub solution: DVector<f64>,
    pub rhs: DVector<f64>,
    pub fixed_rhs: DVector<f64>,
}

impl ComponentSystem {
    pub fn new(n_dofs: usize, initial: f64) -> Self {
        Self {
            matrix: SystemMatrix::empty(n_dofs),
            solution: DVector::from_element(n_dofs, initial),
            rhs: DVector::zeros(n_dofs),
            fixed_rhs: DVector::zeros(n_dofs),
        }
    }

    pub fn n_dofs(&self) -> usize {
        self.solution.len()
    }
}
