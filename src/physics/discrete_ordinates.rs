use nalgebra::{DMatrix, DVector};

use super::{scattering_density, CellBlocks, FaceGeometry, Formulation, InterfaceBlocks, SourceTerm};
use crate::equation::TransportProblem;
use crate::error::TransportResult;

/// First-order transport with full upwinding across faces.
///
/// Unknowns are angular fluxes per steradian, so angle-integrated sources are
/// divided by the total quadrature weight.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscreteOrdinates;

impl DiscreteOrdinates {
    /// Incoming angular flux on a boundary face: zero on vacuum boundaries,
    /// the lagged flux of the mirrored direction on reflective ones.
    fn inflow(
        problem: &TransportProblem<'_>,
        boundary_id: Option<u32>,
        cell_id: usize,
        direction: usize,
        group: usize,
        solutions: &[&DVector<f64>],
    ) -> TransportResult<f64> {
        match boundary_id {
            Some(id) if problem.quadrature.is_reflective(id) => {
                let reflected = problem.quadrature.reflected_direction(id, direction)?;
                Ok(solutions[problem.quadrature.index(reflected, group)][cell_id])
            }
            _ => Ok(0.0),
        }
    }
}

impl Formulation for DiscreteOrdinates {
    fn name(&self) -> &'static str {
        "discrete-ordinates"
    }

    fn integrate_cell(
        &self,
        problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        _direction: usize,
        group: usize,
    ) -> DMatrix<f64> {
        &cell.mass * problem.materials.get(cell.material_id).sigma_t[group]
    }

    fn integrate_boundary(
        &self,
        problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        face: &FaceGeometry,
        direction: usize,
        _group: usize,
    ) -> DMatrix<f64> {
        let mu = problem.quadrature.direction(direction).dot(face.normal);
        DMatrix::from_element(cell.dofs(), cell.dofs(), mu.max(0.0) * face.area)
    }

    fn integrate_boundary_source(
        &self,
        problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        face: &FaceGeometry,
        direction: usize,
        group: usize,
        solutions: &[&DVector<f64>],
    ) -> TransportResult<DVector<f64>> {
        let mu = problem.quadrature.direction(direction).dot(face.normal);
        if mu >= 0.0 {
            return Ok(DVector::zeros(cell.dofs()));
        }
        let psi_in = Self::inflow(problem, face.boundary_id, cell.cell_id, direction, group, solutions)?;
        Ok(DVector::from_element(cell.dofs(), -mu * face.area * psi_in))
    }

    fn supports_interface(&self) -> bool {
        true
    }

    fn integrate_interface(
        &self,
        problem: &TransportProblem<'_>,
        face_idx: usize,
        direction: usize,
        _group: usize,
    ) -> TransportResult<InterfaceBlocks> {
        let face = &problem.mesh.faces[face_idx];
        let n = glam::DVec3::from_array(face.normal);
        let mu = problem.quadrature.direction(direction).dot(n);
        let (out, inc) = (mu.max(0.0) * face.area, mu.min(0.0) * face.area);
        Ok(InterfaceBlocks::scalar(out, inc, -out, -inc))
    }

    fn integrate_scattering_source(
        &self,
        problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        _direction: usize,
        group: usize,
        moments: &[DVector<f64>],
    ) -> DVector<f64> {
        let density = scattering_density(problem, cell, group, moments, true);
        &cell.mass * density / problem.quadrature.total_weight()
    }

    fn integrate_fixed_source(
        &self,
        problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        _direction: usize,
        group: usize,
        source: SourceTerm<'_>,
        moments: &[DVector<f64>],
    ) -> DVector<f64> {
        let density = source.density(problem, cell, group, moments);
        &cell.mass * density / problem.quadrature.total_weight()
    }

    fn face_current(
        &self,
        problem: &TransportProblem<'_>,
        face_idx: usize,
        group: usize,
        solutions: &[&DVector<f64>],
    ) -> TransportResult<f64> {
        let face = &problem.mesh.faces[face_idx];
        let n = glam::DVec3::from_array(face.normal);
        let (first, second) = face.neighbor_cell_ids;
        let quadrature = problem.quadrature;
        let mut current = 0.0;
        for d in 0..quadrature.n_dir() {
            let mu = quadrature.direction(d).dot(n);
            let psi = if mu > 0.0 {
                solutions[quadrature.index(d, group)][first]
            } else {
                match second {
                    Some(e) => solutions[quadrature.index(d, group)][e],
                    None => Self::inflow(problem, face.boundary_id, first, d, group, solutions)?,
                }
            };
            current += quadrature.weight(d) * mu * psi;
        }
        Ok(current)
    }
}
