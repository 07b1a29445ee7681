use nalgebra::{DMatrix, DVector};

use super::{scattering_density, CellBlocks, FaceGeometry, Formulation, InterfaceBlocks, SourceTerm};
use crate::equation::TransportProblem;
use crate::error::TransportResult;

/// Directions with `(Ω·n)²` below this see no coupling through the face.
const GRAZING_MU2: f64 = 1e-14;

/// Second-order even-parity transport: a directional diffusion operator with
/// coefficient `(Ω·n)² / σ_t` per direction.
///
/// The operator is symmetric. Reflective boundaries are natural and add
/// nothing; vacuum boundaries use a Marshak-type conductance in series with
/// the half-cell resistance.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvenParity;

impl Formulation for EvenParity {
    fn name(&self) -> &'static str {
        "even-parity"
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
        group: usize,
    ) -> DMatrix<f64> {
        let reflective = face
            .boundary_id
            .is_some_and(|id| problem.boundaries.is_reflective(id));
        let mu = problem.quadrature.direction(direction).dot(face.normal);
        let mu2 = mu * mu;
        let value = if reflective || mu2 < GRAZING_MU2 {
            0.0
        } else {
            let sigma_t = problem.materials.get(cell.material_id).sigma_t[group];
            face.area / (face.distance * sigma_t / mu2 + 1.0 / mu.abs())
        };
        DMatrix::from_element(cell.dofs(), cell.dofs(), value)
    }

    fn supports_interface(&self) -> bool {
        true
    }

    fn integrate_interface(
        &self,
        problem: &TransportProblem<'_>,
        face_idx: usize,
        direction: usize,
        group: usize,
    ) -> TransportResult<InterfaceBlocks> {
        let mesh = problem.mesh;
        let face = &mesh.faces[face_idx];
        let n = glam::DVec3::from_array(face.normal);
        let mu = problem.quadrature.direction(direction).dot(n);
        let mu2 = mu * mu;
        if mu2 < GRAZING_MU2 {
            return Ok(InterfaceBlocks::scalar(0.0, 0.0, 0.0, 0.0));
        }
        let (i, e) = match face.neighbor_cell_ids {
            (i, Some(e)) => (i, e),
            (i, None) => (i, i),
        };
        let sigma = |c: usize| problem.materials.get(mesh.cells[c].material_id).sigma_t[group];
        // half-cell resistances in series, i.e. a distance-weighted mean σ_t
        let resistance =
            mesh.face_distance(face_idx, i) * sigma(i) + mesh.face_distance(face_idx, e) * sigma(e);
        let c = face.area * mu2 / resistance;
        Ok(InterfaceBlocks::scalar(c, -c, -c, c))
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angular::{AngularQuadrature, QuadratureRule};
    use crate::discretization::generator::{create_slab_mesh, X_MAX, X_MIN};
    use crate::discretization::mesh::Mesh;
    use crate::numerics::comm::ExecutionContext;
    use crate::physics::bc::BoundaryConditions;
    use crate::physics::materials::{Material, MaterialLibrary};

    fn two_material_slab() -> (Mesh, AngularQuadrature, MaterialLibrary) {
        let mut mesh = create_slab_mesh(&[0.0, 1.0, 3.0], 1.0);
        mesh.assign_materials(|c| usize::from(c[0] > 1.0));
        let quadrature = AngularQuadrature::new(QuadratureRule::GaussLegendre, 2, 1).unwrap();
        let materials = MaterialLibrary::new(
            1,
            vec![
                Material::new("a", vec![1.0], vec![vec![0.0]]),
                Material::new("b", vec![2.0], vec![vec![0.0]]),
            ],
        )
        .unwrap();
        (mesh, quadrature, materials)
    }

    #[test]
    fn interface_coupling_is_symmetric_and_distance_weighted() {
        let (mesh, quadrature, materials) = two_material_slab();
        let (bcs, ctx) = (BoundaryConditions::all_vacuum(), ExecutionContext::serial());
        let p = TransportProblem::new(&mesh, &quadrature, &materials, &bcs, &ctx);
        let face = (0..mesh.faces.len())
            .find(|&f| mesh.faces[f].neighbor_cell_ids == (0, Some(1)) && mesh.faces[f].normal[0] > 0.5)
            .unwrap();
        let b = EvenParity.integrate_interface(&p, face, 1, 0).unwrap();
        // A mu^2 / (0.5 * 1 + 1 * 2)
        let expected = (1.0 / 3.0) / 2.5;
        assert!((b.vi_ui[(0, 0)] - expected).abs() < 1e-14);
        assert_eq!(b.vi_ue, b.ve_ui);
        assert_eq!(b.vi_ui[(0, 0)] + b.vi_ue[(0, 0)], 0.0);
    }

    #[test]
    fn reflective_boundary_is_natural() {
        let (mesh, quadrature, materials) = two_material_slab();
        let bcs = BoundaryConditions::reflective([X_MIN]);
        let ctx = ExecutionContext::serial();
        let p = TransportProblem::new(&mesh, &quadrature, &materials, &bcs, &ctx);
        let cell = EvenParity.pre_assemble_cell(&p, 0);
        let left = cell.boundary_faces().find(|f| f.boundary_id == Some(X_MIN)).unwrap();
        assert_eq!(EvenParity.integrate_boundary(&p, &cell, left, 0, 0)[(0, 0)], 0.0);

        let cell = EvenParity.pre_assemble_cell(&p, 1);
        let right = cell.boundary_faces().find(|f| f.boundary_id == Some(X_MAX)).unwrap();
        let mu2 = 1.0 / 3.0;
        let expected = 1.0 / (1.0 * 2.0 / mu2 + 3f64.sqrt());
        assert!((EvenParity.integrate_boundary(&p, &cell, right, 0, 0)[(0, 0)] - expected).abs() < 1e-14);
    }

    #[test]
    fn grazing_directions_do_not_couple_transverse_faces() {
        let (mesh, quadrature, materials) = two_material_slab();
        let (bcs, ctx) = (BoundaryConditions::all_vacuum(), ExecutionContext::serial());
        let p = TransportProblem::new(&mesh, &quadrature, &materials, &bcs, &ctx);
        let cell = EvenParity.pre_assemble_cell(&p, 0);
        let transverse = cell.boundary_faces().find(|f| f.normal.x.abs() < 0.5).unwrap();
        assert_eq!(EvenParity.integrate_boundary(&p, &cell, transverse, 0, 0)[(0, 0)], 0.0);
    }
}
