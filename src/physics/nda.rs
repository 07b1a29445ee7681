use nalgebra::{DMatrix, DVector};

use super::{scattering_density, CellBlocks, FaceGeometry, Formulation, InterfaceBlocks, SourceTerm};
use crate::equation::TransportProblem;
use crate::error::{TransportError, TransportResult};

/// Boundary current-to-flux ratio used on vacuum faces before the first
/// closure update.
const MARSHAK_KAPPA: f64 = 0.5;

/// Nonlinear diffusion acceleration: a low-order diffusion equation per group
/// whose face currents are corrected so that they reproduce the high-order
/// transport currents.
///
/// Interior faces carry `J = -D (φ_e - φ_i) / d + D̂ (φ_i + φ_e)` and boundary
/// faces `J = κ φ_i`. The drift coefficients `D̂` and `κ` come from
/// [`Formulation::update_closure`].
#[derive(Clone, Debug)]
pub struct Nda {
    drift: Vec<Vec<f64>>,
    kappa: Vec<Vec<f64>>,
}

impl Nda {
    pub fn new(problem: &TransportProblem<'_>) -> Self {
        let n_group = problem.materials.n_group();
        let kappa_face: Vec<f64> = problem
            .mesh
            .faces
            .iter()
            .map(|face| match face.boundary_id {
                Some(id) if problem.boundaries.is_reflective(id) => 0.0,
                Some(_) => MARSHAK_KAPPA,
                None => 0.0,
            })
            .collect();
        Self {
            drift: vec![vec![0.0; problem.mesh.faces.len()]; n_group],
            kappa: vec![kappa_face; n_group],
        }
    }

    pub fn drift(&self, group: usize, face_idx: usize) -> f64 {
        self.drift[group][face_idx]
    }

    pub fn kappa(&self, group: usize, face_idx: usize) -> f64 {
        self.kappa[group][face_idx]
    }

    /// `D / d` of an interior face per unit area, with the diffusion
    /// coefficients of both cells combined in series.
    fn conductance(problem: &TransportProblem<'_>, face_idx: usize, group: usize) -> f64 {
        let mesh = problem.mesh;
        let (i, e) = match mesh.faces[face_idx].neighbor_cell_ids {
            (i, Some(e)) => (i, e),
            (i, None) => (i, i),
        };
        let diffusion = |c: usize| {
            1.0 / (3.0 * problem.materials.get(mesh.cells[c].material_id).sigma_t[group])
        };
        1.0 / (mesh.face_distance(face_idx, i) / diffusion(i)
            + mesh.face_distance(face_idx, e) / diffusion(e))
    }
}

impl Formulation for Nda {
    fn name(&self) -> &'static str {
        "nda"
    }

    fn owns_directions(&self) -> bool {
        false
    }

    fn integrate_cell(
        &self,
        problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        _direction: usize,
        group: usize,
    ) -> DMatrix<f64> {
        &cell.mass * problem.materials.get(cell.material_id).removal(group)
    }

    fn integrate_boundary(
        &self,
        _problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        face: &FaceGeometry,
        _direction: usize,
        group: usize,
    ) -> DMatrix<f64> {
        let value = face.area * self.kappa[group][face.face_idx];
        DMatrix::from_element(cell.dofs(), cell.dofs(), value)
    }

    fn supports_interface(&self) -> bool {
        true
    }

    fn integrate_interface(
        &self,
        problem: &TransportProblem<'_>,
        face_idx: usize,
        _direction: usize,
        group: usize,
    ) -> TransportResult<InterfaceBlocks> {
        let area = problem.mesh.faces[face_idx].area;
        let diffusion = area * Self::conductance(problem, face_idx, group);
        let drift = area * self.drift[group][face_idx];
        Ok(InterfaceBlocks::scalar(
            diffusion + drift,
            -diffusion + drift,
            -diffusion - drift,
            diffusion - drift,
        ))
    }

    fn integrate_scattering_source(
        &self,
        problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        _direction: usize,
        group: usize,
        moments: &[DVector<f64>],
    ) -> DVector<f64> {
        &cell.mass * scattering_density(problem, cell, group, moments, false)
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
        &cell.mass * source.density(problem, cell, group, moments)
    }

    fn update_closure(
        &mut self,
        problem: &TransportProblem<'_>,
        group: usize,
        currents: &[f64],
        flux: &DVector<f64>,
    ) -> TransportResult<()> {
        let mesh = problem.mesh;
        if currents.len() != mesh.faces.len() || flux.len() != mesh.n_cells() {
            return Err(TransportError::config(format!(
                "closure update got {} currents and {} fluxes for {} faces and {} cells",
                currents.len(),
                flux.len(),
                mesh.faces.len(),
                mesh.n_cells()
            )));
        }
        for (f, face) in mesh.faces.iter().enumerate() {
            let current = currents[f];
            match face.neighbor_cell_ids {
                (i, Some(e)) => {
                    let sum = flux[i] + flux[e];
                    self.drift[group][f] = if sum != 0.0 {
                        (current + Self::conductance(problem, f, group) * (flux[e] - flux[i])) / sum
                    } else {
                        0.0
                    };
                }
                (i, None) => {
                    self.kappa[group][f] = if flux[i] != 0.0 { current / flux[i] } else { 0.0 };
                }
            }
        }
        Ok(())
    }
}
