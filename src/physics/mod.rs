//! Transport formulations and the data they integrate.
//!
//! A [`Formulation`] is the strategy object the assembly engine calls into.
//! Only [`Formulation::integrate_cell`] and the two source integrators are
//! required; every other hook defaults to no contribution, or to a
//! configuration error where a silent no-op would produce a wrong system.

pub mod bc;
pub mod discrete_ordinates;
pub mod even_parity;
pub mod materials;
pub mod nda;

use glam::DVec3;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::equation::TransportProblem;
use crate::error::{TransportError, TransportResult};

pub use discrete_ordinates::DiscreteOrdinates;
pub use even_parity::EvenParity;
pub use nda::Nda;

/// Geometry of one face as seen from the cell being assembled.
#[derive(Clone, Debug)]
pub struct FaceGeometry {
    pub face_idx: usize,
    pub area: f64,
    /// Unit normal pointing out of the cell.
    pub normal: DVec3,
    /// Normal distance from the cell centroid to the face.
    pub distance: f64,
    pub neighbor: Option<usize>,
    pub boundary_id: Option<u32>,
}

/// Direction- and group-independent data of one cell, computed once and
/// reused for every component.
#[derive(Clone, Debug)]
pub struct CellBlocks {
    pub cell_id: usize,
    pub material_id: usize,
    pub volume: f64,
    /// Local mass matrix `∫ b_i b_j dV`.
    pub mass: DMatrix<f64>,
    pub faces: Vec<FaceGeometry>,
}

impl CellBlocks {
    /// Piecewise-constant basis: a single degree of freedom whose mass is the
    /// cell volume.
    pub fn new(problem: &TransportProblem<'_>, cell_id: usize) -> Self {
        let mesh = problem.mesh;
        let cell = &mesh.cells[cell_id];
        let faces = cell
            .face_ids
            .iter()
            .map(|&f| {
                let face = &mesh.faces[f];
                FaceGeometry {
                    face_idx: f,
                    area: face.area,
                    normal: mesh.outward_normal(f, cell_id),
                    distance: mesh.face_distance(f, cell_id),
                    neighbor: mesh.neighbor(f, cell_id),
                    boundary_id: face.boundary_id,
                }
            })
            .collect();
        Self {
            cell_id,
            material_id: cell.material_id,
            volume: cell.volume,
            mass: DMatrix::from_element(1, 1, cell.volume),
            faces,
        }
    }

    pub fn boundary_faces(&self) -> impl Iterator<Item = &FaceGeometry> {
        self.faces.iter().filter(|f| f.neighbor.is_none())
    }

    pub fn dofs(&self) -> usize {
        self.mass.nrows()
    }

    /// Global degrees of freedom of this cell.
    pub fn dof_indices(&self) -> Vec<usize> {
        let n = self.dofs();
        (self.cell_id * n..(self.cell_id + 1) * n).collect()
    }

    /// Restriction of a mesh-wide vector to this cell.
    pub fn local(&self, global: &DVector<f64>) -> DVector<f64> {
        let n = self.dofs();
        global.rows(self.cell_id * n, n).into_owned()
    }
}

/// Coupling blocks of one interior face. `i` is the first cell of the face
/// (the one its normal points away from), `e` the second; `v` is the test
/// side and `u` the trial side.
#[derive(Clone, Debug)]
pub struct InterfaceBlocks {
    pub vi_ui: DMatrix<f64>,
    pub vi_ue: DMatrix<f64>,
    pub ve_ui: DMatrix<f64>,
    pub ve_ue: DMatrix<f64>,
}

impl InterfaceBlocks {
    pub fn scalar(vi_ui: f64, vi_ue: f64, ve_ui: f64, ve_ue: f64) -> Self {
        let m = |v| DMatrix::from_element(1, 1, v);
        Self {
            vi_ui: m(vi_ui),
            vi_ue: m(vi_ue),
            ve_ui: m(ve_ui),
            ve_ue: m(ve_ue),
        }
    }
}

/// What the fixed linear form integrates.
#[derive(Clone, Copy, Debug)]
pub enum SourceTerm<'s> {
    /// Material external sources.
    External,
    /// Fission transfer matrices `[g_in][g_out]`, one per material, already
    /// scaled by `1/k`, applied to the current moments.
    Fission(&'s [DMatrix<f64>]),
}

impl SourceTerm<'_> {
    /// Angle-integrated emission density into group `g` at `cell`.
    pub fn density(
        &self,
        problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        group: usize,
        moments: &[DVector<f64>],
    ) -> DVector<f64> {
        match self {
            SourceTerm::External => {
                let q = problem.materials.get(cell.material_id).source(group);
                DVector::from_element(cell.dofs(), q)
            }
            SourceTerm::Fission(transfer) => {
                let t = &transfer[cell.material_id];
                moments
                    .iter()
                    .enumerate()
                    .fold(DVector::zeros(cell.dofs()), |acc, (g_in, phi)| {
                        acc + cell.local(phi) * t[(g_in, group)]
                    })
            }
        }
    }
}

/// Angle-integrated scattering density into `group`, optionally leaving out
/// the within-group term.
pub(crate) fn scattering_density(
    problem: &TransportProblem<'_>,
    cell: &CellBlocks,
    group: usize,
    moments: &[DVector<f64>],
    include_self: bool,
) -> DVector<f64> {
    let material = problem.materials.get(cell.material_id);
    moments
        .iter()
        .enumerate()
        .filter(|(g_in, _)| include_self || *g_in != group)
        .fold(DVector::zeros(cell.dofs()), |acc, (g_in, phi)| {
            acc + cell.local(phi) * material.scatter(g_in, group)
        })
}

pub trait Formulation {
    fn name(&self) -> &'static str;

    /// False for low-order formulations that carry one scalar unknown per
    /// group instead of one angular unknown per direction.
    fn owns_directions(&self) -> bool {
        true
    }

    fn pre_assemble_cell(&self, problem: &TransportProblem<'_>, cell_id: usize) -> CellBlocks {
        CellBlocks::new(problem, cell_id)
    }

    /// Streaming and collision operator of one cell.
    fn integrate_cell(
        &self,
        problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        direction: usize,
        group: usize,
    ) -> DMatrix<f64>;

    /// Matrix contribution of one boundary face of `cell`.
    fn integrate_boundary(
        &self,
        _problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        _face: &FaceGeometry,
        _direction: usize,
        _group: usize,
    ) -> DMatrix<f64> {
        DMatrix::zeros(cell.dofs(), cell.dofs())
    }

    /// Right-hand-side contribution of one boundary face. `solutions` holds
    /// the current solution of every component of the equation.
    fn integrate_boundary_source(
        &self,
        _problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        _face: &FaceGeometry,
        _direction: usize,
        _group: usize,
        _solutions: &[&DVector<f64>],
    ) -> TransportResult<DVector<f64>> {
        Ok(DVector::zeros(cell.dofs()))
    }

    fn supports_interface(&self) -> bool {
        false
    }

    fn integrate_interface(
        &self,
        _problem: &TransportProblem<'_>,
        face_idx: usize,
        _direction: usize,
        _group: usize,
    ) -> TransportResult<InterfaceBlocks> {
        Err(TransportError::config(format!(
            "{} does not support interface assembly (face {face_idx})",
            self.name()
        )))
    }

    fn integrate_scattering_source(
        &self,
        problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        direction: usize,
        group: usize,
        moments: &[DVector<f64>],
    ) -> DVector<f64>;

    fn integrate_fixed_source(
        &self,
        problem: &TransportProblem<'_>,
        cell: &CellBlocks,
        direction: usize,
        group: usize,
        source: SourceTerm<'_>,
        moments: &[DVector<f64>],
    ) -> DVector<f64>;

    /// Net particle current through `face_idx` along the face normal.
    fn face_current(
        &self,
        _problem: &TransportProblem<'_>,
        _face_idx: usize,
        _group: usize,
        _solutions: &[&DVector<f64>],
    ) -> TransportResult<f64> {
        Err(TransportError::config(format!(
            "{} does not provide face currents",
            self.name()
        )))
    }

    /// Refresh closure coefficients of `group` from high-order face currents
    /// and the high-order scalar flux.
    fn update_closure(
        &mut self,
        _problem: &TransportProblem<'_>,
        _group: usize,
        _currents: &[f64],
        _flux: &DVector<f64>,
    ) -> TransportResult<()> {
        Err(TransportError::config(format!(
            "{} has no closure to update",
            self.name()
        )))
    }
}

/// High-order formulations selectable from a run configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormulationKind {
    #[default]
    DiscreteOrdinates,
    EvenParity,
}

impl FormulationKind {
    pub fn build(self) -> Box<dyn Formulation> {
        match self {
            FormulationKind::DiscreteOrdinates => Box::new(DiscreteOrdinates),
            FormulationKind::EvenParity => Box::new(EvenParity),
        }
    }
}
