//! Assembly engine: one linear system per component for a chosen
//! formulation, plus the derived quantities the iterations need.

pub mod system;

use std::ops::Range;

use nalgebra::{DMatrix, DVector};

use crate::angular::{AngularQuadrature, ComponentIndex};
use crate::discretization::mesh::Mesh;
use crate::error::{TransportError, TransportResult};
use crate::numerics::comm::ExecutionContext;
use crate::numerics::solver::LinearSolver;
use crate::numerics::sparse::SparseBuilder;
use crate::numerics::timing::{record_assembly, record_linear_solve};
use crate::physics::bc::BoundaryConditions;
use crate::physics::materials::{Material, MaterialLibrary};
use crate::physics::{Formulation, SourceTerm};

pub use system::ComponentSystem;

/// Read-only problem data borrowed by every equation. The owners must
/// outlive all equations built on top of it.
#[derive(Clone, Copy)]
pub struct TransportProblem<'a> {
    pub mesh: &'a Mesh,
    pub quadrature: &'a AngularQuadrature,
    pub materials: &'a MaterialLibrary,
    pub boundaries: &'a BoundaryConditions,
    pub ctx: &'a ExecutionContext,
}

impl<'a> TransportProblem<'a> {
    pub fn new(
        mesh: &'a Mesh,
        quadrature: &'a AngularQuadrature,
        materials: &'a MaterialLibrary,
        boundaries: &'a BoundaryConditions,
        ctx: &'a ExecutionContext,
    ) -> Self {
        Self {
            mesh,
            quadrature,
            materials,
            boundaries,
            ctx,
        }
    }

    pub fn n_group(&self) -> usize {
        self.materials.n_group()
    }
}

/// A formulation bound to a problem, owning one [`ComponentSystem`] per
/// component. Cell-wise constant unknowns: one degree of freedom per cell.
pub struct Equation<'a> {
    name: String,
    problem: TransportProblem<'a>,
    formulation: Box<dyn Formulation>,
    index: ComponentIndex,
    systems: Vec<ComponentSystem>,
    eigen: bool,
    /// Per material, `χ ν σ_f / k` as `[g_in][g_out]`. Empty for fixed-source problems.
    fission: Vec<DMatrix<f64>>,
    solver: Box<dyn LinearSolver>,
}

impl<'a> Equation<'a> {
    pub fn new(
        name: impl Into<String>,
        formulation: Box<dyn Formulation>,
        problem: TransportProblem<'a>,
        n_group: usize,
        eigen: bool,
        solver: Box<dyn LinearSolver>,
    ) -> TransportResult<Self> {
        let name = name.into();
        if problem.materials.n_group() != n_group || problem.quadrature.n_group() != n_group {
            return Err(TransportError::config(format!(
                "{name}: {n_group} groups requested, materials have {}, quadrature has {}",
                problem.materials.n_group(),
                problem.quadrature.n_group()
            )));
        }
        problem
            .materials
            .check_ids(problem.mesh.cells.iter().map(|c| c.material_id))?;
        if let Some(id) = problem
            .boundaries
            .reflective_ids()
            .find(|&id| !problem.quadrature.is_reflective(id))
        {
            return Err(TransportError::config(format!(
                "{name}: quadrature has no reflection table for reflective boundary {id}"
            )));
        }
        if eigen && !problem.materials.any_fissile() {
            return Err(TransportError::config(format!(
                "{name}: eigenvalue problem without fissile material"
            )));
        }

        let n_dir = if formulation.owns_directions() {
            problem.quadrature.n_dir()
        } else {
            1
        };
        let fission = if eigen {
            problem.materials.iter().map(Material::fission_transfer).collect()
        } else {
            Vec::new()
        };
        Ok(Self {
            name,
            problem,
            formulation,
            index: ComponentIndex::new(n_dir, n_group),
            systems: Vec::new(),
            eigen,
            fission,
            solver,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn problem(&self) -> &TransportProblem<'a> {
        &self.problem
    }

    pub fn formulation(&self) -> &dyn Formulation {
        self.formulation.as_ref()
    }

    pub fn component_index(&self) -> &ComponentIndex {
        &self.index
    }

    pub fn n_group(&self) -> usize {
        self.index.n_group()
    }

    pub fn n_components(&self) -> usize {
        self.index.n_total_vars()
    }

    pub fn n_dofs(&self) -> usize {
        self.problem.mesh.n_cells()
    }

    pub fn is_eigen(&self) -> bool {
        self.eigen
    }

    pub fn system(&self, component: usize) -> &ComponentSystem {
        &self.systems[component]
    }

    pub fn systems(&self) -> &[ComponentSystem] {
        &self.systems
    }

    /// Scaled fission transfer matrices, one per material.
    pub fn fission_transfer(&self) -> &[DMatrix<f64>] {
        &self.fission
    }

    /// Size every component system and set the moments to a flat unit flux.
    ///
    /// Directional solutions start at `1 / W`, so they integrate to the
    /// initial moments.
    pub fn initialize_system(&mut self, moments: &mut [DVector<f64>]) -> TransportResult<()> {
        if moments.len() != self.n_group() {
            return Err(TransportError::config(format!(
                "{}: got {} moment vectors for {} groups",
                self.name,
                moments.len(),
                self.n_group()
            )));
        }
        let n = self.n_dofs();
        for moment in moments.iter_mut() {
            *moment = DVector::from_element(n, 1.0);
        }
        let initial = if self.formulation.owns_directions() {
            1.0 / self.problem.quadrature.total_weight()
        } else {
            1.0
        };
        self.systems = (0..self.n_components())
            .map(|_| ComponentSystem::new(n, initial))
            .collect();
        log::debug!(
            "{}: {} components x {} dofs ({})",
            self.name,
            self.n_components(),
            n,
            self.formulation.name()
        );
        Ok(())
    }

    fn check_initialized(&self) -> TransportResult<()> {
        if self.systems.is_empty() {
            return Err(TransportError::config(format!(
                "{}: initialize_system must be called first",
                self.name
            )));
        }
        Ok(())
    }

    fn check_group(&self, group: usize) -> TransportResult<()> {
        if group >= self.n_group() {
            return Err(TransportError::config(format!(
                "{}: group {group} out of range ({} groups)",
                self.name,
                self.n_group()
            )));
        }
        Ok(())
    }

    fn check_moments(&self, moments: &[DVector<f64>]) -> TransportResult<()> {
        let n = self.n_dofs();
        if moments.len() != self.n_group() || moments.iter().any(|m| m.len() != n) {
            return Err(TransportError::config(format!(
                "{}: moments must be {} vectors of length {n}",
                self.name,
                self.n_group()
            )));
        }
        Ok(())
    }

    /// Rebuild the matrices of all components.
    pub fn assemble_bilinear_form(&mut self) -> TransportResult<()> {
        self.check_initialized()?;
        let components = 0..self.n_components();
        record_assembly(|| self.assemble_components(components))
    }

    fn assemble_components(&mut self, components: Range<usize>) -> TransportResult<()> {
        let mut builders = self.volume_pass(components.clone());
        if self.problem.mesh.has_interior_faces() {
            self.interface_pass(components.clone(), &mut builders)?;
        }
        for (k, builder) in components.zip(builders) {
            self.systems[k].matrix = builder.compress();
        }
        Ok(())
    }

    /// Cell and local boundary terms. Pre-assembly runs once per owned cell
    /// and is shared by every component.
    fn volume_pass(&self, components: Range<usize>) -> Vec<SparseBuilder> {
        let n = self.n_dofs();
        let mesh = self.problem.mesh;
        let mut builders: Vec<SparseBuilder> = components.clone().map(|_| SparseBuilder::new(n)).collect();
        for &c in mesh.owned_cells() {
            let cell = self.formulation.pre_assemble_cell(&self.problem, c);
            let dofs = cell.dof_indices();
            for (builder, k) in builders.iter_mut().zip(components.clone()) {
                let (d, g) = self.index.component(k);
                let mut block = self.formulation.integrate_cell(&self.problem, &cell, d, g);
                if mesh.is_at_boundary(c) {
                    for face in cell.boundary_faces() {
                        block += self.formulation.integrate_boundary(&self.problem, &cell, face, d, g);
                    }
                }
                builder.add_block(&dofs, &dofs, &block);
            }
        }
        builders
    }

    /// Coupling across interior faces. Each face is assembled by the cell
    /// with the smaller id, into the rows of both cells.
    fn interface_pass(
        &self,
        components: Range<usize>,
        builders: &mut [SparseBuilder],
    ) -> TransportResult<()> {
        if !self.formulation.supports_interface() {
            return Err(TransportError::config(format!(
                "{}: formulation {} does not support interface assembly",
                self.name,
                self.formulation.name()
            )));
        }
        let mesh = self.problem.mesh;
        for &c in mesh.owned_cells() {
            for &f in &mesh.cells[c].face_ids {
                match mesh.neighbor(f, c) {
                    Some(other) if other > c => {}
                    _ => continue,
                }
                let (i, e) = match mesh.faces[f].neighbor_cell_ids {
                    (i, Some(e)) => ([i], [e]),
                    (_, None) => continue,
                };
                for (builder, k) in builders.iter_mut().zip(components.clone()) {
                    let (d, g) = self.index.component(k);
                    let blocks = self.formulation.integrate_interface(&self.problem, f, d, g)?;
                    builder.add_block(&i, &i, &blocks.vi_ui);
                    builder.add_block(&i, &e, &blocks.vi_ue);
                    builder.add_block(&e, &i, &blocks.ve_ui);
                    builder.add_block(&e, &e, &blocks.ve_ue);
                }
            }
        }
        Ok(())
    }

    /// Add interface terms to the current matrices.
    pub fn assemble_interface_bilinear_form(&mut self) -> TransportResult<()> {
        self.check_initialized()?;
        let mut builders: Vec<SparseBuilder> = self
            .systems
            .iter()
            .map(|s| SparseBuilder::from_matrix(&s.matrix))
            .collect();
        self.interface_pass(0..self.n_components(), &mut builders)?;
        for (system, builder) in self.systems.iter_mut().zip(builders) {
            system.matrix = builder.compress();
        }
        Ok(())
    }

    /// External source, or the scaled fission source of the current moments
    /// for eigenvalue problems.
    pub fn assemble_fixed_linear_form(&mut self, moments: &[DVector<f64>]) -> TransportResult<()> {
        self.check_initialized()?;
        self.check_moments(moments)?;
        let source = if self.eigen {
            SourceTerm::Fission(&self.fission)
        } else {
            SourceTerm::External
        };
        let n = self.n_dofs();
        let mut fixed = vec![DVector::zeros(n); self.n_components()];
        for &c in self.problem.mesh.owned_cells() {
            let cell = self.formulation.pre_assemble_cell(&self.problem, c);
            let dofs = cell.dof_indices();
            for (k, rhs) in fixed.iter_mut().enumerate() {
                let (d, g) = self.index.component(k);
                let local = self
                    .formulation
                    .integrate_fixed_source(&self.problem, &cell, d, g, source, moments);
                for (i, &dof) in dofs.iter().enumerate() {
                    rhs[dof] += local[i];
                }
            }
        }
        for (system, rhs) in self.systems.iter_mut().zip(fixed) {
            system.fixed_rhs = rhs;
        }
        Ok(())
    }

    /// `rhs = fixed_rhs + scattering + boundary sources` for the components
    /// of `group`.
    pub fn assemble_linear_form(&mut self, moments: &[DVector<f64>], group: usize) -> TransportResult<()> {
        self.check_initialized()?;
        self.check_group(group)?;
        self.check_moments(moments)?;
        let components = self.index.components_in_group(group);
        let mesh = self.problem.mesh;
        let solutions: Vec<&DVector<f64>> = self.systems.iter().map(|s| &s.solution).collect();
        let mut rhs: Vec<DVector<f64>> = components
            .clone()
            .map(|k| self.systems[k].fixed_rhs.clone())
            .collect();
        for &c in mesh.owned_cells() {
            let cell = self.formulation.pre_assemble_cell(&self.problem, c);
            let dofs = cell.dof_indices();
            for (r, k) in rhs.iter_mut().zip(components.clone()) {
                let d = self.index.direction_of(k);
                let mut local = self
                    .formulation
                    .integrate_scattering_source(&self.problem, &cell, d, group, moments);
                if mesh.is_at_boundary(c) {
                    for face in cell.boundary_faces() {
                        local += self.formulation.integrate_boundary_source(
                            &self.problem,
                            &cell,
                            face,
                            d,
                            group,
                            &solutions,
                        )?;
                    }
                }
                for (i, &dof) in dofs.iter().enumerate() {
                    r[dof] += local[i];
                }
            }
        }
        for (k, r) in components.zip(rhs) {
            self.systems[k].rhs = r;
        }
        Ok(())
    }

    /// One linear solve per component of `group`, starting from the current
    /// solution. Returns the summed linear iteration count.
    pub fn solve_in_group(&mut self, group: usize) -> TransportResult<usize> {
        self.check_initialized()?;
        self.check_group(group)?;
        let Self {
            systems,
            solver,
            index,
            name,
            ..
        } = self;
        let mut iterations = 0;
        for k in index.components_in_group(group) {
            let system = &mut systems[k];
            let stats = record_linear_solve(|| {
                solver.solve(&system.matrix, &system.rhs, &mut system.solution)
            })
            .map_err(|e| TransportError::SolverFailure {
                component: k,
                reason: e.to_string(),
            })?;
            iterations += stats.iterations;
        }
        log::trace!("{name}: group {group} solved with {iterations} linear iterations");
        Ok(iterations)
    }

    fn check_owns_directions(&self, what: &str) -> TransportResult<()> {
        if !self.formulation.owns_directions() {
            return Err(TransportError::config(format!(
                "{}: {what} is not defined for {}, it has no directional solutions",
                self.name,
                self.formulation.name()
            )));
        }
        Ok(())
    }

    /// `Σ_d w_d ψ_(d, group)`
    pub fn compute_group_moment(&self, group: usize) -> TransportResult<DVector<f64>> {
        self.check_owns_directions("moment generation")?;
        self.check_initialized()?;
        self.check_group(group)?;
        let quadrature = self.problem.quadrature;
        let mut moment = DVector::zeros(self.n_dofs());
        for k in self.index.components_in_group(group) {
            let d = self.index.direction_of(k);
            moment.axpy(quadrature.weight(d), &self.systems[k].solution, 1.0);
        }
        Ok(moment)
    }

    /// Replace `moment` with the moment of `group`; its old value goes to
    /// `previous`.
    pub fn generate_group_moment(
        &self,
        group: usize,
        moment: &mut DVector<f64>,
        previous: &mut DVector<f64>,
    ) -> TransportResult<()> {
        let updated = self.compute_group_moment(group)?;
        *previous = std::mem::replace(moment, updated);
        Ok(())
    }

    pub fn generate_moments(
        &self,
        moments: &mut [DVector<f64>],
        previous: &mut [DVector<f64>],
    ) -> TransportResult<()> {
        self.check_owns_directions("moment generation")?;
        if moments.len() != self.n_group() || previous.len() != self.n_group() {
            return Err(TransportError::config(format!(
                "{}: moment buffers must hold {} groups",
                self.name,
                self.n_group()
            )));
        }
        for (g, (moment, prev)) in moments.iter_mut().zip(previous.iter_mut()).enumerate() {
            self.generate_group_moment(g, moment, prev)?;
        }
        Ok(())
    }

    /// Solution of a low-order equation, which is the scalar flux itself.
    pub fn scalar_flux(&self, group: usize) -> TransportResult<&DVector<f64>> {
        if self.formulation.owns_directions() {
            return Err(TransportError::config(format!(
                "{}: scalar flux of a directional equation comes from moment generation",
                self.name
            )));
        }
        self.check_initialized()?;
        self.check_group(group)?;
        Ok(&self.systems[self.index.index(0, group)].solution)
    }

    fn check_eigen(&self, what: &str) -> TransportResult<()> {
        if !self.eigen {
            return Err(TransportError::config(format!(
                "{}: {what} requires an eigenvalue problem",
                self.name
            )));
        }
        Ok(())
    }

    /// `Σ ν σ_f,g φ_g V` over owned fissile cells, reduced over all workers.
    pub fn estimate_fission_source(&self, moments: &[DVector<f64>]) -> TransportResult<f64> {
        self.check_eigen("fission source estimation")?;
        self.check_moments(moments)?;
        let mesh = self.problem.mesh;
        let mut local = 0.0;
        for &c in mesh.owned_cells() {
            let cell = &mesh.cells[c];
            let material = self.problem.materials.get(cell.material_id);
            if !material.is_fissile() {
                continue;
            }
            for (g, phi) in moments.iter().enumerate() {
                local += material.nu_sigma_f(g) * phi[c] * cell.volume;
            }
        }
        self.problem.ctx.sum(local)
    }

    /// Rescale every material's fission transfer matrix by `1/k`.
    pub fn scale_fission_transfer(&mut self, keff: f64) -> TransportResult<()> {
        self.check_eigen("fission transfer scaling")?;
        if !(keff > 0.0 && keff.is_finite()) {
            return Err(TransportError::config(format!(
                "{}: cannot scale fission transfer by k = {keff}",
                self.name
            )));
        }
        self.fission = self
            .problem
            .materials
            .iter()
            .map(|m| m.fission_transfer() / keff)
            .collect();
        Ok(())
    }

    /// Net current through every face for `group`, along the face normal.
    pub fn face_currents(&self, group: usize) -> TransportResult<Vec<f64>> {
        self.check_initialized()?;
        self.check_group(group)?;
        let solutions: Vec<&DVector<f64>> = self.systems.iter().map(|s| &s.solution).collect();
        (0..self.problem.mesh.faces.len())
            .map(|f| {
                self.formulation
                    .face_current(&self.problem, f, group, &solutions)
            })
            .collect()
    }

    /// Update the low-order closure of `group` from the high-order equation
    /// and rebuild the matrices of that group.
    pub fn assemble_closure_bilinear_form(
        &mut self,
        high_order: &Equation<'_>,
        group: usize,
    ) -> TransportResult<()> {
        if self.formulation.owns_directions() {
            return Err(TransportError::config(format!(
                "{}: closure assembly needs a low-order formulation, got {}",
                self.name,
                self.formulation.name()
            )));
        }
        self.check_initialized()?;
        self.check_group(group)?;
        let currents = high_order.face_currents(group)?;
        let flux = high_order.compute_group_moment(group)?;
        self.formulation
            .update_closure(&self.problem, group, &currents, &flux)?;
        let components = self.index.components_in_group(group);
        record_assembly(|| self.assemble_components(components))
    }
}
