//! Builds a problem from a [`RunConfig`] and runs it to completion.

use std::time::Instant;

use nalgebra::DVector;

use crate::angular::AngularQuadrature;
use crate::config::{ProblemKind, RunConfig};
use crate::discretization::mesh::Mesh;
use crate::equation::{Equation, TransportProblem};
use crate::error::TransportResult;
use crate::iteration::{
    EigenSolution, EquationSet, FixedSourceSolver, InGroupIterator, MultigroupIterator,
    MultigroupReport, PowerIteration,
};
use crate::numerics::comm::ExecutionContext;
use crate::numerics::timing;
use crate::physics::bc::BoundaryConditions;
use crate::physics::materials::MaterialLibrary;
use crate::physics::nda::Nda;

/// Owned problem data. Equations borrow from it through [`ProblemData::problem`].
pub struct ProblemData {
    pub mesh: Mesh,
    pub quadrature: AngularQuadrature,
    pub materials: MaterialLibrary,
    pub boundaries: BoundaryConditions,
    pub ctx: ExecutionContext,
}

impl ProblemData {
    pub fn from_config(config: &RunConfig) -> TransportResult<Self> {
        Self::with_context(config, ExecutionContext::serial())
    }

    pub fn with_context(config: &RunConfig, ctx: ExecutionContext) -> TransportResult<Self> {
        config.validate()?;
        let mesh = config.build_mesh()?;
        let materials = config.material_library()?;
        let boundaries = config.boundaries.clone();
        let quadrature = AngularQuadrature::new(
            config.quadrature.rule,
            config.quadrature.order,
            config.n_group,
        )?
        .with_reflective_boundaries(&boundaries, &mesh.boundary_normals())?;
        Ok(Self {
            mesh,
            quadrature,
            materials,
            boundaries,
            ctx,
        })
    }

    pub fn problem(&self) -> TransportProblem<'_> {
        TransportProblem::new(
            &self.mesh,
            &self.quadrature,
            &self.materials,
            &self.boundaries,
            &self.ctx,
        )
    }
}

/// High-order equation, plus the diffusion companion when acceleration is on.
pub fn build_equations<'a>(
    config: &RunConfig,
    problem: TransportProblem<'a>,
) -> TransportResult<EquationSet<'a>> {
    let eigen = config.problem == ProblemKind::Eigenvalue;
    let high_order = Equation::new(
        "transport",
        config.formulation.build(),
        problem,
        config.n_group,
        eigen,
        config.linear_solver.build(),
    )?;
    let set = EquationSet::new(high_order)?;
    if !config.acceleration {
        return Ok(set);
    }
    let low_order = Equation::new(
        "diffusion",
        Box::new(Nda::new(&problem)),
        problem,
        config.n_group,
        eigen,
        config.linear_solver.build(),
    )?;
    set.with_low_order(low_order)
}

pub fn multigroup_iterator(config: &RunConfig) -> MultigroupIterator {
    let it = &config.iteration;
    MultigroupIterator::new(
        InGroupIterator::new(it.in_group, it.max_in_group_iterations),
        it.multigroup,
        it.max_sweeps,
    )
}

#[derive(Clone, Debug)]
pub enum Outcome {
    FixedSource(MultigroupReport),
    Eigenvalue(EigenSolution),
}

impl Outcome {
    pub fn keff(&self) -> Option<f64> {
        match self {
            Outcome::Eigenvalue(solution) => Some(solution.keff),
            Outcome::FixedSource(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunResult {
    pub outcome: Outcome,
    /// Scalar flux per group, one value per cell.
    pub moments: Vec<DVector<f64>>,
}

/// Solve an already built problem.
pub fn solve(config: &RunConfig, data: &ProblemData) -> TransportResult<RunResult> {
    let mut equations = build_equations(config, data.problem())?;
    let mut moments = vec![DVector::zeros(0); config.n_group];
    let multigroup = multigroup_iterator(config);

    let outcome = match config.problem {
        ProblemKind::FixedSource => {
            Outcome::FixedSource(FixedSourceSolver::new(multigroup).solve(&mut equations, &mut moments)?)
        }
        ProblemKind::Eigenvalue => {
            let it = &config.iteration;
            let mut power =
                PowerIteration::new(multigroup, it.k_tolerance, it.flux, it.max_power_iterations)
                    .with_fatal_multigroup(it.fatal_multigroup);
            Outcome::Eigenvalue(power.solve(&mut equations, &mut moments)?)
        }
    };
    Ok(RunResult { outcome, moments })
}

pub fn run(config: &RunConfig) -> TransportResult<RunResult> {
    let start = Instant::now();
    timing::reset_timing();
    let data = ProblemData::from_config(config)?;
    if data.ctx.is_root() {
        log::info!(
            "{} cells, {} directions, {} groups, {:?}{}",
            data.mesh.n_cells(),
            data.quadrature.n_dir(),
            config.n_group,
            config.formulation,
            if config.acceleration { " + diffusion acceleration" } else { "" }
        );
    }
    let result = solve(config, &data)?;
    timing::finalize_and_print(start.elapsed());
    Ok(result)
}
