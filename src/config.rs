//! Run configuration, loadable from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::angular::QuadratureRule;
use crate::discretization::generator::{create_box_mesh, create_slab_mesh, create_tensor_mesh};
use crate::discretization::mesh::Mesh;
use crate::error::{TransportError, TransportResult};
use crate::numerics::solver::LinearSolverConfig;
use crate::numerics::Convergence;
use crate::physics::bc::BoundaryConditions;
use crate::physics::materials::{Material, MaterialLibrary};
use crate::physics::FormulationKind;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProblemKind {
    #[default]
    FixedSource,
    Eigenvalue,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MeshConfig {
    /// One cell thick along y and z.
    Slab {
        edges: Vec<f64>,
        #[serde(default = "default_transverse")]
        transverse: f64,
    },
    Box {
        extent: [f64; 3],
        divisions: [usize; 3],
    },
    Tensor {
        xs: Vec<f64>,
        ys: Vec<f64>,
        zs: Vec<f64>,
    },
}

fn default_transverse() -> f64 {
    1.0
}

fn check_edges(axis: &str, edges: &[f64]) -> TransportResult<()> {
    if edges.len() < 2 || edges.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(TransportError::config(format!(
            "{axis} edges must be strictly increasing with at least two entries"
        )));
    }
    Ok(())
}

impl MeshConfig {
    pub fn build(&self) -> TransportResult<Mesh> {
        match self {
            MeshConfig::Slab { edges, transverse } => {
                check_edges("x", edges)?;
                if *transverse <= 0.0 {
                    return Err(TransportError::config("slab transverse size must be positive"));
                }
                Ok(create_slab_mesh(edges, *transverse))
            }
            MeshConfig::Box { extent, divisions } => {
                if extent.iter().any(|&e| e <= 0.0) || divisions.iter().any(|&n| n == 0) {
                    return Err(TransportError::config(
                        "box extent and divisions must be positive",
                    ));
                }
                Ok(create_box_mesh(*extent, *divisions))
            }
            MeshConfig::Tensor { xs, ys, zs } => {
                check_edges("x", xs)?;
                check_edges("y", ys)?;
                check_edges("z", zs)?;
                Ok(create_tensor_mesh(xs, ys, zs))
            }
        }
    }
}

/// Axis-aligned box of cells (by centroid) made of one material. Later
/// regions override earlier ones; unlisted cells use material 0.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialRegion {
    pub material: usize,
    pub lower: [f64; 3],
    pub upper: [f64; 3],
}

impl MaterialRegion {
    pub fn contains(&self, point: [f64; 3]) -> bool {
        (0..3).all(|a| point[a] >= self.lower[a] && point[a] <= self.upper[a])
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuadratureConfig {
    pub rule: QuadratureRule,
    pub order: usize,
}

impl Default for QuadratureConfig {
    fn default() -> Self {
        Self {
            rule: QuadratureRule::GaussLegendre,
            order: 8,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IterationConfig {
    pub in_group: Convergence,
    pub max_in_group_iterations: usize,
    pub multigroup: Convergence,
    pub max_sweeps: usize,
    pub k_tolerance: f64,
    pub flux: Convergence,
    pub max_power_iterations: usize,
    /// Treat multigroup non-convergence inside power iteration as fatal.
    pub fatal_multigroup: bool,
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            in_group: Convergence::relative(1e-8),
            max_in_group_iterations: 1000,
            multigroup: Convergence::relative(1e-7),
            max_sweeps: 200,
            k_tolerance: 1e-7,
            flux: Convergence::relative(1e-5),
            max_power_iterations: 500,
            fatal_multigroup: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub problem: ProblemKind,
    pub mesh: MeshConfig,
    #[serde(default)]
    pub quadrature: QuadratureConfig,
    #[serde(default)]
    pub formulation: FormulationKind,
    /// Accelerate the high-order solve with a low-order diffusion closure.
    #[serde(default)]
    pub acceleration: bool,
    pub n_group: usize,
    pub materials: Vec<Material>,
    #[serde(default)]
    pub regions: Vec<MaterialRegion>,
    #[serde(default)]
    pub boundaries: BoundaryConditions,
    #[serde(default)]
    pub linear_solver: LinearSolverConfig,
    #[serde(default)]
    pub iteration: IterationConfig,
}

impl RunConfig {
    pub fn from_file(path: impl AsRef<Path>) -> TransportResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> TransportResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks everything that can be checked without building the problem.
    pub fn validate(&self) -> TransportResult<()> {
        if self.n_group == 0 {
            return Err(TransportError::config("n_group must be positive"));
        }
        self.material_library()?;
        if let Some(r) = self.regions.iter().find(|r| r.material >= self.materials.len()) {
            return Err(TransportError::config(format!(
                "region refers to material {}, only {} defined",
                r.material,
                self.materials.len()
            )));
        }
        if self.acceleration && self.formulation != FormulationKind::DiscreteOrdinates {
            return Err(TransportError::config(
                "acceleration needs face currents, only discrete-ordinates provides them",
            ));
        }
        if self.problem == ProblemKind::Eigenvalue && !self.materials.iter().any(Material::is_fissile) {
            return Err(TransportError::config("eigenvalue problem without fissile material"));
        }
        Ok(())
    }

    pub fn material_library(&self) -> TransportResult<MaterialLibrary> {
        MaterialLibrary::new(self.n_group, self.materials.clone())
    }

    /// Builds the mesh and assigns materials from the regions.
    pub fn build_mesh(&self) -> TransportResult<Mesh> {
        let mut mesh = self.mesh.build()?;
        let regions = &self.regions;
        mesh.assign_materials(|centroid| {
            regions
                .iter()
                .rev()
                .find(|r| r.contains(centroid))
                .map_or(0, |r| r.material)
        });
        Ok(mesh)
    }
}
