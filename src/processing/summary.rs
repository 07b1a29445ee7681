use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::config::{ProblemKind, RunConfig};
use crate::discretization::mesh::Mesh;
use crate::driver::{Outcome, ProblemData, RunResult};

#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    // Mesh info
    pub num_cells: usize,
    pub num_faces: usize,
    pub num_boundary_faces: usize,
    pub min_cell_spacing: f64,
    pub max_cell_spacing: f64,
    pub avg_cell_volume: f64,

    // Problem info
    pub problem: ProblemKind,
    pub formulation: String,
    pub acceleration: bool,
    pub num_directions: usize,
    pub num_groups: usize,
    pub num_materials: usize,

    // Results
    pub keff: Option<f64>,
    pub power_iterations: Option<usize>,
    pub err_k: Option<f64>,
    pub err_phi: Option<f64>,
    pub sweeps: usize,
    /// Volume-integrated scalar flux per group.
    pub group_flux: Vec<f64>,
}

fn cell_spacings(mesh: &Mesh) -> Vec<f64> {
    mesh.faces
        .iter()
        .filter_map(|face| match face.neighbor_cell_ids {
            (k, Some(l)) => Some(mesh.centroid_distance(k, l)),
            _ => None,
        })
        .collect()
}

impl RunSummary {
    pub fn from_run(config: &RunConfig, data: &ProblemData, result: &RunResult) -> Self {
        let mesh = &data.mesh;
        let num_cells = mesh.n_cells();
        let spacings = cell_spacings(mesh);
        let min_spacing = spacings.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_spacing = spacings.iter().cloned().fold(0.0, f64::max);
        let avg_volume = mesh.cells.iter().map(|c| c.volume).sum::<f64>() / num_cells.max(1) as f64;

        let group_flux = result
            .moments
            .iter()
            .map(|m| mesh.cells.iter().map(|c| m[c.id] * c.volume).sum())
            .collect();

        let (keff, power_iterations, err_k, err_phi, sweeps) = match &result.outcome {
            Outcome::FixedSource(report) => (None, None, None, None, report.sweeps),
            Outcome::Eigenvalue(solution) => (
                Some(solution.keff),
                Some(solution.iterations),
                Some(solution.err_k),
                Some(solution.err_phi),
                solution.history.iter().map(|r| r.sweeps).sum(),
            ),
        };

        Self {
            num_cells,
            num_faces: mesh.faces.len(),
            num_boundary_faces: mesh.faces.iter().filter(|f| f.boundary_id.is_some()).count(),
            min_cell_spacing: min_spacing,
            max_cell_spacing: max_spacing,
            avg_cell_volume: avg_volume,
            problem: config.problem,
            formulation: format!("{:?}", config.formulation),
            acceleration: config.acceleration,
            num_directions: data.quadrature.n_dir(),
            num_groups: config.n_group,
            num_materials: data.materials.n_material(),
            keff,
            power_iterations,
            err_k,
            err_phi,
            sweeps,
            group_flux,
        }
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;

        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file, "TRANSPORT RUN SUMMARY")?;
        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file)?;

        writeln!(file, "MESH STATISTICS")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Number of cells:     {}", self.num_cells)?;
        writeln!(file, "Number of faces:     {}", self.num_faces)?;
        writeln!(file, "Boundary faces:      {}", self.num_boundary_faces)?;
        writeln!(file, "Min cell spacing:    {:.6e}", self.min_cell_spacing)?;
        writeln!(file, "Max cell spacing:    {:.6e}", self.max_cell_spacing)?;
        writeln!(file, "Avg cell volume:     {:.6e}", self.avg_cell_volume)?;
        writeln!(file)?;

        writeln!(file, "DISCRETIZATION")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Problem:             {:?}", self.problem)?;
        writeln!(file, "Formulation:         {}", self.formulation)?;
        writeln!(file, "Acceleration:        {}", self.acceleration)?;
        writeln!(file, "Directions:          {}", self.num_directions)?;
        writeln!(file, "Groups:              {}", self.num_groups)?;
        writeln!(file, "Materials:           {}", self.num_materials)?;
        writeln!(file)?;

        writeln!(file, "RESULTS")?;
        writeln!(file, "{}", "-".repeat(60))?;
        if let Some(keff) = self.keff {
            writeln!(file, "k_eff:               {:.8}", keff)?;
        }
        if let (Some(iter), Some(err_k), Some(err_phi)) =
            (self.power_iterations, self.err_k, self.err_phi)
        {
            writeln!(file, "Power iterations:    {}", iter)?;
            writeln!(file, "  err_k:             {:.6e}", err_k)?;
            writeln!(file, "  err_phi:           {:.6e}", err_phi)?;
        }
        writeln!(file, "Multigroup sweeps:   {}", self.sweeps)?;
        for (g, flux) in self.group_flux.iter().enumerate() {
            writeln!(file, "Group {:<3} flux:     {:.6e}", g, flux)?;
        }
        writeln!(file)?;

        writeln!(file, "{}", "=".repeat(60))?;

        Ok(())
    }

    pub fn print_to_console(&self) {
        println!("\n{}", "=".repeat(60));
        println!("TRANSPORT SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "Mesh:          {} cells, {} faces",
            self.num_cells, self.num_faces
        );
        println!(
            "Phase space:   {} directions x {} groups ({})",
            self.num_directions, self.num_groups, self.formulation
        );
        if let (Some(keff), Some(iter)) = (self.keff, self.power_iterations) {
            println!("k_eff:         {:.8} after {} power iterations", keff, iter);
        }
        println!("Sweeps:        {}", self.sweeps);
        println!("{}\n", "=".repeat(60));
    }
}
