use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;

use dgtrans::angular::QuadratureRule;
use dgtrans::config::{MaterialRegion, MeshConfig, ProblemKind, QuadratureConfig, RunConfig};
use dgtrans::discretization::generator::X_MIN;
use dgtrans::driver::{self, Outcome, ProblemData};
use dgtrans::physics::bc::BoundaryConditions;
use dgtrans::physics::materials::Material;
use dgtrans::physics::FormulationKind;
use dgtrans::processing::csv_writer;
use dgtrans::processing::summary::RunSummary;
use dgtrans::TransportResult;

#[derive(Parser)]
#[command(name = "dgtrans")]
#[command(about = "Multigroup transport solver for fixed-source and k-eigenvalue problems")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the problem described by a JSON configuration
    Run {
        /// Configuration file
        config: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
    /// Check a configuration without solving it
    Validate {
        config: PathBuf,
    },
    /// Two-group fuel/reflector slab, reflective on the left
    Demo {
        #[arg(short, long, default_value = "output/demo")]
        output: PathBuf,

        /// Polar quadrature order
        #[arg(long, default_value = "8")]
        order: usize,

        #[arg(long)]
        even_parity: bool,

        /// Accelerate with the diffusion closure
        #[arg(long)]
        accelerate: bool,

        /// Write the demo configuration instead of solving it
        #[arg(long)]
        dump: Option<PathBuf>,
    },
}

fn main() -> TransportResult<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Run { config, output } => {
            info!("Loading {}", config.display());
            let config = RunConfig::from_file(&config)?;
            run_and_report(&config, &output)
        }
        Commands::Validate { config } => {
            let config = RunConfig::from_file(&config)?;
            let data = ProblemData::from_config(&config)?;
            println!(
                "Configuration valid: {} cells, {} directions, {} groups",
                data.mesh.n_cells(),
                data.quadrature.n_dir(),
                config.n_group
            );
            Ok(())
        }
        Commands::Demo {
            output,
            order,
            even_parity,
            accelerate,
            dump,
        } => {
            let mut config = demo_config(order);
            if even_parity {
                config.formulation = FormulationKind::EvenParity;
            }
            config.acceleration = accelerate;
            if let Some(path) = dump {
                fs::write(&path, config.to_json()?)?;
                println!("Demo configuration written to {}", path.display());
                return Ok(());
            }
            run_and_report(&config, &output)
        }
    }
}

fn run_and_report(config: &RunConfig, output: &Path) -> TransportResult<()> {
    fs::create_dir_all(output)?;

    let data = ProblemData::from_config(config)?;
    let result = driver::solve(config, &data)?;

    csv_writer::write_flux(output.join("flux.csv"), &data.mesh, &result.moments)?;
    if let Outcome::Eigenvalue(solution) = &result.outcome {
        csv_writer::write_history(output.join("power_iteration.csv"), &solution.history)?;
    }

    let summary = RunSummary::from_run(config, &data, &result);
    summary.write_to_file(output.join("summary.txt"))?;
    summary.write_json(output.join("summary.json"))?;
    summary.print_to_console();

    println!("Results saved to {}", output.display());
    Ok(())
}

/// 40 cm of fuel next to 20 cm of water, two groups with thermal up-scatter.
fn demo_config(order: usize) -> RunConfig {
    let fuel = Material::new(
        "fuel",
        vec![0.65, 1.30],
        vec![vec![0.56, 0.04], vec![0.002, 1.10]],
    )
    .with_fission(vec![0.006, 0.19], vec![1.0, 0.0]);
    let water = Material::new(
        "water",
        vec![0.60, 2.00],
        vec![vec![0.53, 0.065], vec![0.001, 1.98]],
    );

    let edges: Vec<f64> = (0..=60).map(|i| i as f64).collect();
    RunConfig {
        problem: ProblemKind::Eigenvalue,
        mesh: MeshConfig::Slab {
            edges,
            transverse: 1.0,
        },
        quadrature: QuadratureConfig {
            rule: QuadratureRule::GaussLegendre,
            order,
        },
        formulation: FormulationKind::DiscreteOrdinates,
        acceleration: false,
        n_group: 2,
        materials: vec![fuel, water],
        regions: vec![MaterialRegion {
            material: 1,
            lower: [40.0, -1.0, -1.0],
            upper: [60.0, 2.0, 2.0],
        }],
        boundaries: BoundaryConditions::reflective([X_MIN]),
        linear_solver: Default::default(),
        iteration: Default::default(),
    }
}
