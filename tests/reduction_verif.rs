use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dgtrans::angular::QuadratureRule;
use dgtrans::config::{IterationConfig, MeshConfig, ProblemKind, QuadratureConfig, RunConfig};
use dgtrans::driver::{self, Outcome, ProblemData};
use dgtrans::numerics::comm::{Communicator, ExecutionContext};
use dgtrans::numerics::{Convergence, ConvergenceMetric, Tolerance};
use dgtrans::physics::bc::BoundaryConditions;
use dgtrans::physics::materials::Material;
use dgtrans::physics::FormulationKind;
use dgtrans::TransportResult;

/// Root of a two-worker run whose peer always reports an update of at
/// least `floor` in the max norm. Sums pass through.
struct LaggingPeer {
    floor: f64,
    sums: AtomicUsize,
    maxes: AtomicUsize,
}

impl LaggingPeer {
    fn new(floor: f64) -> Arc<Self> {
        Arc::new(Self {
            floor,
            sums: AtomicUsize::new(0),
            maxes: AtomicUsize::new(0),
        })
    }
}

impl Communicator for LaggingPeer {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        2
    }

    fn sum(&self, local: f64) -> TransportResult<f64> {
        self.sums.fetch_add(1, Ordering::SeqCst);
        Ok(local)
    }

    fn max(&self, local: f64) -> TransportResult<f64> {
        self.maxes.fetch_add(1, Ordering::SeqCst);
        Ok(local.max(self.floor))
    }
}

fn slab(problem: ProblemKind, material: Material, iteration: IterationConfig) -> RunConfig {
    RunConfig {
        problem,
        mesh: MeshConfig::Slab {
            edges: vec![0.0, 1.0, 2.0, 3.0, 4.0],
            transverse: 1.0,
        },
        quadrature: QuadratureConfig {
            rule: QuadratureRule::GaussLegendre,
            order: 4,
        },
        formulation: FormulationKind::DiscreteOrdinates,
        acceleration: false,
        n_group: 1,
        materials: vec![material],
        regions: Vec::new(),
        boundaries: BoundaryConditions::all_vacuum(),
        linear_solver: Default::default(),
        iteration,
    }
}

fn inner_iterations(config: &RunConfig, ctx: ExecutionContext) -> usize {
    let data = ProblemData::with_context(config, ctx).unwrap();
    match driver::solve(config, &data).unwrap().outcome {
        Outcome::FixedSource(report) => report.inner_iterations,
        Outcome::Eigenvalue(_) => panic!("expected a fixed-source run"),
    }
}

// The local update converges, but the reduced max norm includes the peer's
// unit change, so the in-group loop runs to its limit.
#[test]
fn peer_update_keeps_the_in_group_loop_running() {
    let scatterer = Material::new("scatterer", vec![1.0], vec![vec![0.5]]).with_source(vec![1.0]);
    let mut iteration = IterationConfig::default();
    iteration.in_group = Convergence {
        tolerance: Tolerance::Absolute(1e-6),
        metric: ConvergenceMetric::MaxNorm,
    };
    iteration.max_in_group_iterations = 60;
    let config = slab(ProblemKind::FixedSource, scatterer, iteration);

    let serial = inner_iterations(&config, ExecutionContext::serial());
    assert!(serial < 60, "serial run took {serial} iterations");

    let peer = LaggingPeer::new(1.0);
    let lagging = inner_iterations(&config, ExecutionContext::new(peer.clone()));
    assert_eq!(lagging, 60);
    assert!(peer.maxes.load(Ordering::SeqCst) >= 2 * 60);
}

#[test]
fn eigenvalue_convergence_norms_are_reduced() {
    let fuel = Material::new("fuel", vec![1.0], vec![vec![0.5]]).with_fission(vec![0.6], vec![1.0]);
    let config = slab(ProblemKind::Eigenvalue, fuel, IterationConfig::default());

    let peer = LaggingPeer::new(0.0);
    let data = ProblemData::with_context(&config, ExecutionContext::new(peer.clone())).unwrap();
    let iterations = match driver::solve(&config, &data).unwrap().outcome {
        Outcome::Eigenvalue(solution) => solution.iterations,
        Outcome::FixedSource(_) => panic!("expected an eigenvalue"),
    };

    // Per power iteration: one fission-source sum plus two sums (update and
    // reference) each for the in-group, multigroup and power-iteration norms.
    let sums = peer.sums.load(Ordering::SeqCst);
    assert!(sums >= 1 + 7 * iterations, "{sums} sums over {iterations} iterations");
    assert_eq!(peer.maxes.load(Ordering::SeqCst), 0);
}
