use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use nalgebra::DVector;

use dgtrans::angular::{AngularQuadrature, QuadratureRule};
use dgtrans::config::{IterationConfig, MeshConfig, ProblemKind, QuadratureConfig, RunConfig};
use dgtrans::discretization::generator::{create_box_mesh, create_slab_mesh, uniform_edges};
use dgtrans::discretization::mesh::Mesh;
use dgtrans::driver::{self, ProblemData};
use dgtrans::equation::{Equation, TransportProblem};
use dgtrans::numerics::comm::ExecutionContext;
use dgtrans::numerics::krylov::BiCgStab;
use dgtrans::numerics::solver::{DenseLu, LinearSolver};
use dgtrans::physics::bc::BoundaryConditions;
use dgtrans::physics::materials::{Material, MaterialLibrary};
use dgtrans::physics::FormulationKind;

fn mesh_sizes() -> Vec<usize> {
    vec![4, 8, 12]
}

fn slab_sizes() -> Vec<usize> {
    vec![100, 400]
}

fn scatterer() -> MaterialLibrary {
    let m = Material::new("m", vec![1.0], vec![vec![0.9]]).with_source(vec![1.0]);
    MaterialLibrary::new(1, vec![m]).unwrap()
}

fn bench_box_mesh(c: &mut Criterion) {
    let mut group = c.benchmark_group("box_mesh");
    for &n in &mesh_sizes() {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mesh = create_box_mesh([1.0, 1.0, 1.0], std::hint::black_box([n, n, n]));
                std::hint::black_box(mesh.n_cells());
            });
        });
    }
    group.finish();
}

fn bench_bilinear_assembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("bilinear_assembly");
    for kind in [FormulationKind::DiscreteOrdinates, FormulationKind::EvenParity] {
        for &n in &mesh_sizes() {
            let mesh = create_box_mesh([1.0, 1.0, 1.0], [n, n, n]);
            let quadrature = AngularQuadrature::new(QuadratureRule::Product, 2, 1).unwrap();
            let materials = scatterer();
            let (bcs, ctx) = (BoundaryConditions::all_vacuum(), ExecutionContext::serial());
            let problem = TransportProblem::new(&mesh, &quadrature, &materials, &bcs, &ctx);
            let mut eq =
                Equation::new("transport", kind.build(), problem, 1, false, Box::new(DenseLu)).unwrap();
            let mut moments = vec![DVector::zeros(0)];
            eq.initialize_system(&mut moments).unwrap();

            let id = BenchmarkId::new(format!("{kind:?}"), n);
            group.bench_with_input(id, &n, |b, _| {
                b.iter(|| eq.assemble_bilinear_form().unwrap());
            });
        }
    }
    group.finish();
}

fn assembled_slab(n: usize) -> (Mesh, AngularQuadrature, MaterialLibrary) {
    let mesh = create_slab_mesh(&uniform_edges(0.0, n as f64 * 0.1, n), 1.0);
    let quadrature = AngularQuadrature::new(QuadratureRule::GaussLegendre, 2, 1).unwrap();
    (mesh, quadrature, scatterer())
}

fn bench_linear_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("even_parity_solve");
    for &n in &slab_sizes() {
        let (mesh, quadrature, materials) = assembled_slab(n);
        let (bcs, ctx) = (BoundaryConditions::all_vacuum(), ExecutionContext::serial());
        let problem = TransportProblem::new(&mesh, &quadrature, &materials, &bcs, &ctx);
        let mut eq = Equation::new(
            "transport",
            FormulationKind::EvenParity.build(),
            problem,
            1,
            false,
            Box::new(DenseLu),
        )
        .unwrap();
        let mut moments = vec![DVector::zeros(0)];
        eq.initialize_system(&mut moments).unwrap();
        eq.assemble_bilinear_form().unwrap();
        let matrix = eq.system(0).matrix.clone();
        let rhs = DVector::from_element(n, 1.0);

        let solvers: Vec<(&str, Box<dyn Fn() -> Box<dyn LinearSolver>>)> = vec![
            ("dense_lu", Box::new(|| Box::new(DenseLu) as Box<dyn LinearSolver>)),
            ("bicgstab", Box::new(|| Box::new(BiCgStab::new(1e-10, 2000)) as Box<dyn LinearSolver>)),
        ];
        for (name, make) in &solvers {
            group.bench_with_input(BenchmarkId::new(*name, n), &n, |b, &n| {
                b.iter_batched(
                    || (make(), DVector::zeros(n)),
                    |(mut solver, mut x)| {
                        solver.solve(&matrix, &rhs, &mut x).unwrap();
                        std::hint::black_box(x);
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

fn slab_config(n: usize, acceleration: bool) -> RunConfig {
    RunConfig {
        problem: ProblemKind::FixedSource,
        mesh: MeshConfig::Slab {
            edges: uniform_edges(0.0, n as f64 * 0.5, n),
            transverse: 1.0,
        },
        quadrature: QuadratureConfig {
            rule: QuadratureRule::GaussLegendre,
            order: 8,
        },
        formulation: FormulationKind::DiscreteOrdinates,
        acceleration,
        n_group: 1,
        materials: vec![Material::new("m", vec![1.0], vec![vec![0.9]]).with_source(vec![1.0])],
        regions: Vec::new(),
        boundaries: BoundaryConditions::all_vacuum(),
        linear_solver: Default::default(),
        iteration: IterationConfig::default(),
    }
}

fn bench_fixed_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_source");
    group.sample_size(10);
    for &n in &slab_sizes() {
        for acceleration in [false, true] {
            let config = slab_config(n, acceleration);
            let data = ProblemData::from_config(&config).unwrap();
            let name = if acceleration { "accelerated" } else { "source_iteration" };
            group.bench_with_input(BenchmarkId::new(name, n), &n, |b, _| {
                b.iter(|| {
                    let result = driver::solve(&config, &data).unwrap();
                    std::hint::black_box(result.moments);
                });
            });
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_box_mesh,
    bench_bilinear_assembly,
    bench_linear_solvers,
    bench_fixed_source
);
criterion_main!(benches);
