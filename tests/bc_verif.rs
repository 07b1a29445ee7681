use dgtrans::angular::{AngularQuadrature, QuadratureRule};
use dgtrans::config::{IterationConfig, MeshConfig, ProblemKind, QuadratureConfig, RunConfig};
use dgtrans::discretization::generator::{create_box_mesh, X_MAX, X_MIN, Y_MIN, Z_MAX};
use dgtrans::driver::{self, ProblemData};
use dgtrans::iteration::FixedSourceSolver;
use dgtrans::numerics::Convergence;
use dgtrans::physics::bc::BoundaryConditions;
use dgtrans::physics::materials::Material;
use dgtrans::physics::FormulationKind;
use dgtrans::TransportError;
use nalgebra::DVector;

fn scatterer() -> Material {
    Material::new("scatterer", vec![1.0], vec![vec![0.5]]).with_source(vec![1.0])
}

fn config(
    mesh: MeshConfig,
    quadrature: QuadratureConfig,
    boundaries: BoundaryConditions,
    formulation: FormulationKind,
) -> RunConfig {
    let mut iteration = IterationConfig::default();
    iteration.in_group = Convergence::relative(1e-11);
    RunConfig {
        problem: ProblemKind::FixedSource,
        mesh,
        quadrature,
        formulation,
        acceleration: false,
        n_group: 1,
        materials: vec![scatterer()],
        regions: Vec::new(),
        boundaries,
        linear_solver: Default::default(),
        iteration,
    }
}

fn slab(edges: Vec<f64>) -> MeshConfig {
    MeshConfig::Slab {
        edges,
        transverse: 1.0,
    }
}

fn gauss_legendre(order: usize) -> QuadratureConfig {
    QuadratureConfig {
        rule: QuadratureRule::GaussLegendre,
        order,
    }
}

// A slab symmetric about its midplane solves the same problem as its left
// half with a mirror at the midplane.
#[test]
fn reflective_half_slab_matches_symmetric_full_slab() {
    for formulation in [FormulationKind::DiscreteOrdinates, FormulationKind::EvenParity] {
        let full = config(
            slab(vec![0.0, 0.5, 1.5, 2.0, 2.5, 3.5, 4.0]),
            gauss_legendre(4),
            BoundaryConditions::all_vacuum(),
            formulation,
        );
        let half = config(
            slab(vec![0.0, 0.5, 1.5, 2.0]),
            gauss_legendre(4),
            BoundaryConditions::reflective([X_MAX]),
            formulation,
        );

        let full = driver::run(&full).unwrap().moments.remove(0);
        let half = driver::run(&half).unwrap().moments.remove(0);

        for i in 0..3 {
            assert!(
                (full[i] - half[i]).abs() < 1e-7 * full[i],
                "{formulation:?} cell {i}: {} vs {}",
                full[i],
                half[i]
            );
            // mirror image in the full slab
            assert!((full[i] - full[5 - i]).abs() < 1e-7 * full[i]);
        }
    }
}

#[test]
fn fully_reflective_box_is_an_infinite_medium() {
    for formulation in [FormulationKind::DiscreteOrdinates, FormulationKind::EvenParity] {
        let run = config(
            MeshConfig::Box {
                extent: [1.0, 1.0, 0.5],
                divisions: [2, 2, 1],
            },
            QuadratureConfig {
                rule: QuadratureRule::Product,
                order: 2,
            },
            BoundaryConditions::reflective(X_MIN..=Z_MAX),
            formulation,
        );
        let phi = driver::run(&run).unwrap().moments.remove(0);
        // Q / sigma_a, integrated over the full sphere of weight 4 pi
        for (c, value) in phi.iter().enumerate() {
            assert!((value - 2.0).abs() < 1e-6, "{formulation:?} cell {c}: {value}");
        }
    }
}

// With every face mirrored, a direction and its image through any face see
// the same medium, so their angular fluxes agree cell by cell.
#[test]
fn mirrored_directions_carry_the_same_angular_flux() {
    for formulation in [FormulationKind::DiscreteOrdinates, FormulationKind::EvenParity] {
        let run = config(
            MeshConfig::Box {
                extent: [1.0, 0.5, 0.5],
                divisions: [2, 1, 1],
            },
            QuadratureConfig {
                rule: QuadratureRule::Product,
                order: 4,
            },
            BoundaryConditions::reflective(X_MIN..=Z_MAX),
            formulation,
        );
        let data = ProblemData::from_config(&run).unwrap();
        let mut equations = driver::build_equations(&run, data.problem()).unwrap();
        let mut moments = vec![DVector::zeros(0)];
        FixedSourceSolver::new(driver::multigroup_iterator(&run))
            .solve(&mut equations, &mut moments)
            .unwrap();

        let transport = &equations.high_order;
        let index = transport.component_index();
        for boundary in X_MIN..=Z_MAX {
            for d in 0..data.quadrature.n_dir() {
                let r = data.quadrature.reflected_direction(boundary, d).unwrap();
                let psi_d = &transport.system(index.index(d, 0)).solution;
                let psi_r = &transport.system(index.index(r, 0)).solution;
                assert_eq!(psi_d.len(), data.mesh.n_cells());
                for (c, (a, b)) in psi_d.iter().zip(psi_r.iter()).enumerate() {
                    assert!(
                        (a - b).abs() < 1e-8 * a.abs(),
                        "{formulation:?} boundary {boundary}, directions {d}/{r}, cell {c}: {a} vs {b}"
                    );
                }
            }
        }
    }
}

#[test]
fn vacuum_leakage_lowers_the_flux() {
    let reflective = config(
        slab(vec![0.0, 1.0, 2.0]),
        gauss_legendre(2),
        BoundaryConditions::reflective([X_MIN, X_MAX]),
        FormulationKind::DiscreteOrdinates,
    );
    let one_sided = config(
        slab(vec![0.0, 1.0, 2.0]),
        gauss_legendre(2),
        BoundaryConditions::reflective([X_MIN]),
        FormulationKind::DiscreteOrdinates,
    );
    let closed = driver::run(&reflective).unwrap().moments.remove(0);
    let open = driver::run(&one_sided).unwrap().moments.remove(0);
    assert!(open[0] < closed[0] && open[1] < open[0]);
}

#[test]
fn reflection_tables_pair_mirrored_directions() {
    let mesh = create_box_mesh([1.0, 1.0, 1.0], [1, 1, 1]);
    let bcs = BoundaryConditions::reflective([X_MIN, Y_MIN]);
    let quadrature = AngularQuadrature::new(QuadratureRule::Product, 4, 1)
        .unwrap()
        .with_reflective_boundaries(&bcs, &mesh.boundary_normals())
        .unwrap();

    for d in 0..quadrature.n_dir() {
        let r = quadrature.reflected_direction(X_MIN, d).unwrap();
        let (omega, reflected) = (quadrature.direction(d), quadrature.direction(r));
        assert!((omega.x + reflected.x).abs() < 1e-12);
        assert!((omega.y - reflected.y).abs() < 1e-12);
        assert_eq!(quadrature.reflected_direction(X_MIN, r).unwrap(), d);
    }

    match quadrature.reflected_direction(X_MAX, 0) {
        Err(TransportError::InvalidBoundaryQuery {
            boundary_id,
            direction,
        }) => assert_eq!((boundary_id, direction), (X_MAX, 0)),
        other => panic!("expected InvalidBoundaryQuery, got {other:?}"),
    }
}

#[test]
fn reflective_boundary_without_faces_is_rejected() {
    let run = config(
        slab(vec![0.0, 1.0]),
        gauss_legendre(2),
        BoundaryConditions::reflective([42]),
        FormulationKind::DiscreteOrdinates,
    );
    assert!(matches!(
        driver::run(&run),
        Err(TransportError::Configuration(_))
    ));
}
