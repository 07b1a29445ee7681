//! Property-based tests for the phase-space indexing, reflection tables,
//! fission scaling and particle balance.

use dgtrans::angular::{AngularQuadrature, ComponentIndex, QuadratureRule};
use dgtrans::config::{IterationConfig, MeshConfig, ProblemKind, QuadratureConfig, RunConfig};
use dgtrans::discretization::generator::{create_box_mesh, create_slab_mesh, X_MIN, Z_MAX};
use dgtrans::driver;
use dgtrans::equation::{Equation, TransportProblem};
use dgtrans::numerics::comm::ExecutionContext;
use dgtrans::numerics::solver::DenseLu;
use dgtrans::physics::bc::BoundaryConditions;
use dgtrans::physics::materials::{Material, MaterialLibrary};
use dgtrans::physics::FormulationKind;
use nalgebra::DVector;
use proptest::prelude::*;

// ── Phase-space indexing ─────────────────────────────────────────────

proptest! {
    /// `component` inverts `index` and groups are contiguous blocks.
    #[test]
    fn component_index_is_a_bijection(n_dir in 1usize..40, n_group in 1usize..8) {
        let index = ComponentIndex::new(n_dir, n_group);
        prop_assert_eq!(index.n_total_vars(), n_dir * n_group);
        for k in 0..index.n_total_vars() {
            let (d, g) = index.component(k);
            prop_assert!(d < n_dir && g < n_group);
            prop_assert_eq!(index.index(d, g), k);
            prop_assert!(index.components_in_group(g).contains(&k));
        }
    }

    /// Reflecting twice through the same plane returns the incident
    /// direction, and the normal component flips sign.
    #[test]
    fn reflection_is_an_involution(order in prop::sample::select(vec![2usize, 4, 6]), id in X_MIN..=Z_MAX) {
        let mesh = create_box_mesh([1.0, 2.0, 3.0], [1, 1, 1]);
        let normals = mesh.boundary_normals();
        let quadrature = AngularQuadrature::new(QuadratureRule::Product, order, 1)
            .unwrap()
            .with_reflective_boundaries(&BoundaryConditions::reflective([id]), &normals)
            .unwrap();
        let n = normals[&id];
        for d in 0..quadrature.n_dir() {
            let r = quadrature.reflected_direction(id, d).unwrap();
            prop_assert_eq!(quadrature.reflected_direction(id, r).unwrap(), d);
            let (a, b) = (quadrature.direction(d).dot(n), quadrature.direction(r).dot(n));
            prop_assert!((a + b).abs() < 1e-12);
            prop_assert!((quadrature.weight(d) - quadrature.weight(r)).abs() < 1e-14);
        }
    }
}

// ── Fission scaling ──────────────────────────────────────────────────

proptest! {
    /// After scaling by `k` the transfer matrix is `χ ν σ_f / k`, whatever
    /// scaling preceded it. A moderator keeps a zero matrix.
    #[test]
    fn fission_transfer_scales_inversely_with_k(k0 in 0.1f64..3.0, k in 0.1f64..3.0) {
        let mesh = create_slab_mesh(&[0.0, 1.0], 1.0);
        let quadrature = AngularQuadrature::new(QuadratureRule::GaussLegendre, 2, 2).unwrap();
        let fuel = Material::new("fuel", vec![1.0, 2.0], vec![vec![0.5, 0.2], vec![0.0, 1.0]])
            .with_fission(vec![0.02, 0.5], vec![0.9, 0.1]);
        let moderator = Material::new("moderator", vec![0.8, 1.5], vec![vec![0.4, 0.35], vec![0.0, 1.45]]);
        let materials = MaterialLibrary::new(2, vec![fuel, moderator]).unwrap();
        let (bcs, ctx) = (BoundaryConditions::all_vacuum(), ExecutionContext::serial());
        let problem = TransportProblem::new(&mesh, &quadrature, &materials, &bcs, &ctx);
        let mut eq = Equation::new(
            "transport",
            FormulationKind::DiscreteOrdinates.build(),
            problem,
            2,
            true,
            Box::new(DenseLu),
        )
        .unwrap();

        eq.scale_fission_transfer(k0).unwrap();
        eq.scale_fission_transfer(k).unwrap();
        let chi = [0.9, 0.1];
        let nu_sigma_f = [0.02, 0.5];
        let transfer = &eq.fission_transfer()[0];
        for g_in in 0..2 {
            for g_out in 0..2 {
                let expected = chi[g_out] * nu_sigma_f[g_in] / k;
                prop_assert!((transfer[(g_in, g_out)] - expected).abs() < 1e-14);
            }
        }
        let moderator = &eq.fission_transfer()[1];
        prop_assert_eq!(moderator.shape(), (2, 2));
        prop_assert!(moderator.iter().all(|&v| v == 0.0));
    }
}

// ── Particle balance ─────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// A reflective slab has no leakage, so every cell carries `Q / σ_a`.
    #[test]
    fn reflective_slab_balances_source_and_absorption(
        sigma_t in 0.5f64..3.0,
        c in 0.0f64..0.8,
        q in 0.1f64..5.0,
        even_parity in any::<bool>(),
    ) {
        let material = Material::new("m", vec![sigma_t], vec![vec![c * sigma_t]]).with_source(vec![q]);
        let config = RunConfig {
            problem: ProblemKind::FixedSource,
            mesh: MeshConfig::Slab { edges: vec![0.0, 0.7, 1.2, 2.0], transverse: 1.0 },
            quadrature: QuadratureConfig { rule: QuadratureRule::GaussLegendre, order: 4 },
            formulation: if even_parity {
                FormulationKind::EvenParity
            } else {
                FormulationKind::DiscreteOrdinates
            },
            acceleration: false,
            n_group: 1,
            materials: vec![material],
            regions: Vec::new(),
            boundaries: BoundaryConditions::reflective([0, 1]),
            linear_solver: Default::default(),
            iteration: IterationConfig::default(),
        };
        let result = driver::run(&config).unwrap();
        let expected = q / (sigma_t * (1.0 - c));
        let phi: &DVector<f64> = &result.moments[0];
        for value in phi.iter() {
            prop_assert!((value - expected).abs() < 1e-5 * expected, "{} vs {}", value, expected);
        }
    }
}
