//! Dot-product tests for the tangent/adjoint rules.
//!
//! For a linear map J with forward rule `d ↦ J d` and reverse rule
//! `w ↦ Jᵀ w`, the identity `<J d, w> = <d, Jᵀ w>` must hold for arbitrary
//! `d` and `w`. Each operator is checked against random vectors, then the
//! composed chain is checked with both `f_s` and `k` perturbed, in serial
//! and split across in-process partitions.

use approx::assert_relative_eq;
use modal_solver::{
    Communicator, DisplacementReconstructor, EquilibriumSolver, ForceProjector, JacMode,
    LinearOperator, ModalBasis, ModalChain, SharedMemoryComm, dot_product_test,
    relative_mismatch,
};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TOL: f64 = 1e-10;

fn random_vector(rng: &mut StdRng, n: usize) -> DVector<f64> {
    DVector::from_fn(n, |_, _| rng.gen_range(-1.0..1.0))
}

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |_, _| rng.gen_range(-1.0..1.0))
}

fn random_stiffness(rng: &mut StdRng, n: usize) -> DVector<f64> {
    // Bounded away from zero, both signs
    DVector::from_fn(n, |_, _| {
        let magnitude = rng.gen_range(0.5..50.0);
        if rng.gen_bool(0.8) { magnitude } else { -magnitude }
    })
}

#[test]
fn test_force_projector_dot_product() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let mode_shape = random_matrix(&mut rng, 4, 15);
        let op = ForceProjector::new(&mode_shape);
        let d = random_vector(&mut rng, 15);
        let w = random_vector(&mut rng, 4);
        assert!(dot_product_test(&op, &d, &w).unwrap() < TOL);
    }
}

#[test]
fn test_displacement_reconstructor_dot_product() {
    let mut rng = StdRng::seed_from_u64(12);
    for _ in 0..20 {
        let mode_shape = random_matrix(&mut rng, 5, 9);
        let op = DisplacementReconstructor::new(&mode_shape);
        let d = random_vector(&mut rng, 5);
        let w = random_vector(&mut rng, 9);
        assert!(dot_product_test(&op, &d, &w).unwrap() < TOL);
    }
}

#[test]
fn test_equilibrium_dot_product() {
    let mut rng = StdRng::seed_from_u64(13);
    let solver = EquilibriumSolver::default();
    for _ in 0..20 {
        let k = random_stiffness(&mut rng, 6);
        let mf = random_vector(&mut rng, 6);
        let op = solver.linearize(&k, &mf).unwrap();
        let d = random_vector(&mut rng, 12);
        let w = random_vector(&mut rng, 6);
        assert!(dot_product_test(&op, &d, &w).unwrap() < TOL);
    }
}

#[test]
fn test_projector_and_reconstructor_are_transposes() {
    let mut rng = StdRng::seed_from_u64(14);
    let mode_shape = random_matrix(&mut rng, 3, 12);
    let projector = ForceProjector::new(&mode_shape);
    let reconstructor = DisplacementReconstructor::new(&mode_shape);

    let f_s = random_vector(&mut rng, 12);
    let z = random_vector(&mut rng, 3);

    // Reverse of one is the forward of the other, bit for bit
    let a = projector.apply_new(JacMode::Reverse, &z).unwrap();
    let b = reconstructor.apply_new(JacMode::Forward, &z).unwrap();
    assert_eq!(a, b);

    let a = projector.apply_new(JacMode::Forward, &f_s).unwrap();
    let b = reconstructor.apply_new(JacMode::Reverse, &f_s).unwrap();
    assert_eq!(a, b);
}

fn random_basis(rng: &mut StdRng, nmodes: usize, num_nodes: usize) -> ModalBasis {
    ModalBasis {
        nmodes,
        mode_shape: random_matrix(rng, nmodes, 3 * num_nodes),
        modal_stiffness: random_stiffness(rng, nmodes),
        modal_mass: DVector::from_element(nmodes, 1.0),
        x_s0: DVector::zeros(3 * num_nodes),
    }
}

#[test]
fn test_chain_dot_product() {
    let mut rng = StdRng::seed_from_u64(21);
    for _ in 0..10 {
        let basis = random_basis(&mut rng, 4, 6);
        let chain = ModalChain::new(&basis);
        let state = chain.evaluate(&random_vector(&mut rng, 18)).unwrap();

        let d_f_s = random_vector(&mut rng, 18);
        let d_k = random_vector(&mut rng, 4);
        let u_bar = random_vector(&mut rng, 18);

        let tangent = chain.jvp(&state, &d_f_s, Some(&d_k)).unwrap();
        let adjoint = chain.vjp(&state, &u_bar).unwrap();

        let forward = tangent.u_s.dot(&u_bar);
        let reverse = d_f_s.dot(&adjoint.f_s) + d_k.dot(&adjoint.k);
        assert!(
            relative_mismatch(forward, reverse) < TOL,
            "forward {forward} vs reverse {reverse}"
        );
    }
}

#[test]
fn test_chain_tangent_matches_finite_difference() {
    let mut rng = StdRng::seed_from_u64(22);
    let basis = random_basis(&mut rng, 3, 4);
    let f_s = random_vector(&mut rng, 12);
    let d_f_s = random_vector(&mut rng, 12);
    let d_k = random_vector(&mut rng, 3);

    let chain = ModalChain::new(&basis);
    let state = chain.evaluate(&f_s).unwrap();
    let tangent = chain.jvp(&state, &d_f_s, Some(&d_k)).unwrap();

    let h = 1e-6;
    let perturbed = |sign: f64| {
        let mut b = basis.clone();
        b.modal_stiffness += &d_k * (sign * h);
        ModalChain::new(&b)
            .evaluate(&(&f_s + &d_f_s * (sign * h)))
            .unwrap()
            .u_s
    };
    let fd = (perturbed(1.0) - perturbed(-1.0)) / (2.0 * h);
    assert_relative_eq!(tangent.u_s, fd, epsilon = 1e-6, max_relative = 1e-6);
}

#[test]
fn test_partitioned_chain_matches_serial() {
    let mut rng = StdRng::seed_from_u64(31);
    let num_nodes = 9;
    let basis = random_basis(&mut rng, 3, num_nodes);
    let f_s = random_vector(&mut rng, 3 * num_nodes);
    let d_f_s = random_vector(&mut rng, 3 * num_nodes);
    let d_k = random_vector(&mut rng, 3);
    let u_bar = random_vector(&mut rng, 3 * num_nodes);

    let serial = ModalChain::new(&basis);
    let state = serial.evaluate(&f_s).unwrap();
    let tangent = serial.jvp(&state, &d_f_s, Some(&d_k)).unwrap();
    let adjoint = serial.vjp(&state, &u_bar).unwrap();

    // Uneven node split over three ranks
    let ranges = [0..2, 2..7, 7..9];
    let group = SharedMemoryComm::group(ranges.len());

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = group
            .into_iter()
            .zip(ranges.iter().cloned())
            .map(|(comm, nodes)| {
                let basis = &basis;
                let (f_s, d_f_s, u_bar, d_k) = (&f_s, &d_f_s, &u_bar, &d_k);
                s.spawn(move || {
                    let cols = 3 * nodes.start..3 * nodes.end;
                    let slice = |x: &DVector<f64>| x.rows(cols.start, cols.len()).into_owned();
                    let local_shape = basis.local_mode_shape(nodes.clone()).unwrap();
                    let rank = comm.rank();
                    let chain =
                        ModalChain::partitioned(&local_shape, &basis.modal_stiffness, comm)
                            .unwrap();

                    let state = chain.evaluate(&slice(f_s)).unwrap();
                    let tangent = chain.jvp(&state, &slice(d_f_s), Some(d_k)).unwrap();
                    let adjoint = chain.vjp(&state, &slice(u_bar)).unwrap();
                    (rank, cols, state, tangent, adjoint)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (_rank, cols, local_state, local_tangent, local_adjoint) in results {
        // Reduced quantities agree on every rank
        assert_relative_eq!(local_state.mf, state.mf, max_relative = 1e-12);
        assert_relative_eq!(local_state.z, state.z, max_relative = 1e-12);
        assert_relative_eq!(local_tangent.z, tangent.z, epsilon = 1e-12, max_relative = 1e-12);
        assert_relative_eq!(local_adjoint.k, adjoint.k, epsilon = 1e-12, max_relative = 1e-12);

        // Nodal quantities agree on the owned slice
        let n = cols.len();
        assert_relative_eq!(
            local_state.u_s,
            state.u_s.rows(cols.start, n).into_owned(),
            epsilon = 1e-12,
            max_relative = 1e-12
        );
        assert_relative_eq!(
            local_adjoint.f_s,
            adjoint.f_s.rows(cols.start, n).into_owned(),
            epsilon = 1e-12,
            max_relative = 1e-12
        );
    }
}
