//! Throughput of the sparse assembly callbacks an interior-point solver
//! hammers once per iteration.

use num_complex::Complex64;
use qontrol::E;
use qontrol::gates::{gate, spin_operator};
use qontrol::nlp::NlpEvaluator;
use qontrol::problem::QuantumControlProblem;
use qontrol::system::QuantumSystem;

fn main() {
    divan::main();
}

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

fn x_gate_problem(order: usize, horizon: usize) -> QuantumControlProblem {
    let system = QuantumSystem::builder()
        .drift(spin_operator("Z").unwrap())
        .drives(vec![spin_operator("X").unwrap(), spin_operator("Y").unwrap()])
        .initial_states(vec![vec![c(1., 0.), c(0., 0.)], vec![c(0., 0.), c(1., 0.)]])
        .goal_gate(gate("X").unwrap())
        .control_bounds(vec![1.0, 0.5])
        .build()
        .unwrap();

    let mut builder = QuantumControlProblem::builder(system)
        .horizon(horizon)
        .fixed_time(0.01)
        .quantum_weight(200.)
        .control_weight(2.);
    if order == 2 {
        builder = builder.second_order_pade();
    }
    builder.build().unwrap()
}

#[divan::bench(args = [2, 4])]
fn residuals(bencher: divan::Bencher, order: usize) {
    let mut problem = x_gate_problem(order, 100);
    let z = problem.trajectory().data().clone();
    let evaluator = problem.evaluator_mut();
    let mut out = vec![0.; evaluator.n_constraints()];
    bencher.bench_local(|| evaluator.constraints(&z, &mut out).unwrap());
}

#[divan::bench(args = [2, 4])]
fn jacobian_values(bencher: divan::Bencher, order: usize) {
    let mut problem = x_gate_problem(order, 100);
    let z = problem.trajectory().data().clone();
    let evaluator = problem.evaluator_mut();
    let mut out = vec![0.; evaluator.jacobian_structure().len()];
    bencher.bench_local(|| evaluator.jacobian_values(&z, &mut out).unwrap());
}

#[divan::bench(args = [2, 4])]
fn hessian_values(bencher: divan::Bencher, order: usize) {
    let mut problem = x_gate_problem(order, 100);
    let z = problem.trajectory().data().clone();
    let evaluator = problem.evaluator_mut();
    let sigma: E = 1.;
    let mu = vec![0.5; evaluator.n_constraints()];
    let mut out = vec![0.; evaluator.hessian_structure().len()];
    bencher.bench_local(|| evaluator.hessian_values(&z, sigma, &mu, &mut out).unwrap());
}
