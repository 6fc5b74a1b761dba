//! # qontrol
//!
//! Quantum optimal control as sparse nonlinear programming.
//!
//! Given a drift Hamiltonian, a set of bounded drive Hamiltonians, initial
//! states and goal states (or a goal gate), the crate assembles a
//! large-scale sparse NLP whose solution is a smooth piecewise control
//! waveform on a discrete time grid, and exposes it through the callback
//! contract an interior-point solver consumes
//! ([`nlp::NlpEvaluator`]). Quantum evolution is modeled in a real
//! embedding with implicit Padé steps as equality constraints; every first
//! and second derivative the solver asks for is an analytic closed form
//! delivered in sparse structure + values form.
//!
//! ```no_run
//! use num_complex::Complex64;
//! use qontrol::gates::{gate, spin_operator};
//! use qontrol::nlp::SolveHooks;
//! use qontrol::problem::QuantumControlProblem;
//! use qontrol::system::QuantumSystem;
//!
//! fn c(re: f64, im: f64) -> Complex64 {
//!     Complex64::new(re, im)
//! }
//!
//! # fn run(solver: &mut dyn qontrol::nlp::NlpSolver) -> Result<(), qontrol::error::QontrolError> {
//! let system = QuantumSystem::builder()
//!     .drift(spin_operator("Z")?)
//!     .drives(vec![spin_operator("X")?, spin_operator("Y")?])
//!     .initial_states(vec![vec![c(1., 0.), c(0., 0.)], vec![c(0., 0.), c(1., 0.)]])
//!     .goal_gate(gate("X")?)
//!     .control_bounds(vec![1.0, 0.5])
//!     .build()?;
//!
//! let mut problem = QuantumControlProblem::builder(system)
//!     .horizon(100)
//!     .fixed_time(0.01)
//!     .quantum_weight(200.)
//!     .control_weight(2.)
//!     .build()?;
//!
//! let status = problem.solve(solver, &mut SolveHooks::default())?;
//! println!(
//!     "{:?}: infidelity {:.3e}",
//!     status,
//!     problem.trajectory().final_infidelity(problem.system())
//! );
//! # Ok(())
//! # }
//! ```

/// Scalar element type used throughout.
pub type E = f64;

pub mod constraints;
pub mod costs;
pub mod dynamics;
pub mod error;
pub mod gates;
pub mod integrators;
pub mod iso;
mod linalg;
pub mod monitor;
pub mod nlp;
pub mod objective;
pub mod problem;
pub mod system;
pub mod trajectory;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
use rstest_reuse;

pub use costs::CostType;
pub use error::QontrolError;
pub use integrators::Integrator;
pub use nlp::{NlpEvaluator, NlpSolver, SolveStatus};
pub use problem::{QuantumControlProblem, TimeMode};
pub use system::QuantumSystem;
pub use trajectory::Trajectory;
