//! # Problem assembler
//!
//! Wires a [`QuantumSystem`], an integrator, an objective and the default
//! constraint set into a [`ProblemEvaluator`] implementing the solver
//! callback contract, plus a seeded [`Trajectory`] to start from.
//!
//! Three time modes:
//!
//! * **fixed time**: every Δt slot is pinned to a constant; objective is
//!   the terminal quantum cost plus the control regularizer.
//! * **free time**: Δt slots move inside bounds, optionally tied together
//!   through the shared duplicate slot; same objective.
//! * **min time**: objective is total duration plus control and smoothness
//!   regularizers; the terminal wavefunctions are pinned by equality to the
//!   warm-start trajectory's final states so the target stays feasible
//!   while the duration shrinks.

use faer::Col;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::E;
use crate::constraints::{
    BoundsConstraint, Constraint, ConstraintRule, EqualityConstraint, L1SlackConstraint,
    TimeStepBoundsConstraint, TimeStepEqualityConstraint, TimeStepsAllEqualConstraint,
};
use crate::costs::CostType;
use crate::dynamics::Dynamics;
use crate::error::{QontrolError, ensure_finite};
use crate::integrators::Integrator;
use crate::linalg::norm_inf;
use crate::iso::ZLayout;
use crate::nlp::{NlpEvaluator, NlpSolver, SolveHooks, SolveStatus};
use crate::objective::{
    Objective, l1_slack_regularizer, min_time_objective, quadratic_regularizer,
    quadratic_smoothness_regularizer, quantum_objective,
};
use crate::system::QuantumSystem;
use crate::trajectory::Trajectory;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum TimeMode {
    FixedTime {
        dt: E,
    },
    FreeTime {
        dt_bounds: (E, E),
        all_equal: bool,
    },
    MinTime {
        dt_bounds: (E, E),
    },
}

pub struct QuantumControlProblem {
    system: QuantumSystem,
    mode: TimeMode,
    evaluator: ProblemEvaluator,
    trajectory: Trajectory,
    constraints: Vec<Constraint>,
}

impl QuantumControlProblem {
    pub fn builder(system: QuantumSystem) -> ProblemBuilder {
        ProblemBuilder::new(system)
    }

    pub fn system(&self) -> &QuantumSystem {
        &self.system
    }

    pub fn mode(&self) -> TimeMode {
        self.mode
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn integrator(&self) -> &Integrator {
        self.evaluator.dynamics.integrator()
    }

    pub fn evaluator_mut(&mut self) -> &mut ProblemEvaluator {
        &mut self.evaluator
    }

    /// Runs the external solver from the seeded trajectory, reads the final
    /// point back, and passes the solver status through. Infeasible and
    /// unbounded terminations surface as [`QontrolError::ConstraintViolation`]
    /// carrying the final infidelity.
    pub fn solve(
        &mut self,
        solver: &mut dyn NlpSolver,
        hooks: &mut SolveHooks,
    ) -> Result<SolveStatus, QontrolError> {
        let z0 = self.trajectory.data().clone();
        let solution = solver.solve(&mut self.evaluator, &z0, hooks)?;
        self.trajectory.update(solution.z)?;
        let infidelity = self.trajectory.final_infidelity(&self.system);
        match solution.status {
            SolveStatus::Infeasible | SolveStatus::Unbounded => {
                Err(QontrolError::ConstraintViolation {
                    status: solution.status,
                    infidelity,
                })
            }
            status => Ok(status),
        }
    }
}

pub struct ProblemBuilder {
    system: QuantumSystem,
    horizon: Option<usize>,
    mode: TimeMode,
    fourth_order: bool,
    cost: CostType,
    q_weight: E,
    u_weight: E,
    smoothness_weight: Option<E>,
    additional_objective: Option<Objective>,
    pin_endpoint_controls: bool,
    u_bounds: Option<Vec<E>>,
    l1_offsets: Vec<usize>,
    l1_alpha: E,
    jitter: Option<E>,
    seed: u64,
    warm_start: Option<Trajectory>,
}

impl ProblemBuilder {
    pub fn new(system: QuantumSystem) -> Self {
        Self {
            system,
            horizon: None,
            mode: TimeMode::FixedTime { dt: 0.01 },
            fourth_order: true,
            cost: CostType::Infidelity,
            q_weight: 100.,
            u_weight: 1e-2,
            smoothness_weight: None,
            additional_objective: None,
            pin_endpoint_controls: true,
            u_bounds: None,
            l1_offsets: Vec::new(),
            l1_alpha: 1.,
            jitter: None,
            seed: 0,
            warm_start: None,
        }
    }

    pub fn horizon(mut self, t: usize) -> Self {
        self.horizon = Some(t);
        self
    }

    pub fn fixed_time(mut self, dt: E) -> Self {
        self.mode = TimeMode::FixedTime { dt };
        self
    }

    pub fn free_time(mut self, dt_min: E, dt_max: E, all_equal: bool) -> Self {
        self.mode = TimeMode::FreeTime {
            dt_bounds: (dt_min, dt_max),
            all_equal,
        };
        self
    }

    pub fn min_time(mut self, dt_min: E, dt_max: E) -> Self {
        self.mode = TimeMode::MinTime {
            dt_bounds: (dt_min, dt_max),
        };
        self
    }

    pub fn second_order_pade(mut self) -> Self {
        self.fourth_order = false;
        self
    }

    pub fn fourth_order_pade(mut self) -> Self {
        self.fourth_order = true;
        self
    }

    pub fn terminal_cost(mut self, cost: CostType) -> Self {
        self.cost = cost;
        self
    }

    /// Terminal cost weight `Q`.
    pub fn quantum_weight(mut self, q: E) -> Self {
        self.q_weight = q;
        self
    }

    /// Control regularizer weight `R`.
    pub fn control_weight(mut self, r: E) -> Self {
        self.u_weight = r;
        self
    }

    /// Control smoothness weight; defaults to the control weight in
    /// min-time mode and is otherwise off.
    pub fn smoothness_weight(mut self, r: E) -> Self {
        self.smoothness_weight = Some(r);
        self
    }

    pub fn additional_objective(mut self, objective: Objective) -> Self {
        self.additional_objective = Some(objective);
        self
    }

    /// Whether augmented controls are pinned to zero at both endpoints
    /// (on by default).
    pub fn pin_endpoint_controls(mut self, pin: bool) -> Self {
        self.pin_endpoint_controls = pin;
        self
    }

    pub fn control_derivative_bounds(mut self, bounds: Vec<E>) -> Self {
        self.u_bounds = Some(bounds);
        self
    }

    /// L1-regularizes the given within-step components through slack pairs.
    pub fn l1_regularized(mut self, offsets: Vec<usize>, alpha: E) -> Self {
        self.l1_offsets = offsets;
        self.l1_alpha = alpha;
        self
    }

    /// Gaussian jitter (std σ) on the interpolated seed.
    pub fn seed_jitter(mut self, sigma: E) -> Self {
        self.jitter = Some(sigma);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Starts from a previously solved trajectory instead of the
    /// interpolated seed (required shape-compatible; used by min-time).
    pub fn warm_start(mut self, trajectory: Trajectory) -> Self {
        self.warm_start = Some(trajectory);
        self
    }

    pub fn build(self) -> Result<QuantumControlProblem, QontrolError> {
        let horizon = self
            .horizon
            .ok_or_else(|| QontrolError::configuration("no horizon (T) provided"))?;
        if horizon < 2 {
            return Err(QontrolError::configuration("horizon must be at least 2"));
        }

        let system = self.system;
        let vardim = system.vardim();
        let nstates = system.nstates();
        let ncontrols = system.ncontrols();

        for &offset in &self.l1_offsets {
            if offset >= vardim {
                return Err(QontrolError::dimension(
                    "L1-regularized offset",
                    vardim,
                    offset,
                ));
            }
        }
        if let Some(bounds) = &self.u_bounds {
            if bounds.len() != ncontrols {
                return Err(QontrolError::dimension(
                    "control derivative bounds",
                    ncontrols,
                    bounds.len(),
                ));
            }
        }

        let layout = system.layout(horizon, self.l1_offsets.len());

        let integrator = if self.fourth_order {
            Integrator::fourth_order(system.clone())
        } else {
            Integrator::second_order(system.clone())
        };
        let dynamics = Dynamics::new(integrator, horizon)?;

        // seed trajectory
        let seed_dt = match self.mode {
            TimeMode::FixedTime { dt } => dt,
            TimeMode::FreeTime { dt_bounds, .. } | TimeMode::MinTime { dt_bounds } => {
                0.5 * (dt_bounds.0 + dt_bounds.1)
            }
        };
        let trajectory = match self.warm_start {
            Some(warm) => {
                if warm.layout() != &layout {
                    return Err(QontrolError::configuration(
                        "warm-start trajectory has an incompatible layout",
                    ));
                }
                warm
            }
            None => {
                let mut rng = StdRng::seed_from_u64(self.seed);
                Trajectory::interpolated_with_rng(&system, layout, seed_dt, self.jitter, &mut rng)
            }
        };

        // objective
        let u_offsets: Vec<usize> = (0..ncontrols).map(|k| nstates + k).collect();
        let all_times: Vec<usize> = (0..horizon).collect();
        let mut objective =
            quadratic_regularizer(u_offsets.clone(), vardim, all_times.clone(), self.u_weight);

        match self.mode {
            TimeMode::FixedTime { .. } | TimeMode::FreeTime { .. } => {
                objective =
                    objective + quantum_objective(&system, &layout, self.cost, self.q_weight);
            }
            TimeMode::MinTime { .. } => {
                let dt_indices: Vec<usize> = (0..horizon - 1).map(|t| layout.dt_index(t)).collect();
                let smoothness = self.smoothness_weight.unwrap_or(self.u_weight);
                objective = objective
                    + min_time_objective(dt_indices, 1.)
                    + quadratic_smoothness_regularizer(
                        u_offsets.clone(),
                        vardim,
                        all_times.clone(),
                        smoothness,
                    );
            }
        }
        if let Some(sigma) = self.smoothness_weight {
            if !matches!(self.mode, TimeMode::MinTime { .. }) {
                objective = objective
                    + quadratic_smoothness_regularizer(
                        u_offsets.clone(),
                        vardim,
                        all_times.clone(),
                        sigma,
                    );
            }
        }
        if !self.l1_offsets.is_empty() {
            let mut s1 = Vec::new();
            let mut s2 = Vec::new();
            for t in 0..horizon {
                for pair in 0..self.l1_offsets.len() {
                    s1.push(layout.s1_index(t, pair));
                    s2.push(layout.s2_index(t, pair));
                }
            }
            objective = objective + l1_slack_regularizer(s1, s2, self.l1_alpha);
        }
        if let Some(extra) = self.additional_objective {
            objective = objective + extra;
        }

        // constraints
        let mut constraints: Vec<Constraint> = Vec::new();

        let wfn_offsets: Vec<usize> = (0..system.n_wfn_states()).collect();
        let init_values: Vec<E> = (0..system.n_wfn_states())
            .map(|m| system.psi_init()[m])
            .collect();
        constraints
            .push(EqualityConstraint::new(vec![0], wfn_offsets.clone(), init_values, vardim).into());

        if self.pin_endpoint_controls {
            let aug_offsets: Vec<usize> =
                (system.n_wfn_states()..system.n_wfn_states() + system.n_aug_states()).collect();
            let zeros = vec![0.; aug_offsets.len()];
            constraints.push(
                EqualityConstraint::new(vec![0, horizon - 1], aug_offsets, zeros, vardim).into(),
            );
        }

        let interior: Vec<usize> = (1..horizon - 1).collect();
        if !interior.is_empty() {
            let drive_offsets: Vec<usize> = (0..ncontrols)
                .map(|k| system.n_wfn_states() + system.drive_level() * ncontrols + k)
                .collect();
            constraints.push(
                BoundsConstraint::new(
                    interior.clone(),
                    drive_offsets,
                    system.control_bounds().to_vec(),
                    vardim,
                )
                .into(),
            );
            if let Some(bounds) = self.u_bounds {
                constraints
                    .push(BoundsConstraint::new(interior, u_offsets.clone(), bounds, vardim).into());
            }
        }

        let all_dt: Vec<usize> = (0..horizon).map(|t| layout.dt_index(t)).collect();
        match self.mode {
            TimeMode::FixedTime { dt } => {
                constraints.push(TimeStepEqualityConstraint::new(all_dt, dt).into());
            }
            TimeMode::FreeTime {
                dt_bounds,
                all_equal,
            } => {
                constraints
                    .push(TimeStepBoundsConstraint::new(all_dt, dt_bounds.0, dt_bounds.1).into());
                if all_equal {
                    let step_dt: Vec<usize> =
                        (0..horizon - 1).map(|t| layout.dt_index(t)).collect();
                    constraints
                        .push(TimeStepsAllEqualConstraint::new(step_dt, layout.dt_tie_index()).into());
                }
            }
            TimeMode::MinTime { dt_bounds } => {
                constraints
                    .push(TimeStepBoundsConstraint::new(all_dt, dt_bounds.0, dt_bounds.1).into());
                // pin the terminal wavefunctions to the warm start
                let final_values: Vec<E> = (0..system.n_wfn_states())
                    .map(|m| trajectory.data()[layout.wfn_index(horizon - 1, 0, 0) + m])
                    .collect();
                constraints.push(
                    EqualityConstraint::new(vec![horizon - 1], wfn_offsets, final_values, vardim)
                        .into(),
                );
            }
        }

        if !self.l1_offsets.is_empty() {
            let mut x = Vec::new();
            let mut s1 = Vec::new();
            let mut s2 = Vec::new();
            for t in 0..horizon {
                for (pair, &offset) in self.l1_offsets.iter().enumerate() {
                    x.push(t * vardim + offset);
                    s1.push(layout.s1_index(t, pair));
                    s2.push(layout.s2_index(t, pair));
                }
            }
            constraints.push(L1SlackConstraint::new(x, s1, s2).into());
        }

        let evaluator = ProblemEvaluator::new(dynamics, objective, &constraints, layout)?;

        Ok(QuantumControlProblem {
            system,
            mode: self.mode,
            evaluator,
            trajectory,
            constraints,
        })
    }
}

/// The assembled NLP behind the solver callback contract.
pub struct ProblemEvaluator {
    dynamics: Dynamics,
    objective: Objective,
    /// Constant Jacobian triplets `(global row, col, coeff)` of the linear
    /// constraint rows appended after the dynamics rows.
    linear_triplets: Vec<(usize, usize, E)>,
    n_linear_rows: usize,
    jac_structure: Vec<(usize, usize)>,
    hess_structure: Vec<(usize, usize)>,
    n_objective_entries: usize,
    lower: Col<E>,
    upper: Col<E>,
    n_variables: usize,
}

impl ProblemEvaluator {
    fn new(
        dynamics: Dynamics,
        objective: Objective,
        constraints: &[Constraint],
        layout: ZLayout,
    ) -> Result<Self, QontrolError> {
        let n_variables = layout.n_variables();
        let n_dynamics = dynamics.n_residuals();

        let mut lower = Col::from_fn(n_variables, |_| E::NEG_INFINITY);
        let mut upper = Col::from_fn(n_variables, |_| E::INFINITY);
        let mut linear_triplets = Vec::new();
        let mut n_linear_rows = 0;
        for constraint in constraints {
            constraint.apply_bounds(&mut lower, &mut upper);
            let base = n_dynamics + n_linear_rows;
            for (row, col, coeff) in constraint.row_triplets() {
                linear_triplets.push((base + row, col, coeff));
            }
            n_linear_rows += constraint.n_rows();
        }

        let mut jac_structure = dynamics.jacobian_structure().to_vec();
        jac_structure.extend(linear_triplets.iter().map(|&(r, c, _)| (r, c)));

        // objective entries arrive upper-triangle; flip them below the
        // diagonal to match the dynamics blocks
        let mut hess_structure: Vec<(usize, usize)> = objective
            .hessian_structure()
            .iter()
            .map(|&(k, j)| (j, k))
            .collect();
        let n_objective_entries = hess_structure.len();
        hess_structure.extend_from_slice(dynamics.hessian_structure());

        Ok(Self {
            dynamics,
            objective,
            linear_triplets,
            n_linear_rows,
            jac_structure,
            hess_structure,
            n_objective_entries,
            lower,
            upper,
            n_variables,
        })
    }

    pub fn objective_terms(&self) -> &[crate::objective::TermInfo] {
        self.objective.terms()
    }

    /// Max-norm constraint violation at `z`, the quantity iteration
    /// monitors report as primal infeasibility.
    pub fn primal_infeasibility(&mut self, z: &Col<E>) -> Result<E, QontrolError> {
        let mut residuals = vec![0.; self.n_constraints()];
        self.constraints(z, &mut residuals)?;
        Ok(norm_inf(&residuals))
    }
}

impl NlpEvaluator for ProblemEvaluator {
    fn n_variables(&self) -> usize {
        self.n_variables
    }

    fn n_constraints(&self) -> usize {
        self.dynamics.n_residuals() + self.n_linear_rows
    }

    fn variable_bounds(&self) -> (Col<E>, Col<E>) {
        (self.lower.clone(), self.upper.clone())
    }

    fn objective(&mut self, z: &Col<E>) -> Result<E, QontrolError> {
        let value = self.objective.value(z);
        ensure_finite(&[value], "objective")?;
        Ok(value)
    }

    fn gradient(&mut self, z: &Col<E>, out: &mut [E]) -> Result<(), QontrolError> {
        let g = self.objective.gradient(z);
        for (pos, slot) in out.iter_mut().enumerate() {
            *slot = g[pos];
        }
        ensure_finite(out, "objective gradient")
    }

    fn constraints(&mut self, z: &Col<E>, out: &mut [E]) -> Result<(), QontrolError> {
        let n_dynamics = self.dynamics.n_residuals();
        self.dynamics.residuals(z, &mut out[..n_dynamics])?;
        out[n_dynamics..].fill(0.);
        for &(row, col, coeff) in &self.linear_triplets {
            out[row] += coeff * z[col];
        }
        ensure_finite(out, "constraints")
    }

    fn jacobian_structure(&self) -> &[(usize, usize)] {
        &self.jac_structure
    }

    fn jacobian_values(&mut self, z: &Col<E>, out: &mut [E]) -> Result<(), QontrolError> {
        let n_dynamics = self.dynamics.jacobian_structure().len();
        self.dynamics.jacobian_values(z, &mut out[..n_dynamics])?;
        for (pos, &(_, _, coeff)) in self.linear_triplets.iter().enumerate() {
            out[n_dynamics + pos] = coeff;
        }
        Ok(())
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.hess_structure
    }

    fn hessian_values(
        &mut self,
        z: &Col<E>,
        sigma: E,
        mu: &[E],
        out: &mut [E],
    ) -> Result<(), QontrolError> {
        let objective_values = self.objective.hessian_values(z);
        debug_assert_eq!(objective_values.len(), self.n_objective_entries);
        for (pos, v) in objective_values.iter().enumerate() {
            out[pos] = sigma * v;
        }
        let n_dynamics_rows = self.dynamics.n_residuals();
        self.dynamics.hessian_values(
            z,
            &mu[..n_dynamics_rows],
            &mut out[self.n_objective_entries..],
        )?;
        ensure_finite(out, "lagrangian hessian")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::{gate, spin_operator};
    use num_complex::Complex64;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn system() -> QuantumSystem {
        QuantumSystem::builder()
            .drift(spin_operator("Z").unwrap())
            .drives(vec![spin_operator("X").unwrap(), spin_operator("Y").unwrap()])
            .initial_states(vec![vec![c(1., 0.), c(0., 0.)], vec![c(0., 0.), c(1., 0.)]])
            .goal_gate(gate("X").unwrap())
            .control_bounds(vec![1.0, 0.5])
            .build()
            .unwrap()
    }

    #[test]
    fn test_fixed_time_problem_shapes() {
        let mut problem = QuantumControlProblem::builder(system())
            .horizon(5)
            .fixed_time(0.01)
            .quantum_weight(200.)
            .control_weight(2.)
            .build()
            .unwrap();

        let layout = *problem.trajectory().layout();
        let eval = problem.evaluator_mut();
        assert_eq!(eval.n_variables(), layout.n_variables());
        // no linear rows in fixed-time mode
        assert_eq!(eval.n_constraints(), layout.nstates * 4);

        let (l, u) = eval.variable_bounds();
        // Δt slots pinned
        for t in 0..5 {
            assert_eq!(l[layout.dt_index(t)], 0.01);
            assert_eq!(u[layout.dt_index(t)], 0.01);
        }
        // initial wavefunction pinned to ψ̃init
        assert_eq!(l[layout.wfn_index(0, 0, 0)], 1.);
        assert_eq!(u[layout.wfn_index(0, 0, 0)], 1.);
        // endpoint augmented controls pinned to zero
        assert_eq!(l[layout.aug_index(0, 0, 0)], 0.);
        assert_eq!(u[layout.aug_index(4, 1, 1)], 0.);
        // interior drive amplitude bounds
        assert_eq!(l[layout.drive_index(2, 0)], -1.0);
        assert_eq!(u[layout.drive_index(2, 1)], 0.5);
    }

    #[test]
    fn test_free_time_all_equal_adds_tie_rows() {
        let mut problem = QuantumControlProblem::builder(system())
            .horizon(4)
            .free_time(0.005, 0.05, true)
            .build()
            .unwrap();
        let layout = *problem.trajectory().layout();
        let eval = problem.evaluator_mut();
        // T−1 tie rows on top of the dynamics rows
        assert_eq!(eval.n_constraints(), layout.nstates * 3 + 3);

        // tie rows are satisfied by the equal-Δt seed
        let z = problem.trajectory().data().clone();
        let eval = problem.evaluator_mut();
        let mut out = vec![1.; eval.n_constraints()];
        eval.constraints(&z, &mut out).unwrap();
        let n_dyn = layout.nstates * 3;
        assert!(out[n_dyn..].iter().all(|&v| v.abs() < 1e-14));
    }

    #[test]
    fn test_min_time_pins_terminal_state() {
        let problem = QuantumControlProblem::builder(system())
            .horizon(4)
            .min_time(0.001, 0.1)
            .build()
            .unwrap();
        let layout = *problem.trajectory().layout();
        let (l, u) = (
            problem.evaluator.lower.clone(),
            problem.evaluator.upper.clone(),
        );
        // terminal wavefunction pinned to the (interpolated) goal
        for m in 0..layout.n_wfn_states {
            let p = layout.wfn_index(3, 0, 0) + m;
            assert_eq!(l[p], u[p]);
        }
        // min-time objective carries no quantum term
        assert!(
            problem
                .evaluator
                .objective_terms()
                .iter()
                .all(|t| t.name != "infidelity")
        );
    }

    #[test]
    fn test_l1_slacks_extend_the_problem() {
        let sys = system();
        let u_offset = sys.nstates(); // first control component
        let mut problem = QuantumControlProblem::builder(sys)
            .horizon(3)
            .fixed_time(0.01)
            .l1_regularized(vec![u_offset], 0.5)
            .build()
            .unwrap();
        let layout = *problem.trajectory().layout();
        assert_eq!(layout.n_slack_pairs, 1);
        let eval = problem.evaluator_mut();
        // slack rows: one per step
        assert_eq!(eval.n_constraints(), layout.nstates * 2 + 3);
        let (l, _) = eval.variable_bounds();
        assert_eq!(l[layout.s1_index(0, 0)], 0.);
        assert_eq!(l[layout.s2_index(2, 0)], 0.);
    }

    #[test]
    fn test_missing_horizon_is_a_configuration_error() {
        let result = QuantumControlProblem::builder(system()).build();
        assert!(matches!(result, Err(QontrolError::Configuration { .. })));
    }

    #[test]
    fn test_jacobian_structure_covers_linear_rows() {
        let mut problem = QuantumControlProblem::builder(system())
            .horizon(4)
            .free_time(0.005, 0.05, true)
            .build()
            .unwrap();
        let eval = problem.evaluator_mut();
        let n = eval.jacobian_structure().len();
        let z = Col::from_fn(eval.n_variables(), |i| 0.01 * (i as E + 1.));
        let mut out = vec![0.; n];
        eval.jacobian_values(&z, &mut out).unwrap();
        // trailing tie-row coefficients are ±1
        assert_eq!(out[n - 1], -1.);
        assert_eq!(out[n - 2], 1.);
    }
}
