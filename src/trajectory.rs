//! Trajectory container: named views into the flat decision vector.
//!
//! A [`Trajectory`] owns the flat vector the solver optimizes plus the
//! [`ZLayout`] that names its sub-blocks. Seeding interpolates linearly
//! between the embedded initial and goal states (optionally with Gaussian
//! jitter); read-back after a solve reconstructs per-step states, controls
//! and the time grid, and can re-propagate the solved controls through an
//! integrator to report an independent final infidelity.

use faer::{Col, ColRef};
use rand::Rng;

use crate::E;
use crate::costs::{Cost, InfidelityCost};
use crate::error::QontrolError;
use crate::integrators::{Integrator, PadeStep, fourth_order_pade, second_order_pade};
use crate::iso::ZLayout;
use crate::linalg::matvec_accum;
use crate::system::QuantumSystem;

#[derive(Debug, Clone)]
pub struct Trajectory {
    data: Col<E>,
    layout: ZLayout,
}

impl Trajectory {
    /// Wraps an existing decision vector.
    pub fn from_vector(layout: ZLayout, data: Col<E>) -> Result<Self, QontrolError> {
        if data.nrows() != layout.n_variables() {
            return Err(QontrolError::dimension(
                "trajectory vector",
                layout.n_variables(),
                data.nrows(),
            ));
        }
        Ok(Self { data, layout })
    }

    /// Linear interpolation seed between `ψ̃init` and `ψ̃goal` with optional
    /// Gaussian jitter of standard deviation `σ` on the interior steps.
    /// Controls and slacks start at zero; every Δt slot starts at `dt`.
    pub fn interpolated(
        system: &QuantumSystem,
        horizon: usize,
        dt: E,
        jitter: Option<E>,
    ) -> Self {
        Self::interpolated_with_rng(
            system,
            system.layout(horizon, 0),
            dt,
            jitter,
            &mut rand::thread_rng(),
        )
    }

    pub fn interpolated_with_rng(
        system: &QuantumSystem,
        layout: ZLayout,
        dt: E,
        jitter: Option<E>,
        rng: &mut impl Rng,
    ) -> Self {
        let l = layout;
        let horizon = l.horizon;
        let mut data = Col::zeros(l.n_variables());

        for t in 0..horizon {
            let frac = t as E / (horizon - 1) as E;
            for i in 0..l.nqstates {
                for m in 0..l.isodim {
                    let init = system.psi_init()[i * l.isodim + m];
                    let goal = system.psi_goal()[i * l.isodim + m];
                    data[l.wfn_index(t, i, m)] = (1. - frac) * init + frac * goal;
                }
            }
        }
        for t in 0..horizon {
            data[l.dt_index(t)] = dt;
        }

        if let Some(sigma) = jitter {
            for t in 1..horizon - 1 {
                for p in l.wfn_range(t) {
                    data[p] += gaussian(rng, sigma);
                }
                for p in l.aug_range(t).chain(l.control_range(t)) {
                    data[p] += gaussian(rng, sigma);
                }
            }
        }

        Self { data, layout }
    }

    /// Uniformly random decision vector, mostly useful for derivative
    /// checks at a generic point.
    pub fn random_in(layout: ZLayout, lo: E, hi: E, rng: &mut impl Rng) -> Self {
        let samples: Vec<E> = (0..layout.n_variables())
            .map(|_| rng.gen_range(lo..hi))
            .collect();
        Self {
            data: Col::from_fn(samples.len(), |i| samples[i]),
            layout,
        }
    }

    pub fn layout(&self) -> &ZLayout {
        &self.layout
    }

    pub fn horizon(&self) -> usize {
        self.layout.horizon
    }

    pub fn data(&self) -> &Col<E> {
        &self.data
    }

    /// Replaces the backing vector, e.g. with the solver's final point.
    pub fn update(&mut self, z: Col<E>) -> Result<(), QontrolError> {
        if z.nrows() != self.layout.n_variables() {
            return Err(QontrolError::dimension(
                "trajectory update",
                self.layout.n_variables(),
                z.nrows(),
            ));
        }
        self.data = z;
        Ok(())
    }

    /// Full state block (wavefunctions + augmented controls) at step `t`.
    pub fn state(&self, t: usize) -> ColRef<'_, E> {
        self.data
            .as_ref()
            .subrows(self.layout.step_base(t), self.layout.nstates)
    }

    /// Embedded wavefunction of quantum state `i` at step `t`.
    pub fn wavefunction(&self, t: usize, i: usize) -> ColRef<'_, E> {
        self.data
            .as_ref()
            .subrows(self.layout.wfn_index(t, i, 0), self.layout.isodim)
    }

    /// Drive amplitudes `a(t)` (the values entering the Hamiltonian).
    pub fn controls(&self, t: usize) -> ColRef<'_, E> {
        let range = self.layout.drive_range(t);
        self.data.as_ref().subrows(range.start, self.layout.ncontrols)
    }

    /// Top-order decision controls `u(t)`.
    pub fn actions(&self, t: usize) -> ColRef<'_, E> {
        let range = self.layout.control_range(t);
        self.data.as_ref().subrows(range.start, self.layout.ncontrols)
    }

    pub fn timestep(&self, t: usize) -> E {
        self.data[self.layout.dt_index(t)]
    }

    /// Cumulative times, starting at zero.
    pub fn times(&self) -> Vec<E> {
        let mut times = Vec::with_capacity(self.layout.horizon);
        let mut acc = 0.;
        times.push(0.);
        for t in 0..self.layout.horizon - 1 {
            acc += self.timestep(t);
            times.push(acc);
        }
        times
    }

    pub fn total_time(&self) -> E {
        (0..self.layout.horizon - 1).map(|t| self.timestep(t)).sum()
    }

    /// Mean terminal infidelity of the stored final states.
    pub fn final_infidelity(&self, system: &QuantumSystem) -> E {
        let l = &self.layout;
        let final_step = l.horizon - 1;
        let mut total = 0.;
        for i in 0..l.nqstates {
            let goal = Col::from_fn(l.isodim, |m| system.psi_goal()[i * l.isodim + m]);
            let cost = InfidelityCost::new(goal);
            total += cost.evaluate(self.wavefunction(final_step, i));
        }
        total / l.nqstates as E
    }

    /// Re-propagates the initial states through the explicit Padé
    /// propagator using the stored controls and time steps. Returns the
    /// resulting final states, concatenated.
    pub fn rollout(&self, integrator: &Integrator) -> Col<E> {
        let system = integrator.system();
        let l = &self.layout;
        let mut ctx = integrator.make_context();
        let mut psi: Vec<E> = (0..system.n_wfn_states()).map(|m| system.psi_init()[m]).collect();
        let mut next = vec![0.; system.n_wfn_states()];
        let mut a = vec![0.; l.ncontrols];

        for t in 0..l.horizon - 1 {
            for k in 0..l.ncontrols {
                a[k] = self.data[l.drive_index(t, k)];
            }
            integrator.prepare(&a, &mut ctx);
            let dt = self.timestep(t);
            let propagator = match integrator.order() {
                2 => second_order_pade(ctx.g.as_ref(), dt),
                _ => fourth_order_pade(ctx.g.as_ref(), dt),
            };
            next.fill(0.);
            for i in 0..l.nqstates {
                matvec_accum(
                    propagator.as_ref(),
                    &psi[i * l.isodim..(i + 1) * l.isodim],
                    1.,
                    &mut next[i * l.isodim..(i + 1) * l.isodim],
                );
            }
            std::mem::swap(&mut psi, &mut next);
        }
        Col::from_fn(psi.len(), |m| psi[m])
    }

    /// Mean infidelity of the rolled-out final states against the goal.
    pub fn rollout_infidelity(&self, integrator: &Integrator) -> E {
        let system = integrator.system();
        let l = &self.layout;
        let rolled = self.rollout(integrator);
        let mut total = 0.;
        for i in 0..l.nqstates {
            let goal = Col::from_fn(l.isodim, |m| system.psi_goal()[i * l.isodim + m]);
            let cost = InfidelityCost::new(goal);
            total += cost.evaluate(rolled.as_ref().subrows(i * l.isodim, l.isodim));
        }
        total / l.nqstates as E
    }
}

fn gaussian(rng: &mut impl Rng, sigma: E) -> E {
    // Box-Muller from two uniforms
    let u1: E = rng.gen_range(1e-12..1.0);
    let u2: E = rng.gen_range(0.0..1.0);
    sigma * (-2. * u1.ln()).sqrt() * (2. * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::{gate, spin_operator};
    use num_complex::Complex64;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

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
    fn test_interpolated_seed_hits_both_endpoints() {
        let sys = system();
        let traj = Trajectory::interpolated(&sys, 5, 0.01, None);
        for i in 0..2 {
            for m in 0..4 {
                assert_eq!(traj.wavefunction(0, i)[m], sys.psi_init()[i * 4 + m]);
                assert_eq!(traj.wavefunction(4, i)[m], sys.psi_goal()[i * 4 + m]);
            }
        }
        for t in 0..5 {
            assert_eq!(traj.timestep(t), 0.01);
        }
        assert_eq!(traj.times(), vec![0., 0.01, 0.02, 0.03, 0.04]);
        assert!((traj.total_time() - 0.04).abs() < 1e-15);
        assert!((traj.final_infidelity(&sys)).abs() < 1e-12);
    }

    #[test]
    fn test_jitter_leaves_endpoints_exact() {
        let sys = system();
        let mut rng = StdRng::seed_from_u64(7);
        let traj = Trajectory::interpolated_with_rng(
            &sys,
            sys.layout(5, 0),
            0.01,
            Some(0.1),
            &mut rng,
        );
        for m in 0..4 {
            assert_eq!(traj.wavefunction(0, 0)[m], sys.psi_init()[m]);
            assert_eq!(traj.wavefunction(4, 0)[m], sys.psi_goal()[m]);
        }
        // interior got perturbed
        let mid = traj.wavefunction(2, 0);
        let clean = Trajectory::interpolated(&sys, 5, 0.01, None);
        let clean_mid = clean.wavefunction(2, 0);
        assert!((0..4).any(|m| (mid[m] - clean_mid[m]).abs() > 1e-12));
    }

    #[test]
    fn test_update_rejects_wrong_length() {
        let sys = system();
        let mut traj = Trajectory::interpolated(&sys, 5, 0.01, None);
        assert!(traj.update(Col::zeros(3)).is_err());
        let n = traj.layout().n_variables();
        assert!(traj.update(Col::zeros(n)).is_ok());
    }

    #[test]
    fn test_rollout_with_zero_controls_follows_drift() {
        // With all controls zero the rollout applies exp(G_drift Δt) steps,
        // which preserve norm exactly.
        let sys = system();
        let traj = Trajectory::interpolated(&sys, 6, 0.05, None);
        let rolled = traj.rollout(&Integrator::fourth_order(sys.clone()));
        for i in 0..2 {
            let norm: E = (0..4).map(|m| rolled[i * 4 + m] * rolled[i * 4 + m]).sum::<E>().sqrt();
            assert!((norm - 1.).abs() < 1e-10);
        }
    }
}
