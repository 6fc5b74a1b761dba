use faer::Mat;

use crate::E;
use crate::integrators::{PadeStep, StepContext};
use crate::linalg::{bilinear, mat_axpby, matvec_accum, matvec_transpose_accum};
use crate::system::QuantumSystem;

/// Second-order Padé (Crank–Nicolson) step.
///
/// The residual is linear in the drive amplitudes and in Δt·G, so every
/// drive–drive and Δt–Δt second derivative vanishes identically and the
/// scheme needs no operator cache beyond `Gₜ` itself.
#[derive(Debug, Clone)]
pub struct SecondOrderPade {
    system: QuantumSystem,
}

impl SecondOrderPade {
    pub fn new(system: QuantumSystem) -> Self {
        Self { system }
    }
}

impl PadeStep for SecondOrderPade {
    fn system(&self) -> &QuantumSystem {
        &self.system
    }

    fn name(&self) -> &'static str {
        "pade2"
    }

    fn order(&self) -> usize {
        2
    }

    fn has_control_curvature(&self) -> bool {
        false
    }

    fn make_context(&self) -> StepContext {
        let n = self.system.isodim();
        StepContext {
            g: Mat::zeros(n, n),
            g_sq: Mat::zeros(0, 0),
            anticoms: Vec::new(),
        }
    }

    fn prepare(&self, a: &[E], ctx: &mut StepContext) {
        debug_assert_eq!(a.len(), self.system.ncontrols());
        ctx.g.copy_from(self.system.g_drift());
        for (k, g_k) in self.system.g_drives().iter().enumerate() {
            mat_axpby(a[k], g_k.as_ref(), 1., &mut ctx.g);
        }
    }

    fn residual(&self, ctx: &StepContext, dt: E, delta: &[E], sigma: &[E], out: &mut [E]) {
        out.copy_from_slice(delta);
        matvec_accum(ctx.g.as_ref(), sigma, -0.5 * dt, out);
    }

    fn state_jacobians(
        &self,
        ctx: &StepContext,
        dt: E,
        d_psi: &mut Mat<E>,
        d_psi_next: &mut Mat<E>,
    ) {
        let n = self.system.isodim();
        for r in 0..n {
            for c in 0..n {
                let diag = if r == c { 1. } else { 0. };
                let skew = 0.5 * dt * ctx.g[(r, c)];
                d_psi[(r, c)] = -diag - skew;
                d_psi_next[(r, c)] = diag - skew;
            }
        }
    }

    fn control_jacobian(
        &self,
        _ctx: &StepContext,
        j: usize,
        dt: E,
        _delta: &[E],
        sigma: &[E],
        out: &mut [E],
    ) {
        out.fill(0.);
        matvec_accum(self.system.g_drives()[j].as_ref(), sigma, -0.5 * dt, out);
    }

    fn timestep_jacobian(&self, ctx: &StepContext, _dt: E, _delta: &[E], sigma: &[E], out: &mut [E]) {
        out.fill(0.);
        matvec_accum(ctx.g.as_ref(), sigma, -0.5, out);
    }

    fn hess_drive_drive(&self, _k: usize, _j: usize, _dt: E, _delta: &[E], _mu: &[E]) -> E {
        0.
    }

    fn hess_drive_psi(&self, _ctx: &StepContext, j: usize, dt: E, mu: &[E], out: &mut [E]) {
        out.fill(0.);
        matvec_transpose_accum(self.system.g_drives()[j].as_ref(), mu, -0.5 * dt, out);
    }

    fn hess_drive_psi_next(&self, ctx: &StepContext, j: usize, dt: E, mu: &[E], out: &mut [E]) {
        // same mixed derivative on both sides of the step
        self.hess_drive_psi(ctx, j, dt, mu, out);
    }

    fn hess_dt_dt(&self, _ctx: &StepContext, _delta: &[E], _mu: &[E]) -> E {
        0.
    }

    fn hess_dt_psi(&self, ctx: &StepContext, _dt: E, mu: &[E], out: &mut [E]) {
        out.fill(0.);
        matvec_transpose_accum(ctx.g.as_ref(), mu, -0.5, out);
    }

    fn hess_dt_psi_next(&self, ctx: &StepContext, dt: E, mu: &[E], out: &mut [E]) {
        self.hess_dt_psi(ctx, dt, mu, out);
    }

    fn hess_dt_drive(
        &self,
        _ctx: &StepContext,
        j: usize,
        _dt: E,
        _delta: &[E],
        sigma: &[E],
        mu: &[E],
    ) -> E {
        -0.5 * bilinear(mu, self.system.g_drives()[j].as_ref(), sigma)
    }
}
