use faer::Mat;

use crate::E;
use crate::integrators::{PADE4_COEFF, PadeStep, StepContext};
use crate::linalg::{anticommutator, bilinear, mat_axpby, matmul_into, matvec_accum, matvec_transpose_accum};
use crate::system::QuantumSystem;

/// Fourth-order Padé step.
///
/// The quadratic `Gₜ²` term makes the residual curved in the drive
/// amplitudes and the time step; the associated second derivatives all run
/// through anticommutators of the drive generators, which are precomputed
/// once here:
///
/// * `drift_anticoms[j] = {G_drives[j], G_drift}`
/// * `drive_anticoms[k, j] = {G_drives[k], G_drives[j]}` for `k ≤ j`,
///   stored as a flattened upper triangle with symmetric lookup; the
///   diagonal holds `2·G_drives[k]²`.
///
/// `prepare` then assembles `Gₜ`, `Gₜ²` and `{G_drives[j], Gₜ}` by pure
/// accumulation over the cache, with no matrix products per step.
#[derive(Debug, Clone)]
pub struct FourthOrderPade {
    system: QuantumSystem,
    g_drift_sq: Mat<E>,
    drift_anticoms: Vec<Mat<E>>,
    drive_anticoms: Vec<Mat<E>>,
}

impl FourthOrderPade {
    pub fn new(system: QuantumSystem) -> Self {
        let n = system.isodim();
        let nc = system.ncontrols();

        let mut g_drift_sq = Mat::zeros(n, n);
        matmul_into(
            system.g_drift().as_ref(),
            system.g_drift().as_ref(),
            &mut g_drift_sq,
        );

        let drift_anticoms = (0..nc)
            .map(|j| anticommutator(system.g_drives()[j].as_ref(), system.g_drift().as_ref()))
            .collect();

        let mut drive_anticoms = Vec::with_capacity(nc * (nc + 1) / 2);
        for k in 0..nc {
            for j in k..nc {
                drive_anticoms.push(anticommutator(
                    system.g_drives()[k].as_ref(),
                    system.g_drives()[j].as_ref(),
                ));
            }
        }

        Self {
            system,
            g_drift_sq,
            drift_anticoms,
            drive_anticoms,
        }
    }

    /// Symmetric lookup into the flattened upper-triangular table.
    pub(crate) fn drive_anticom(&self, k: usize, j: usize) -> &Mat<E> {
        let nc = self.system.ncontrols();
        let (lo, hi) = if k <= j { (k, j) } else { (j, k) };
        // row `lo` of the upper triangle starts after lo rows of shrinking length
        let offset = lo * nc - lo * (lo + 1) / 2 + lo;
        &self.drive_anticoms[offset + (hi - lo)]
    }
}

impl PadeStep for FourthOrderPade {
    fn system(&self) -> &QuantumSystem {
        &self.system
    }

    fn name(&self) -> &'static str {
        "pade4"
    }

    fn order(&self) -> usize {
        4
    }

    fn has_control_curvature(&self) -> bool {
        true
    }

    fn make_context(&self) -> StepContext {
        let n = self.system.isodim();
        let nc = self.system.ncontrols();
        StepContext {
            g: Mat::zeros(n, n),
            g_sq: Mat::zeros(n, n),
            anticoms: (0..nc).map(|_| Mat::zeros(n, n)).collect(),
        }
    }

    fn prepare(&self, a: &[E], ctx: &mut StepContext) {
        let nc = self.system.ncontrols();
        debug_assert_eq!(a.len(), nc);

        ctx.g.copy_from(self.system.g_drift());
        for (k, g_k) in self.system.g_drives().iter().enumerate() {
            mat_axpby(a[k], g_k.as_ref(), 1., &mut ctx.g);
        }

        // Gₜ² = G_drift² + Σⱼ aⱼ{G_drift, Gⱼ} + Σ_{k<j} aₖaⱼ{Gₖ, Gⱼ}
        //       + Σₖ (aₖ²/2)·{Gₖ, Gₖ}
        ctx.g_sq.copy_from(&self.g_drift_sq);
        for j in 0..nc {
            mat_axpby(a[j], self.drift_anticoms[j].as_ref(), 1., &mut ctx.g_sq);
        }
        for k in 0..nc {
            for j in k..nc {
                let weight = if k == j {
                    0.5 * a[k] * a[k]
                } else {
                    a[k] * a[j]
                };
                mat_axpby(weight, self.drive_anticom(k, j).as_ref(), 1., &mut ctx.g_sq);
            }
        }

        // {Gⱼ, Gₜ} = {Gⱼ, G_drift} + Σₖ aₖ{Gₖ, Gⱼ}
        for j in 0..nc {
            ctx.anticoms[j].copy_from(&self.drift_anticoms[j]);
            for k in 0..nc {
                mat_axpby(a[k], self.drive_anticom(k, j).as_ref(), 1., &mut ctx.anticoms[j]);
            }
        }
    }

    fn residual(&self, ctx: &StepContext, dt: E, delta: &[E], sigma: &[E], out: &mut [E]) {
        out.copy_from_slice(delta);
        matvec_accum(ctx.g_sq.as_ref(), delta, PADE4_COEFF * dt * dt, out);
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
        let quad = PADE4_COEFF * dt * dt;
        for r in 0..n {
            for c in 0..n {
                let sym = if r == c { 1. } else { 0. } + quad * ctx.g_sq[(r, c)];
                let skew = 0.5 * dt * ctx.g[(r, c)];
                d_psi[(r, c)] = -sym - skew;
                d_psi_next[(r, c)] = sym - skew;
            }
        }
    }

    fn control_jacobian(
        &self,
        ctx: &StepContext,
        j: usize,
        dt: E,
        delta: &[E],
        sigma: &[E],
        out: &mut [E],
    ) {
        out.fill(0.);
        matvec_accum(ctx.anticoms[j].as_ref(), delta, PADE4_COEFF * dt * dt, out);
        matvec_accum(self.system.g_drives()[j].as_ref(), sigma, -0.5 * dt, out);
    }

    fn timestep_jacobian(&self, ctx: &StepContext, dt: E, delta: &[E], sigma: &[E], out: &mut [E]) {
        out.fill(0.);
        matvec_accum(ctx.g_sq.as_ref(), delta, 2. * PADE4_COEFF * dt, out);
        matvec_accum(ctx.g.as_ref(), sigma, -0.5, out);
    }

    fn hess_drive_drive(&self, k: usize, j: usize, dt: E, delta: &[E], mu: &[E]) -> E {
        PADE4_COEFF * dt * dt * bilinear(mu, self.drive_anticom(k, j).as_ref(), delta)
    }

    fn hess_drive_psi(&self, ctx: &StepContext, j: usize, dt: E, mu: &[E], out: &mut [E]) {
        out.fill(0.);
        matvec_transpose_accum(ctx.anticoms[j].as_ref(), mu, -PADE4_COEFF * dt * dt, out);
        matvec_transpose_accum(self.system.g_drives()[j].as_ref(), mu, -0.5 * dt, out);
    }

    fn hess_drive_psi_next(&self, ctx: &StepContext, j: usize, dt: E, mu: &[E], out: &mut [E]) {
        out.fill(0.);
        matvec_transpose_accum(ctx.anticoms[j].as_ref(), mu, PADE4_COEFF * dt * dt, out);
        matvec_transpose_accum(self.system.g_drives()[j].as_ref(), mu, -0.5 * dt, out);
    }

    fn hess_dt_dt(&self, ctx: &StepContext, delta: &[E], mu: &[E]) -> E {
        2. * PADE4_COEFF * bilinear(mu, ctx.g_sq.as_ref(), delta)
    }

    fn hess_dt_psi(&self, ctx: &StepContext, dt: E, mu: &[E], out: &mut [E]) {
        out.fill(0.);
        matvec_transpose_accum(ctx.g_sq.as_ref(), mu, -2. * PADE4_COEFF * dt, out);
        matvec_transpose_accum(ctx.g.as_ref(), mu, -0.5, out);
    }

    fn hess_dt_psi_next(&self, ctx: &StepContext, dt: E, mu: &[E], out: &mut [E]) {
        out.fill(0.);
        matvec_transpose_accum(ctx.g_sq.as_ref(), mu, 2. * PADE4_COEFF * dt, out);
        matvec_transpose_accum(ctx.g.as_ref(), mu, -0.5, out);
    }

    fn hess_dt_drive(
        &self,
        ctx: &StepContext,
        j: usize,
        dt: E,
        delta: &[E],
        sigma: &[E],
        mu: &[E],
    ) -> E {
        2. * PADE4_COEFF * dt * bilinear(mu, ctx.anticoms[j].as_ref(), delta)
            - 0.5 * bilinear(mu, self.system.g_drives()[j].as_ref(), sigma)
    }
}
