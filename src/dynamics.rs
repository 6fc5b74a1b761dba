//! # Dynamics assembler
//!
//! Stitches the per-step integrator residuals into the global equality
//! constraint `F(Z)` of the NLP, together with its sparse Jacobian `∇F` and
//! the sparse Hessian of the Lagrangian `Σᵣ μᵣ ∇²Fᵣ`.
//!
//! Residual rows for step `t` (one block of `nstates` rows per step,
//! `t = 0..T−2`):
//!
//! ```text
//! [ P⁰ₜ … Pⁿₜ | augmented forward-Euler chain ]
//! ```
//!
//! where the chain promotes each control derivative through
//! `z_ℓ(t+1) = z_ℓ(t) + Δtₜ·z_{ℓ+1}(t)`, with the top-order entry fed by the
//! decision control `u`.
//!
//! Sparsity follows the structure + values contract: the coordinate lists
//! are computed once at construction (a pure function of the problem
//! dimensions), the value buffers are rewritten positionally on every call,
//! and repeated coordinates are summed by the consumer. Hessian coordinates
//! are lower-triangle. The emission loops of the structure and value
//! functions are kept textually parallel; a unit test pins their lengths to
//! each other.

use faer::{Col, Mat};

use crate::E;
use crate::error::{QontrolError, ensure_finite};
use crate::integrators::{Integrator, PadeStep, StepContext};
use crate::iso::ZLayout;

pub struct Dynamics {
    integrator: Integrator,
    layout: ZLayout,
    jac_structure: Vec<(usize, usize)>,
    hess_structure: Vec<(usize, usize)>,
    scratch: Scratch,
}

struct Scratch {
    ctx: StepContext,
    d_psi: Mat<E>,
    d_psi_next: Mat<E>,
    d_ctrl: Mat<E>,
    a: Vec<E>,
    /// ψ̃ⁱₜ₊₁ − ψ̃ⁱₜ for all quantum states of the current step.
    delta: Vec<E>,
    /// ψ̃ⁱₜ₊₁ + ψ̃ⁱₜ for all quantum states of the current step.
    sigma: Vec<E>,
    col: Vec<E>,
}

impl Dynamics {
    pub fn new(integrator: Integrator, horizon: usize) -> Result<Self, QontrolError> {
        if horizon < 2 {
            return Err(QontrolError::configuration(
                "dynamics need a horizon of at least two time steps",
            ));
        }
        let sys = integrator.system();
        let layout = sys.layout(horizon, 0);
        let n = sys.isodim();
        let scratch = Scratch {
            ctx: integrator.make_context(),
            d_psi: Mat::zeros(n, n),
            d_psi_next: Mat::zeros(n, n),
            d_ctrl: Mat::zeros(n, sys.ncontrols()),
            a: vec![0.; sys.ncontrols()],
            delta: vec![0.; sys.nqstates() * n],
            sigma: vec![0.; sys.nqstates() * n],
            col: vec![0.; n],
        };

        let jac_structure = jacobian_structure(&layout);
        let hess_structure = hessian_structure(&layout, integrator.has_control_curvature());

        Ok(Self {
            integrator,
            layout,
            jac_structure,
            hess_structure,
            scratch,
        })
    }

    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    pub fn layout(&self) -> &ZLayout {
        &self.layout
    }

    pub fn n_residuals(&self) -> usize {
        self.layout.nstates * (self.layout.horizon - 1)
    }

    pub fn jacobian_structure(&self) -> &[(usize, usize)] {
        &self.jac_structure
    }

    pub fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.hess_structure
    }

    /// Loads the per-step quantities shared by every callback: drive
    /// amplitudes, state sums/differences, and the integrator context.
    fn load_step(&mut self, z: &Col<E>, t: usize) {
        let l = &self.layout;
        for k in 0..l.ncontrols {
            self.scratch.a[k] = z[l.drive_index(t, k)];
        }
        self.integrator.prepare(&self.scratch.a, &mut self.scratch.ctx);
        for i in 0..l.nqstates {
            for m in 0..l.isodim {
                let cur = z[l.wfn_index(t, i, m)];
                let next = z[l.wfn_index(t + 1, i, m)];
                self.scratch.delta[i * l.isodim + m] = next - cur;
                self.scratch.sigma[i * l.isodim + m] = next + cur;
            }
        }
    }

    /// `F(Z)` into `out` (length `nstates·(T−1)`).
    pub fn residuals(&mut self, z: &Col<E>, out: &mut [E]) -> Result<(), QontrolError> {
        let l = self.layout;
        debug_assert_eq!(out.len(), self.n_residuals());

        for t in 0..l.horizon - 1 {
            self.load_step(z, t);
            let dt = z[l.dt_index(t)];
            let row_base = t * l.nstates;

            for i in 0..l.nqstates {
                let delta = &self.scratch.delta[i * l.isodim..(i + 1) * l.isodim];
                let sigma = &self.scratch.sigma[i * l.isodim..(i + 1) * l.isodim];
                let rows = &mut out[row_base + i * l.isodim..row_base + (i + 1) * l.isodim];
                self.integrator.residual(&self.scratch.ctx, dt, delta, sigma, rows);
            }

            for level in 0..l.augdim {
                for k in 0..l.ncontrols {
                    let row = row_base + l.n_wfn_states + level * l.ncontrols + k;
                    let cur = z[l.chain_index(t, level, k)];
                    let next = z[l.chain_index(t + 1, level, k)];
                    let deriv = z[l.chain_index(t, level + 1, k)];
                    out[row] = next - cur - dt * deriv;
                }
            }
        }
        ensure_finite(out, "dynamics residual")
    }

    /// Jacobian values in structure order.
    pub fn jacobian_values(&mut self, z: &Col<E>, out: &mut [E]) -> Result<(), QontrolError> {
        let l = self.layout;
        debug_assert_eq!(out.len(), self.jac_structure.len());
        let mut pos = 0;

        for t in 0..l.horizon - 1 {
            self.load_step(z, t);
            let dt = z[l.dt_index(t)];

            self.integrator.state_jacobians(
                &self.scratch.ctx,
                dt,
                &mut self.scratch.d_psi,
                &mut self.scratch.d_psi_next,
            );

            for i in 0..l.nqstates {
                let delta = &self.scratch.delta[i * l.isodim..(i + 1) * l.isodim];
                let sigma = &self.scratch.sigma[i * l.isodim..(i + 1) * l.isodim];

                for j in 0..l.ncontrols {
                    self.integrator.control_jacobian(
                        &self.scratch.ctx,
                        j,
                        dt,
                        delta,
                        sigma,
                        &mut self.scratch.col,
                    );
                    for r in 0..l.isodim {
                        self.scratch.d_ctrl[(r, j)] = self.scratch.col[r];
                    }
                }

                // ∂P/∂ψ̃ₜ
                for r in 0..l.isodim {
                    for m in 0..l.isodim {
                        out[pos] = self.scratch.d_psi[(r, m)];
                        pos += 1;
                    }
                }
                // ∂P/∂a
                for r in 0..l.isodim {
                    for j in 0..l.ncontrols {
                        out[pos] = self.scratch.d_ctrl[(r, j)];
                        pos += 1;
                    }
                }
                // ∂P/∂ψ̃ₜ₊₁
                for r in 0..l.isodim {
                    for m in 0..l.isodim {
                        out[pos] = self.scratch.d_psi_next[(r, m)];
                        pos += 1;
                    }
                }
                // ∂P/∂Δtₜ
                self.integrator.timestep_jacobian(
                    &self.scratch.ctx,
                    dt,
                    delta,
                    sigma,
                    &mut self.scratch.col,
                );
                for r in 0..l.isodim {
                    out[pos] = self.scratch.col[r];
                    pos += 1;
                }
            }

            // augmented chain rows
            for level in 0..l.augdim {
                for k in 0..l.ncontrols {
                    out[pos] = -1.;
                    out[pos + 1] = -dt;
                    out[pos + 2] = 1.;
                    out[pos + 3] = -z[l.chain_index(t, level + 1, k)];
                    pos += 4;
                }
            }
        }
        debug_assert_eq!(pos, out.len());
        ensure_finite(out, "dynamics jacobian")
    }

    /// `Σᵣ μᵣ ∇²Fᵣ` values in structure order (lower triangle).
    pub fn hessian_values(
        &mut self,
        z: &Col<E>,
        mu: &[E],
        out: &mut [E],
    ) -> Result<(), QontrolError> {
        let l = self.layout;
        debug_assert_eq!(mu.len(), self.n_residuals());
        debug_assert_eq!(out.len(), self.hess_structure.len());
        let curvature = self.integrator.has_control_curvature();
        let mut pos = 0;

        for t in 0..l.horizon - 1 {
            self.load_step(z, t);
            let dt = z[l.dt_index(t)];
            let row_base = t * l.nstates;

            // (a_j, ψ̃ⁱₜ)
            for j in 0..l.ncontrols {
                for i in 0..l.nqstates {
                    let mu_i = &mu[row_base + i * l.isodim..row_base + (i + 1) * l.isodim];
                    self.integrator
                        .hess_drive_psi(&self.scratch.ctx, j, dt, mu_i, &mut self.scratch.col);
                    for m in 0..l.isodim {
                        out[pos] = self.scratch.col[m];
                        pos += 1;
                    }
                }
            }

            // (ψ̃ⁱₜ₊₁, a_j)
            for j in 0..l.ncontrols {
                for i in 0..l.nqstates {
                    let mu_i = &mu[row_base + i * l.isodim..row_base + (i + 1) * l.isodim];
                    self.integrator.hess_drive_psi_next(
                        &self.scratch.ctx,
                        j,
                        dt,
                        mu_i,
                        &mut self.scratch.col,
                    );
                    for m in 0..l.isodim {
                        out[pos] = self.scratch.col[m];
                        pos += 1;
                    }
                }
            }

            // (a_k, a_j), k ≥ j (fourth order only)
            if curvature {
                for k in 0..l.ncontrols {
                    for j in 0..=k {
                        let mut total = 0.;
                        for i in 0..l.nqstates {
                            let mu_i =
                                &mu[row_base + i * l.isodim..row_base + (i + 1) * l.isodim];
                            let delta = &self.scratch.delta[i * l.isodim..(i + 1) * l.isodim];
                            total += self.integrator.hess_drive_drive(k, j, dt, delta, mu_i);
                        }
                        out[pos] = total;
                        pos += 1;
                    }
                }
            }

            // (Δtₜ, ψ̃ⁱₜ)
            for i in 0..l.nqstates {
                let mu_i = &mu[row_base + i * l.isodim..row_base + (i + 1) * l.isodim];
                self.integrator
                    .hess_dt_psi(&self.scratch.ctx, dt, mu_i, &mut self.scratch.col);
                for m in 0..l.isodim {
                    out[pos] = self.scratch.col[m];
                    pos += 1;
                }
            }

            // (Δtₜ, ψ̃ⁱₜ₊₁)
            for i in 0..l.nqstates {
                let mu_i = &mu[row_base + i * l.isodim..row_base + (i + 1) * l.isodim];
                self.integrator
                    .hess_dt_psi_next(&self.scratch.ctx, dt, mu_i, &mut self.scratch.col);
                for m in 0..l.isodim {
                    out[pos] = self.scratch.col[m];
                    pos += 1;
                }
            }

            // (Δtₜ, a_j)
            for j in 0..l.ncontrols {
                let mut total = 0.;
                for i in 0..l.nqstates {
                    let mu_i = &mu[row_base + i * l.isodim..row_base + (i + 1) * l.isodim];
                    let delta = &self.scratch.delta[i * l.isodim..(i + 1) * l.isodim];
                    let sigma = &self.scratch.sigma[i * l.isodim..(i + 1) * l.isodim];
                    total +=
                        self.integrator
                            .hess_dt_drive(&self.scratch.ctx, j, dt, delta, sigma, mu_i);
                }
                out[pos] = total;
                pos += 1;
            }

            // (Δtₜ, Δtₜ) (fourth order only)
            if curvature {
                let mut total = 0.;
                for i in 0..l.nqstates {
                    let mu_i = &mu[row_base + i * l.isodim..row_base + (i + 1) * l.isodim];
                    let delta = &self.scratch.delta[i * l.isodim..(i + 1) * l.isodim];
                    total += self.integrator.hess_dt_dt(&self.scratch.ctx, delta, mu_i);
                }
                out[pos] = total;
                pos += 1;
            }

            // (Δtₜ, chain derivative) from the forward-Euler rows
            for level in 0..l.augdim {
                for k in 0..l.ncontrols {
                    let row = row_base + l.n_wfn_states + level * l.ncontrols + k;
                    out[pos] = -mu[row];
                    pos += 1;
                }
            }
        }
        debug_assert_eq!(pos, out.len());
        ensure_finite(out, "dynamics hessian")
    }
}

/// Jacobian coordinates, emitted in the exact order `jacobian_values`
/// writes them.
fn jacobian_structure(l: &ZLayout) -> Vec<(usize, usize)> {
    let per_state = 2 * l.isodim * l.isodim + l.isodim * l.ncontrols + l.isodim;
    let per_step = l.nqstates * per_state + l.augdim * l.ncontrols * 4;
    let mut coords = Vec::with_capacity((l.horizon - 1) * per_step);

    for t in 0..l.horizon - 1 {
        let row_base = t * l.nstates;
        for i in 0..l.nqstates {
            for r in 0..l.isodim {
                let row = row_base + i * l.isodim + r;
                for m in 0..l.isodim {
                    coords.push((row, l.wfn_index(t, i, m)));
                }
            }
            for r in 0..l.isodim {
                let row = row_base + i * l.isodim + r;
                for j in 0..l.ncontrols {
                    coords.push((row, l.drive_index(t, j)));
                }
            }
            for r in 0..l.isodim {
                let row = row_base + i * l.isodim + r;
                for m in 0..l.isodim {
                    coords.push((row, l.wfn_index(t + 1, i, m)));
                }
            }
            for r in 0..l.isodim {
                let row = row_base + i * l.isodim + r;
                coords.push((row, l.dt_index(t)));
            }
        }
        for level in 0..l.augdim {
            for k in 0..l.ncontrols {
                let row = row_base + l.n_wfn_states + level * l.ncontrols + k;
                coords.push((row, l.chain_index(t, level, k)));
                coords.push((row, l.chain_index(t, level + 1, k)));
                coords.push((row, l.chain_index(t + 1, level, k)));
                coords.push((row, l.dt_index(t)));
            }
        }
    }
    coords
}

/// Lower-triangle Hessian coordinates, in the exact order `hessian_values`
/// writes them. When the integrator has no control curvature the
/// drive–drive and Δt–Δt blocks are absent entirely.
fn hessian_structure(l: &ZLayout, curvature: bool) -> Vec<(usize, usize)> {
    let mut coords = Vec::new();

    for t in 0..l.horizon - 1 {
        for j in 0..l.ncontrols {
            for i in 0..l.nqstates {
                for m in 0..l.isodim {
                    coords.push((l.drive_index(t, j), l.wfn_index(t, i, m)));
                }
            }
        }
        for j in 0..l.ncontrols {
            for i in 0..l.nqstates {
                for m in 0..l.isodim {
                    coords.push((l.wfn_index(t + 1, i, m), l.drive_index(t, j)));
                }
            }
        }
        if curvature {
            for k in 0..l.ncontrols {
                for j in 0..=k {
                    coords.push((l.drive_index(t, k), l.drive_index(t, j)));
                }
            }
        }
        for i in 0..l.nqstates {
            for m in 0..l.isodim {
                coords.push((l.dt_index(t), l.wfn_index(t, i, m)));
            }
        }
        for i in 0..l.nqstates {
            for m in 0..l.isodim {
                coords.push((l.dt_index(t), l.wfn_index(t + 1, i, m)));
            }
        }
        for j in 0..l.ncontrols {
            coords.push((l.dt_index(t), l.drive_index(t, j)));
        }
        if curvature {
            coords.push((l.dt_index(t), l.dt_index(t)));
        }
        for level in 0..l.augdim {
            for k in 0..l.ncontrols {
                coords.push((l.dt_index(t), l.chain_index(t, level + 1, k)));
            }
        }
    }
    coords
}
