//! Real embedding of complex quantum states and operators.
//!
//! A complex vector `ψ ∈ ℂⁿ` is stored as a real vector `ψ̃ ∈ ℝ²ⁿ` with the
//! real parts first and the imaginary parts second. A Hermitian `H` acts on
//! the embedded state through the real generator
//!
//! ```text
//! G(H) = I₂ ⊗ Im(H) − J₂ ⊗ Re(H),    J₂ = [[0, −1], [1, 0]]
//! ```
//!
//! so that `d/dt ψ̃ = G(H) ψ̃` reproduces `d/dt ψ = −i H ψ`. For Hermitian
//! `H` the generator is antisymmetric, which is what makes the Padé steps
//! in [`crate::integrators`] norm-preserving.
//!
//! This module also owns the index arithmetic for the flat decision vector:
//! the per-step slice layout and the [`ZLayout`] helper that the assembler,
//! objective factories and trajectory container all share.

use std::ops::Range;

use faer::{Col, ColRef, Mat};
use num_complex::Complex64;

use crate::E;
use crate::error::QontrolError;

/// Dense complex matrix, row-major. Boundary type only: Hamiltonians and
/// gates enter the library as [`CMat`] and are converted to real generators
/// before any numerics happen.
#[derive(Debug, Clone, PartialEq)]
pub struct CMat {
    nrows: usize,
    ncols: usize,
    data: Vec<Complex64>,
}

impl CMat {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![Complex64::new(0., 0.); nrows * ncols],
        }
    }

    pub fn from_fn(nrows: usize, ncols: usize, f: impl Fn(usize, usize) -> Complex64) -> Self {
        let mut m = Self::zeros(nrows, ncols);
        for r in 0..nrows {
            for c in 0..ncols {
                m[(r, c)] = f(r, c);
            }
        }
        m
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |r, c| {
            Complex64::new(if r == c { 1. } else { 0. }, 0.)
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    /// Conjugate transpose.
    pub fn dagger(&self) -> Self {
        Self::from_fn(self.ncols, self.nrows, |r, c| self[(c, r)].conj())
    }

    pub fn is_hermitian(&self, tol: E) -> bool {
        if !self.is_square() {
            return false;
        }
        for r in 0..self.nrows {
            for c in 0..self.ncols {
                if (self[(r, c)] - self[(c, r)].conj()).norm() > tol {
                    return false;
                }
            }
        }
        true
    }

    pub fn scale(&self, s: Complex64) -> Self {
        Self::from_fn(self.nrows, self.ncols, |r, c| s * self[(r, c)])
    }

    pub fn matmul(&self, rhs: &CMat) -> Self {
        assert_eq!(self.ncols, rhs.nrows);
        Self::from_fn(self.nrows, rhs.ncols, |r, c| {
            (0..self.ncols).map(|k| self[(r, k)] * rhs[(k, c)]).sum()
        })
    }

    pub fn add(&self, rhs: &CMat) -> Self {
        assert_eq!((self.nrows, self.ncols), (rhs.nrows, rhs.ncols));
        Self::from_fn(self.nrows, self.ncols, |r, c| self[(r, c)] + rhs[(r, c)])
    }

    /// Kronecker product `self ⊗ rhs`.
    pub fn kron(&self, rhs: &CMat) -> Self {
        let (p, q) = (rhs.nrows, rhs.ncols);
        Self::from_fn(self.nrows * p, self.ncols * q, |r, c| {
            self[(r / p, c / q)] * rhs[(r % p, c % q)]
        })
    }

    pub fn mul_ket(&self, ket: &[Complex64]) -> Vec<Complex64> {
        assert_eq!(self.ncols, ket.len());
        (0..self.nrows)
            .map(|r| (0..self.ncols).map(|c| self[(r, c)] * ket[c]).sum())
            .collect()
    }
}

impl std::ops::Index<(usize, usize)> for CMat {
    type Output = Complex64;

    fn index(&self, (r, c): (usize, usize)) -> &Complex64 {
        &self.data[r * self.ncols + c]
    }
}

impl std::ops::IndexMut<(usize, usize)> for CMat {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut Complex64 {
        &mut self.data[r * self.ncols + c]
    }
}

/// Embeds a complex ket as `[Re ψ; Im ψ]`.
pub fn ket_to_iso(ket: &[Complex64]) -> Col<E> {
    let n = ket.len();
    Col::from_fn(2 * n, |m| if m < n { ket[m].re } else { ket[m - n].im })
}

/// Inverse of [`ket_to_iso`]. Exact: components are copied, never combined.
pub fn iso_to_ket(iso: ColRef<'_, E>) -> Vec<Complex64> {
    let n2 = iso.nrows();
    assert!(n2 % 2 == 0, "iso vector length must be even");
    let n = n2 / 2;
    (0..n).map(|m| Complex64::new(iso[m], iso[n + m])).collect()
}

/// The real generator `G(H) = I₂ ⊗ Im(H) − J₂ ⊗ Re(H)`.
///
/// Written out in blocks:
///
/// ```text
/// G(H) = [  Im(H)   Re(H) ]
///        [ −Re(H)   Im(H) ]
/// ```
///
/// Antisymmetric whenever `H` is Hermitian.
pub fn generator(h: &CMat) -> Result<Mat<E>, QontrolError> {
    if !h.is_square() {
        return Err(QontrolError::dimension(
            "generator of non-square operator",
            h.nrows(),
            h.ncols(),
        ));
    }
    let n = h.nrows();
    Ok(Mat::from_fn(2 * n, 2 * n, |r, c| {
        let entry = &h[(r % n, c % n)];
        match (r < n, c < n) {
            (true, true) | (false, false) => entry.im,
            (true, false) => entry.re,
            (false, true) => -entry.re,
        }
    }))
}

/// The real embedding of `H` itself (as opposed to `−iH`):
/// `[[Re(H), −Im(H)], [Im(H), Re(H)]]`. Symmetric for Hermitian `H`; used by
/// the energy cost and by the generator identities (`G(H)` equals the
/// embedding of `−iH`).
pub fn iso_operator(h: &CMat) -> Result<Mat<E>, QontrolError> {
    if !h.is_square() {
        return Err(QontrolError::dimension(
            "embedding of non-square operator",
            h.nrows(),
            h.ncols(),
        ));
    }
    let n = h.nrows();
    Ok(Mat::from_fn(2 * n, 2 * n, |r, c| {
        let entry = &h[(r % n, c % n)];
        match (r < n, c < n) {
            (true, true) | (false, false) => entry.re,
            (true, false) => -entry.im,
            (false, true) => entry.im,
        }
    }))
}

/// Index range of the `t`-th per-step slice of the decision vector.
pub fn step_slice(t: usize, vardim: usize) -> Range<usize> {
    t * vardim..(t + 1) * vardim
}

/// Contiguous sub-block of the `t`-th step at a named offset.
pub fn step_block(t: usize, offset: usize, len: usize, vardim: usize) -> Range<usize> {
    let base = t * vardim + offset;
    base..base + len
}

/// Arbitrary within-step offset pattern lifted to step `t`.
pub fn step_indices(t: usize, offsets: &[usize], vardim: usize) -> Vec<usize> {
    offsets.iter().map(|&o| t * vardim + o).collect()
}

/// Index map for the flat decision vector
///
/// ```text
/// Z = [ step 0 | step 1 | … | step T−1 | Δt₀ … Δt_{T−1} | slacks ]
/// ```
///
/// with each step laid out as wavefunctions, augmented controls grouped by
/// derivative level, then top-order controls. The final Δt slot is the
/// shared duplicate used to tie steps together in equal-Δt mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZLayout {
    pub horizon: usize,
    pub vardim: usize,
    pub nstates: usize,
    pub n_wfn_states: usize,
    pub isodim: usize,
    pub nqstates: usize,
    pub ncontrols: usize,
    pub augdim: usize,
    /// Augmented level holding the drive amplitude `a` (1 when `∫a` is
    /// carried, 0 otherwise).
    pub drive_level: usize,
    /// L1-regularized components per step; each gets a slack pair.
    pub n_slack_pairs: usize,
}

impl ZLayout {
    pub fn n_step_variables(&self) -> usize {
        self.vardim * self.horizon
    }

    pub fn n_slacks(&self) -> usize {
        2 * self.n_slack_pairs * self.horizon
    }

    pub fn n_variables(&self) -> usize {
        self.n_step_variables() + self.horizon + self.n_slacks()
    }

    pub fn step_base(&self, t: usize) -> usize {
        t * self.vardim
    }

    pub fn wfn_index(&self, t: usize, i: usize, m: usize) -> usize {
        self.step_base(t) + i * self.isodim + m
    }

    pub fn wfn_range(&self, t: usize) -> Range<usize> {
        step_block(t, 0, self.n_wfn_states, self.vardim)
    }

    pub fn aug_index(&self, t: usize, level: usize, k: usize) -> usize {
        self.step_base(t) + self.n_wfn_states + level * self.ncontrols + k
    }

    pub fn aug_range(&self, t: usize) -> Range<usize> {
        step_block(
            t,
            self.n_wfn_states,
            self.augdim * self.ncontrols,
            self.vardim,
        )
    }

    /// Index of drive amplitude `aₖ(t)`, the value entering `Gₜ`.
    pub fn drive_index(&self, t: usize, k: usize) -> usize {
        self.aug_index(t, self.drive_level, k)
    }

    pub fn drive_range(&self, t: usize) -> Range<usize> {
        let base = self.aug_index(t, self.drive_level, 0);
        base..base + self.ncontrols
    }

    /// Index of the top-order control `uₖ(t)`.
    pub fn control_index(&self, t: usize, k: usize) -> usize {
        self.step_base(t) + self.nstates + k
    }

    pub fn control_range(&self, t: usize) -> Range<usize> {
        step_block(t, self.nstates, self.ncontrols, self.vardim)
    }

    /// The forward-Euler chain variable of order `level` for control `k`:
    /// augmented state for `level < augdim`, the decision control for
    /// `level == augdim`.
    pub fn chain_index(&self, t: usize, level: usize, k: usize) -> usize {
        if level < self.augdim {
            self.aug_index(t, level, k)
        } else {
            self.control_index(t, k)
        }
    }

    pub fn dt_index(&self, t: usize) -> usize {
        self.n_step_variables() + t
    }

    /// The shared duplicate `Δ̄t` slot.
    pub fn dt_tie_index(&self) -> usize {
        self.dt_index(self.horizon - 1)
    }

    fn slack_base(&self, t: usize) -> usize {
        self.n_step_variables() + self.horizon + 2 * self.n_slack_pairs * t
    }

    pub fn s1_index(&self, t: usize, pair: usize) -> usize {
        self.slack_base(t) + pair
    }

    pub fn s2_index(&self, t: usize, pair: usize) -> usize {
        self.slack_base(t) + self.n_slack_pairs + pair
    }
}
