//! Shared helpers for the scenario tests: finite differences in place of
//! forward-mode autodiff, coordinate-list densification honoring the
//! repeated-entry contract, and a dense matrix exponential for exact
//! reference evolutions.

use faer::{Col, Mat, MatRef};
use num_complex::Complex64;
use rand::Rng;

use crate::E;
use crate::gates::{gate, spin_operator};
use crate::iso::CMat;
use crate::linalg::matmul_into;
use crate::system::QuantumSystem;

pub fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// The single-qubit X-gate system of the end-to-end scenarios:
/// `H_drift = σz/2`, `H_drives = [σx/2, σy/2]`, both basis states tracked,
/// goal `X·ψ`, bounds `[1.0, 0.5]`.
pub fn x_gate_system() -> QuantumSystem {
    QuantumSystem::builder()
        .drift(spin_operator("Z").unwrap())
        .drives(vec![spin_operator("X").unwrap(), spin_operator("Y").unwrap()])
        .initial_states(vec![vec![c(1., 0.), c(0., 0.)], vec![c(0., 0.), c(1., 0.)]])
        .goal_gate(gate("X").unwrap())
        .control_bounds(vec![1.0, 0.5])
        .build()
        .unwrap()
}

pub fn pauli(name: &str) -> CMat {
    gate(name).unwrap()
}

pub fn random_col(rng: &mut impl Rng, n: usize, lo: E, hi: E) -> Col<E> {
    let samples: Vec<E> = (0..n).map(|_| rng.gen_range(lo..hi)).collect();
    Col::from_fn(n, |i| samples[i])
}

/// Densifies a coordinate list, summing repeated coordinates. With
/// `symmetrize` every off-diagonal entry is mirrored, turning a triangle
/// into the full symmetric matrix.
pub fn densify(
    nrows: usize,
    ncols: usize,
    structure: &[(usize, usize)],
    values: &[E],
    symmetrize: bool,
) -> Mat<E> {
    assert_eq!(structure.len(), values.len());
    let mut out = Mat::zeros(nrows, ncols);
    for (&(r, col), &v) in structure.iter().zip(values) {
        out[(r, col)] += v;
        if symmetrize && r != col {
            out[(col, r)] += v;
        }
    }
    out
}

/// Central finite-difference gradient of a scalar function.
pub fn fd_gradient(mut f: impl FnMut(&Col<E>) -> E, z: &Col<E>, h: E) -> Col<E> {
    let n = z.nrows();
    let mut zp = z.clone();
    let mut grad = vec![0.; n];
    for p in 0..n {
        zp[p] = z[p] + h;
        let plus = f(&zp);
        zp[p] = z[p] - h;
        let minus = f(&zp);
        zp[p] = z[p];
        grad[p] = (plus - minus) / (2. * h);
    }
    Col::from_fn(n, |i| grad[i])
}

/// Central finite-difference Jacobian of a vector function written through
/// an out-buffer; column `p` is `∂f/∂z_p`.
pub fn fd_jacobian(
    mut f: impl FnMut(&Col<E>, &mut [E]),
    n_rows: usize,
    z: &Col<E>,
    h: E,
) -> Mat<E> {
    let n = z.nrows();
    let mut zp = z.clone();
    let mut plus = vec![0.; n_rows];
    let mut minus = vec![0.; n_rows];
    let mut jac = Mat::zeros(n_rows, n);
    for p in 0..n {
        zp[p] = z[p] + h;
        f(&zp, &mut plus);
        zp[p] = z[p] - h;
        f(&zp, &mut minus);
        zp[p] = z[p];
        for r in 0..n_rows {
            jac[(r, p)] = (plus[r] - minus[r]) / (2. * h);
        }
    }
    jac
}

/// Dense matrix exponential by scaling and squaring on a Taylor series.
/// Plenty for the small reference evolutions in these tests.
pub fn expm(m: MatRef<'_, E>) -> Mat<E> {
    let n = m.nrows();
    let norm = (0..n)
        .map(|r| (0..n).map(|col| m[(r, col)].abs()).sum::<E>())
        .fold(0., E::max);
    let squarings = if norm > 0.5 {
        (norm / 0.5).log2().ceil() as u32
    } else {
        0
    };
    let scale = 0.5_f64.powi(squarings as i32);

    let scaled = Mat::from_fn(n, n, |r, col| scale * m[(r, col)]);
    let mut sum = Mat::from_fn(n, n, |r, col| if r == col { 1. } else { 0. });
    let mut term = sum.clone();
    let mut work = Mat::zeros(n, n);
    for k in 1..=24 {
        matmul_into(term.as_ref(), scaled.as_ref(), &mut work);
        for r in 0..n {
            for col in 0..n {
                term[(r, col)] = work[(r, col)] / k as E;
                sum[(r, col)] += term[(r, col)];
            }
        }
    }
    for _ in 0..squarings {
        matmul_into(sum.as_ref(), sum.as_ref(), &mut work);
        sum.copy_from(&work);
    }
    sum
}

pub fn assert_mats_close(a: MatRef<'_, E>, b: MatRef<'_, E>, tol: E, label: &str) {
    assert_eq!((a.nrows(), a.ncols()), (b.nrows(), b.ncols()), "{label}: shape");
    for r in 0..a.nrows() {
        for col in 0..a.ncols() {
            let diff = (a[(r, col)] - b[(r, col)]).abs();
            assert!(
                diff <= tol,
                "{label}: entry ({r}, {col}) differs by {diff:.3e} ({} vs {})",
                a[(r, col)],
                b[(r, col)]
            );
        }
    }
}

pub fn assert_cols_close(a: &Col<E>, b: &Col<E>, tol: E, label: &str) {
    assert_eq!(a.nrows(), b.nrows(), "{label}: length");
    for p in 0..a.nrows() {
        let diff = (a[p] - b[p]).abs();
        assert!(
            diff <= tol,
            "{label}: component {p} differs by {diff:.3e} ({} vs {})",
            a[p],
            b[p]
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expm_of_zero_is_identity() {
        let z = Mat::zeros(3, 3);
        let e = expm(z.as_ref());
        for r in 0..3 {
            for col in 0..3 {
                assert!((e[(r, col)] - if r == col { 1. } else { 0. }).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn test_expm_matches_scalar_exponential() {
        // diagonal matrix: exp acts entrywise on the diagonal
        let m = Mat::from_fn(2, 2, |r, col| {
            if r == col {
                if r == 0 { 0.7 } else { -1.3 }
            } else {
                0.
            }
        });
        let e = expm(m.as_ref());
        assert!((e[(0, 0)] - 0.7_f64.exp()).abs() < 1e-12);
        assert!((e[(1, 1)] - (-1.3_f64).exp()).abs() < 1e-12);
        assert!(e[(0, 1)].abs() < 1e-15);
    }

    #[test]
    fn test_densify_sums_duplicates_and_mirrors() {
        let structure = [(0, 0), (1, 0), (1, 0)];
        let values = [2., 3., 4.];
        let dense = densify(2, 2, &structure, &values, true);
        assert_eq!(dense[(0, 0)], 2.);
        assert_eq!(dense[(1, 0)], 7.);
        assert_eq!(dense[(0, 1)], 7.);
    }

    #[test]
    fn test_fd_gradient_of_quadratic() {
        let z = Col::from_fn(3, |i| i as E + 1.);
        let grad = fd_gradient(|z| z[0] * z[0] + 2. * z[1] * z[2], &z, 1e-6);
        let exact = Col::from_fn(3, |i| [2., 6., 4.][i]);
        assert_cols_close(&grad, &exact, 1e-8, "fd quadratic");
    }
}
