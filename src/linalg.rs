use faer::{Mat, MatRef};

use crate::E;

/// `acc += scale * M x`, with `x` and `acc` as raw slices.
///
/// The sparse assembly loops work on slices of the flat decision vector and
/// of the preallocated value buffers, so the kernels here stay off the
/// allocator entirely.
pub(crate) fn matvec_accum(m: MatRef<E>, x: &[E], scale: E, acc: &mut [E]) {
    debug_assert_eq!(m.ncols(), x.len());
    debug_assert_eq!(m.nrows(), acc.len());
    for r in 0..m.nrows() {
        let mut s = 0.;
        for c in 0..m.ncols() {
            s += m[(r, c)] * x[c];
        }
        acc[r] += scale * s;
    }
}

/// `acc += scale * Mᵀ x`.
pub(crate) fn matvec_transpose_accum(m: MatRef<E>, x: &[E], scale: E, acc: &mut [E]) {
    debug_assert_eq!(m.nrows(), x.len());
    debug_assert_eq!(m.ncols(), acc.len());
    for c in 0..m.ncols() {
        let mut s = 0.;
        for r in 0..m.nrows() {
            s += m[(r, c)] * x[r];
        }
        acc[c] += scale * s;
    }
}

/// `yᵀ M x` without forming the intermediate product.
pub(crate) fn bilinear(y: &[E], m: MatRef<E>, x: &[E]) -> E {
    debug_assert_eq!(m.nrows(), y.len());
    debug_assert_eq!(m.ncols(), x.len());
    let mut total = 0.;
    for r in 0..m.nrows() {
        let mut s = 0.;
        for c in 0..m.ncols() {
            s += m[(r, c)] * x[c];
        }
        total += y[r] * s;
    }
    total
}

pub(crate) fn dot(a: &[E], b: &[E]) -> E {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// `out = A B` into a preallocated matrix.
pub(crate) fn matmul_into(a: MatRef<E>, b: MatRef<E>, out: &mut Mat<E>) {
    debug_assert_eq!(a.ncols(), b.nrows());
    debug_assert_eq!(out.nrows(), a.nrows());
    debug_assert_eq!(out.ncols(), b.ncols());
    for r in 0..a.nrows() {
        for c in 0..b.ncols() {
            let mut s = 0.;
            for k in 0..a.ncols() {
                s += a[(r, k)] * b[(k, c)];
            }
            out[(r, c)] = s;
        }
    }
}

/// `out = A B + B A`, the anticommutator `{A, B}`.
pub(crate) fn anticommutator_into(a: MatRef<E>, b: MatRef<E>, out: &mut Mat<E>) {
    debug_assert_eq!(a.nrows(), a.ncols());
    debug_assert_eq!(b.nrows(), b.ncols());
    debug_assert_eq!(a.nrows(), b.nrows());
    let n = a.nrows();
    for r in 0..n {
        for c in 0..n {
            let mut s = 0.;
            for k in 0..n {
                s += a[(r, k)] * b[(k, c)] + b[(r, k)] * a[(k, c)];
            }
            out[(r, c)] = s;
        }
    }
}

/// `{A, B}` as a fresh matrix (construction-time use).
pub(crate) fn anticommutator(a: MatRef<E>, b: MatRef<E>) -> Mat<E> {
    let mut out = Mat::zeros(a.nrows(), b.ncols());
    anticommutator_into(a, b, &mut out);
    out
}

/// `out = beta * out + alpha * m`, elementwise.
pub(crate) fn mat_axpby(alpha: E, m: MatRef<E>, beta: E, out: &mut Mat<E>) {
    debug_assert_eq!(m.nrows(), out.nrows());
    debug_assert_eq!(m.ncols(), out.ncols());
    for r in 0..m.nrows() {
        for c in 0..m.ncols() {
            out[(r, c)] = beta * out[(r, c)] + alpha * m[(r, c)];
        }
    }
}

pub(crate) fn norm_inf(x: &[E]) -> E {
    x.iter().fold(0., |acc, v| E::max(acc, v.abs()))
}
