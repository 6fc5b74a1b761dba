//! Registry of standard single-qubit gates.
//!
//! Gates are the only global constants in the crate; everything else is
//! passed explicitly. Matrices are rebuilt on lookup, which keeps the
//! registry trivially immutable.

use std::f64::consts::FRAC_1_SQRT_2 as INV_SQRT_2;
use std::f64::consts::FRAC_PI_4;

use num_complex::Complex64;

use crate::error::QontrolError;
use crate::iso::CMat;

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// Looks up a 2×2 gate by symbol: `I`, `X`, `Y`, `Z`, `H`, `S`, `T`.
pub fn gate(name: &str) -> Result<CMat, QontrolError> {
    let rows: [[Complex64; 2]; 2] = match name {
        "I" => [[c(1., 0.), c(0., 0.)], [c(0., 0.), c(1., 0.)]],
        "X" => [[c(0., 0.), c(1., 0.)], [c(1., 0.), c(0., 0.)]],
        "Y" => [[c(0., 0.), c(0., -1.)], [c(0., 1.), c(0., 0.)]],
        "Z" => [[c(1., 0.), c(0., 0.)], [c(0., 0.), c(-1., 0.)]],
        "H" => [
            [c(INV_SQRT_2, 0.), c(INV_SQRT_2, 0.)],
            [c(INV_SQRT_2, 0.), c(-INV_SQRT_2, 0.)],
        ],
        "S" => [[c(1., 0.), c(0., 0.)], [c(0., 0.), c(0., 1.)]],
        "T" => [
            [c(1., 0.), c(0., 0.)],
            [c(0., 0.), Complex64::from_polar(1., FRAC_PI_4)],
        ],
        _ => {
            return Err(QontrolError::configuration(format!(
                "unknown gate symbol `{name}`"
            )));
        }
    };
    Ok(CMat::from_fn(2, 2, |r, col| rows[r][col]))
}

/// Pauli matrices scaled by 1/2, the conventional spin operators.
pub fn spin_operator(axis: &str) -> Result<CMat, QontrolError> {
    Ok(gate(axis)?.scale(c(0.5, 0.)))
}
