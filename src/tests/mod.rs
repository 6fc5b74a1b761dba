//! Cross-module scenario tests: the literal end-to-end scenarios plus the
//! derivative and algebra invariants that every analytic object must
//! satisfy against finite differences.

pub mod support;
