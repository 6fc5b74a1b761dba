use derive_more::{Display, Error};

use crate::E;
use crate::nlp::SolveStatus;

/// Errors raised while assembling or evaluating a quantum control problem.
///
/// Configuration and dimension errors are detected at construction time and
/// fail fast. Numeric errors are raised from inside evaluator callbacks and
/// reported to the solver, which aborts the iteration. A constraint
/// violation is terminal: the solver finished at an infeasible point and the
/// final infidelity is surfaced for the caller to judge.
#[derive(Debug, Display, Error, PartialEq)]
pub enum QontrolError {
    #[display("configuration error: {reason}")]
    Configuration { reason: String },

    #[display("dimension mismatch in {context}: expected {expected}, found {found}")]
    Dimension {
        context: String,
        expected: usize,
        found: usize,
    },

    #[display("numeric error: non-finite value encountered in {context}")]
    Numeric { context: String },

    #[display("solver finished {status:?} at an infeasible point (final infidelity {infidelity:.3e})")]
    ConstraintViolation { status: SolveStatus, infidelity: E },
}

impl QontrolError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn dimension(context: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::Dimension {
            context: context.into(),
            expected,
            found,
        }
    }

    pub fn numeric(context: impl Into<String>) -> Self {
        Self::Numeric {
            context: context.into(),
        }
    }
}

/// Checks a freshly written value buffer for NaN/Inf before it is handed to
/// the solver. No partial results may leak into solver state on failure.
pub(crate) fn ensure_finite(values: &[E], context: &str) -> Result<(), QontrolError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(QontrolError::numeric(context))
    }
}
