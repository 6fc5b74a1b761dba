//! Per-iteration monitors for the solve loop.

use crate::E;
use crate::nlp::SolveStatus;

/// Snapshot handed to the monitor once per solver iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationRecord {
    pub iteration: usize,
    pub objective: E,
    pub primal_infeasibility: E,
    pub dual_infeasibility: E,
}

/// Hook invoked once per solver iteration for logging or monitoring.
pub trait Monitor {
    /// Called before the first iteration.
    fn start(&mut self, _n_variables: usize, _n_constraints: usize) {}

    /// Called at the end of each iteration.
    fn iteration(&mut self, record: &IterationRecord);

    /// Called once the solver returns.
    fn finish(&mut self, _status: SolveStatus) {}
}

/// A monitor that does nothing. Use when no per-iteration output is needed.
pub struct NoOpMonitor;

impl Monitor for NoOpMonitor {
    fn iteration(&mut self, _record: &IterationRecord) {
        // Do nothing
    }
}

/// Prints objective and infeasibilities to stdout each iteration.
pub struct ConvergenceMonitor;

impl Monitor for ConvergenceMonitor {
    fn start(&mut self, n_variables: usize, n_constraints: usize) {
        println!("| solving: {} variables, {} constraints", n_variables, n_constraints);
        println!("| {:>4} | {:>12} | {:>10} | {:>10} |", "it", "objective", "primal", "dual");
    }

    fn iteration(&mut self, record: &IterationRecord) {
        let txt = format!(
            "| {:4} | {:<12.5e} | {:<10.2e} | {:<10.2e} |",
            record.iteration,
            record.objective,
            record.primal_infeasibility,
            record.dual_infeasibility,
        );
        println!("{}", txt);
    }

    fn finish(&mut self, status: SolveStatus) {
        println!("| finished with status: {:?}", status);
    }
}
