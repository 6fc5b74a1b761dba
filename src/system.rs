//! Problem data: Hamiltonians, tracked states and derived dimensions.
//!
//! A [`QuantumSystem`] is immutable once built. It owns the real generators
//! of the drift and drive Hamiltonians, the embedded initial and goal
//! states, the control bounds, and every dimension the assembly layer needs
//! (`isodim`, `nstates`, `vardim`, …). Construction goes through
//! [`SystemBuilder`], which validates shapes and bounds up front; the
//! transmon and two-qubit presets populate the builder from physical
//! parameters and then obey the same interface.

use faer::{Col, Mat};
use num_complex::Complex64;

use crate::error::QontrolError;
use crate::iso::{CMat, ZLayout, generator, ket_to_iso};
use crate::E;

const HERMITICITY_TOL: E = 1e-10;

#[derive(Debug, Clone)]
pub struct QuantumSystem {
    g_drift: Mat<E>,
    g_drives: Vec<Mat<E>>,
    control_bounds: Vec<E>,
    psi_init: Col<E>,
    psi_goal: Col<E>,

    isodim: usize,
    nqstates: usize,
    ncontrols: usize,
    control_order: usize,
    integrated_control: bool,
}

impl QuantumSystem {
    pub fn builder() -> SystemBuilder {
        SystemBuilder::new()
    }

    /// Transmon (Duffing oscillator) preset: `H = ω n̂ + (α/2) n̂(n̂ − 1)`
    /// with quadrature drives `(a + a†)/2` and `i(a† − a)/2`.
    pub fn transmon(params: TransmonParams) -> SystemBuilder {
        let a = annihilation(params.levels);
        let adag = a.dagger();
        let n_op = adag.matmul(&a);
        let quad = n_op.matmul(&n_op.add(&CMat::identity(params.levels).scale(re(-1.))));

        let h_drift = n_op.scale(re(params.omega)).add(&quad.scale(re(params.alpha / 2.)));
        let h_drives = vec![
            a.add(&adag).scale(re(0.5)),
            adag.add(&a.scale(re(-1.))).scale(Complex64::new(0., 0.5)),
        ];

        SystemBuilder::new().drift(h_drift).drives(h_drives)
    }

    /// Two coupled qubits: `H = (ω₁/2) σz⊗I + (ω₂/2) I⊗σz + g σx⊗σx` with
    /// independent x/y quadrature drives on each qubit.
    pub fn two_qubit(params: TwoQubitParams) -> SystemBuilder {
        let sx = pauli('x');
        let sy = pauli('y');
        let sz = pauli('z');
        let id = CMat::identity(2);

        let h_drift = sz
            .kron(&id)
            .scale(re(params.omega1 / 2.))
            .add(&id.kron(&sz).scale(re(params.omega2 / 2.)))
            .add(&sx.kron(&sx).scale(re(params.coupling)));
        let h_drives = vec![
            sx.kron(&id).scale(re(0.5)),
            sy.kron(&id).scale(re(0.5)),
            id.kron(&sx).scale(re(0.5)),
            id.kron(&sy).scale(re(0.5)),
        ];

        SystemBuilder::new().drift(h_drift).drives(h_drives)
    }

    pub fn g_drift(&self) -> &Mat<E> {
        &self.g_drift
    }

    pub fn g_drives(&self) -> &[Mat<E>] {
        &self.g_drives
    }

    pub fn control_bounds(&self) -> &[E] {
        &self.control_bounds
    }

    /// All tracked initial states, embedded and concatenated.
    pub fn psi_init(&self) -> &Col<E> {
        &self.psi_init
    }

    pub fn psi_goal(&self) -> &Col<E> {
        &self.psi_goal
    }

    pub fn isodim(&self) -> usize {
        self.isodim
    }

    pub fn nqstates(&self) -> usize {
        self.nqstates
    }

    pub fn n_wfn_states(&self) -> usize {
        self.nqstates * self.isodim
    }

    pub fn ncontrols(&self) -> usize {
        self.ncontrols
    }

    pub fn control_order(&self) -> usize {
        self.control_order
    }

    pub fn has_integrated_control(&self) -> bool {
        self.integrated_control
    }

    pub fn augdim(&self) -> usize {
        self.control_order + usize::from(self.integrated_control)
    }

    /// Augmented level holding the drive amplitude `a`.
    pub fn drive_level(&self) -> usize {
        usize::from(self.integrated_control)
    }

    pub fn n_aug_states(&self) -> usize {
        self.ncontrols * self.augdim()
    }

    pub fn nstates(&self) -> usize {
        self.n_wfn_states() + self.n_aug_states()
    }

    pub fn vardim(&self) -> usize {
        self.nstates() + self.ncontrols
    }

    pub fn layout(&self, horizon: usize, n_slack_pairs: usize) -> ZLayout {
        ZLayout {
            horizon,
            vardim: self.vardim(),
            nstates: self.nstates(),
            n_wfn_states: self.n_wfn_states(),
            isodim: self.isodim,
            nqstates: self.nqstates,
            ncontrols: self.ncontrols,
            augdim: self.augdim(),
            drive_level: self.drive_level(),
            n_slack_pairs,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransmonParams {
    pub omega: E,
    /// Anharmonicity (negative for a transmon).
    pub alpha: E,
    pub levels: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct TwoQubitParams {
    pub omega1: E,
    pub omega2: E,
    pub coupling: E,
}

pub struct SystemBuilder {
    h_drift: Option<CMat>,
    h_drives: Vec<CMat>,
    psi_init: Vec<Vec<Complex64>>,
    psi_goal: Vec<Vec<Complex64>>,
    goal_gate: Option<CMat>,
    goal_phase: Option<E>,
    control_bounds: Vec<E>,
    control_order: usize,
    integrated_control: bool,
}

impl SystemBuilder {
    pub fn new() -> Self {
        Self {
            h_drift: None,
            h_drives: Vec::new(),
            psi_init: Vec::new(),
            psi_goal: Vec::new(),
            goal_gate: None,
            goal_phase: None,
            control_bounds: Vec::new(),
            control_order: 2,
            integrated_control: false,
        }
    }

    pub fn drift(mut self, h: CMat) -> Self {
        self.h_drift = Some(h);
        self
    }

    pub fn drives(mut self, hs: Vec<CMat>) -> Self {
        self.h_drives = hs;
        self
    }

    /// Tracks a single initial state.
    pub fn initial_state(self, psi: Vec<Complex64>) -> Self {
        self.initial_states(vec![psi])
    }

    /// Tracks several initial states in parallel (partial isometry).
    pub fn initial_states(mut self, psis: Vec<Vec<Complex64>>) -> Self {
        self.psi_init = psis;
        self
    }

    pub fn goal_state(self, psi: Vec<Complex64>) -> Self {
        self.goal_states(vec![psi])
    }

    pub fn goal_states(mut self, psis: Vec<Vec<Complex64>>) -> Self {
        self.psi_goal = psis;
        self
    }

    /// Derives the goal states by applying a gate to the initial states.
    pub fn goal_gate(mut self, gate: CMat) -> Self {
        self.goal_gate = Some(gate);
        self
    }

    /// Global phase rotation `e^{iφ}` applied to every goal state.
    pub fn goal_phase(mut self, phase: E) -> Self {
        self.goal_phase = Some(phase);
        self
    }

    pub fn control_bounds(mut self, bounds: Vec<E>) -> Self {
        self.control_bounds = bounds;
        self
    }

    /// Number of control derivatives carried as augmented states (≥ 1).
    pub fn control_order(mut self, order: usize) -> Self {
        self.control_order = order;
        self
    }

    /// Also carries `∫a` as an augmented state.
    pub fn integrated_control(mut self, enabled: bool) -> Self {
        self.integrated_control = enabled;
        self
    }

    pub fn build(self) -> Result<QuantumSystem, QontrolError> {
        let h_drift = self
            .h_drift
            .ok_or_else(|| QontrolError::configuration("no drift Hamiltonian provided"))?;
        if !h_drift.is_square() {
            return Err(QontrolError::dimension(
                "drift Hamiltonian",
                h_drift.nrows(),
                h_drift.ncols(),
            ));
        }
        let dim = h_drift.nrows();
        if !h_drift.is_hermitian(HERMITICITY_TOL) {
            return Err(QontrolError::configuration(
                "drift Hamiltonian is not Hermitian",
            ));
        }

        if self.h_drives.is_empty() {
            return Err(QontrolError::configuration("no drive Hamiltonians provided"));
        }
        for (k, h) in self.h_drives.iter().enumerate() {
            if h.nrows() != dim || h.ncols() != dim {
                return Err(QontrolError::dimension(
                    format!("drive Hamiltonian {k}"),
                    dim,
                    h.nrows(),
                ));
            }
            if !h.is_hermitian(HERMITICITY_TOL) {
                return Err(QontrolError::configuration(format!(
                    "drive Hamiltonian {k} is not Hermitian"
                )));
            }
        }

        if self.control_bounds.len() != self.h_drives.len() {
            return Err(QontrolError::dimension(
                "control bounds",
                self.h_drives.len(),
                self.control_bounds.len(),
            ));
        }
        if self.control_order < 1 {
            return Err(QontrolError::configuration("control_order must be at least 1"));
        }

        if self.psi_init.is_empty() {
            return Err(QontrolError::configuration("no initial state provided"));
        }
        for psi in &self.psi_init {
            if psi.len() != dim {
                return Err(QontrolError::dimension("initial state", dim, psi.len()));
            }
        }

        let mut psi_goal = if let Some(gate) = &self.goal_gate {
            if gate.nrows() != dim || gate.ncols() != dim {
                return Err(QontrolError::dimension("goal gate", dim, gate.nrows()));
            }
            self.psi_init.iter().map(|psi| gate.mul_ket(psi)).collect()
        } else {
            self.psi_goal
        };
        if psi_goal.len() != self.psi_init.len() {
            return Err(QontrolError::dimension(
                "goal states",
                self.psi_init.len(),
                psi_goal.len(),
            ));
        }
        for psi in &psi_goal {
            if psi.len() != dim {
                return Err(QontrolError::dimension("goal state", dim, psi.len()));
            }
        }
        if let Some(phase) = self.goal_phase {
            let rot = Complex64::from_polar(1., phase);
            for psi in &mut psi_goal {
                for amp in psi.iter_mut() {
                    *amp *= rot;
                }
            }
        }

        let g_drift = generator(&h_drift)?;
        let g_drives = self
            .h_drives
            .iter()
            .map(generator)
            .collect::<Result<Vec<_>, _>>()?;

        let nqstates = self.psi_init.len();
        let isodim = 2 * dim;
        let psi_init = concat_iso(&self.psi_init, isodim);
        let psi_goal = concat_iso(&psi_goal, isodim);

        Ok(QuantumSystem {
            g_drift,
            g_drives,
            control_bounds: self.control_bounds,
            psi_init,
            psi_goal,
            isodim,
            nqstates,
            ncontrols: self.h_drives.len(),
            control_order: self.control_order,
            integrated_control: self.integrated_control,
        })
    }
}

impl Default for SystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Annihilation operator truncated to `levels` levels.
pub fn annihilation(levels: usize) -> CMat {
    CMat::from_fn(levels, levels, |r, c| {
        if c == r + 1 {
            Complex64::new((c as E).sqrt(), 0.)
        } else {
            Complex64::new(0., 0.)
        }
    })
}

fn pauli(axis: char) -> CMat {
    CMat::from_fn(2, 2, |r, c| match (axis, r, c) {
        ('x', 0, 1) | ('x', 1, 0) => Complex64::new(1., 0.),
        ('y', 0, 1) => Complex64::new(0., -1.),
        ('y', 1, 0) => Complex64::new(0., 1.),
        ('z', 0, 0) => Complex64::new(1., 0.),
        ('z', 1, 1) => Complex64::new(-1., 0.),
        _ => Complex64::new(0., 0.),
    })
}

fn re(x: E) -> Complex64 {
    Complex64::new(x, 0.)
}

fn concat_iso(kets: &[Vec<Complex64>], isodim: usize) -> Col<E> {
    let mut out = Col::zeros(kets.len() * isodim);
    for (i, ket) in kets.iter().enumerate() {
        let iso = ket_to_iso(ket);
        for m in 0..isodim {
            out[i * isodim + m] = iso[m];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::{gate, spin_operator};

    fn c(re_: f64, im: f64) -> Complex64 {
        Complex64::new(re_, im)
    }

    fn qubit_system() -> QuantumSystem {
        QuantumSystem::builder()
            .drift(spin_operator("Z").unwrap())
            .drives(vec![
                spin_operator("X").unwrap(),
                spin_operator("Y").unwrap(),
            ])
            .initial_states(vec![
                vec![c(1., 0.), c(0., 0.)],
                vec![c(0., 0.), c(1., 0.)],
            ])
            .goal_gate(gate("X").unwrap())
            .control_bounds(vec![1.0, 0.5])
            .build()
            .unwrap()
    }

    #[test]
    fn test_dimension_bookkeeping() {
        let sys = qubit_system();
        assert_eq!(sys.isodim(), 4);
        assert_eq!(sys.nqstates(), 2);
        assert_eq!(sys.n_wfn_states(), 8);
        assert_eq!(sys.ncontrols(), 2);
        assert_eq!(sys.augdim(), 2);
        assert_eq!(sys.n_aug_states(), 4);
        assert_eq!(sys.nstates(), 12);
        assert_eq!(sys.vardim(), 14);
    }

    #[test]
    fn test_integrated_control_adds_a_level() {
        let sys = QuantumSystem::builder()
            .drift(spin_operator("Z").unwrap())
            .drives(vec![spin_operator("X").unwrap()])
            .initial_state(vec![c(1., 0.), c(0., 0.)])
            .goal_state(vec![c(0., 0.), c(1., 0.)])
            .control_bounds(vec![1.0])
            .integrated_control(true)
            .build()
            .unwrap();
        assert_eq!(sys.augdim(), 3);
        assert_eq!(sys.drive_level(), 1);
    }

    #[test]
    fn test_goal_gate_produces_flipped_states() {
        let sys = qubit_system();
        // X|0> = |1>: goal iso for qstate 0 is [0, 1, 0, 0]
        assert_eq!(sys.psi_goal()[0], 0.);
        assert_eq!(sys.psi_goal()[1], 1.);
        // X|1> = |0>: goal iso for qstate 1 is [1, 0, 0, 0]
        assert_eq!(sys.psi_goal()[4], 1.);
        assert_eq!(sys.psi_goal()[5], 0.);
    }

    #[test]
    fn test_goal_phase_rotates_goal() {
        let phase = 0.7;
        let sys = QuantumSystem::builder()
            .drift(spin_operator("Z").unwrap())
            .drives(vec![spin_operator("X").unwrap()])
            .initial_state(vec![c(1., 0.), c(0., 0.)])
            .goal_state(vec![c(0., 0.), c(1., 0.)])
            .goal_phase(phase)
            .control_bounds(vec![1.0])
            .build()
            .unwrap();
        // goal |1> rotated: iso = [0, cos φ, 0, sin φ]
        assert!((sys.psi_goal()[1] - phase.cos()).abs() < 1e-15);
        assert!((sys.psi_goal()[3] - phase.sin()).abs() < 1e-15);
    }

    #[test]
    fn test_bounds_length_mismatch_fails() {
        let result = QuantumSystem::builder()
            .drift(spin_operator("Z").unwrap())
            .drives(vec![spin_operator("X").unwrap()])
            .initial_state(vec![c(1., 0.), c(0., 0.)])
            .goal_state(vec![c(0., 0.), c(1., 0.)])
            .control_bounds(vec![1.0, 2.0])
            .build();
        assert!(matches!(result, Err(QontrolError::Dimension { .. })));
    }

    #[test]
    fn test_state_dimension_mismatch_fails() {
        let result = QuantumSystem::builder()
            .drift(spin_operator("Z").unwrap())
            .drives(vec![spin_operator("X").unwrap()])
            .initial_state(vec![c(1., 0.), c(0., 0.), c(0., 0.)])
            .goal_state(vec![c(0., 0.), c(1., 0.)])
            .control_bounds(vec![1.0])
            .build();
        assert!(matches!(result, Err(QontrolError::Dimension { .. })));
    }

    #[test]
    fn test_transmon_preset_builds() {
        let sys = QuantumSystem::transmon(TransmonParams {
            omega: 0.,
            alpha: -0.2,
            levels: 3,
        })
        .initial_state(vec![c(1., 0.), c(0., 0.), c(0., 0.)])
        .goal_state(vec![c(0., 0.), c(1., 0.), c(0., 0.)])
        .control_bounds(vec![1.0, 1.0])
        .build()
        .unwrap();
        assert_eq!(sys.isodim(), 6);
        assert_eq!(sys.ncontrols(), 2);
    }

    #[test]
    fn test_two_qubit_preset_builds() {
        let sys = QuantumSystem::two_qubit(TwoQubitParams {
            omega1: 1.0,
            omega2: 1.1,
            coupling: 0.05,
        })
        .initial_state(vec![c(1., 0.), c(0., 0.), c(0., 0.), c(0., 0.)])
        .goal_state(vec![c(0., 0.), c(0., 0.), c(0., 0.), c(1., 0.)])
        .control_bounds(vec![1.0; 4])
        .build()
        .unwrap();
        assert_eq!(sys.isodim(), 8);
        assert_eq!(sys.ncontrols(), 4);
    }

    #[test]
    fn test_annihilation_ladder() {
        let a = annihilation(3);
        assert_eq!(a[(0, 1)], c(1., 0.));
        assert!((a[(1, 2)].re - 2f64.sqrt()).abs() < 1e-15);
        assert_eq!(a[(2, 2)], c(0., 0.));
    }
}
