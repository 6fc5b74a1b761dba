//! Per-qstate scalar cost functions.
//!
//! Every cost operates on a single embedded state `ψ̃` of length `isodim`
//! and supplies three things: the scalar value, the analytic gradient, and a
//! sparse Hessian as an upper-triangle (`k ≤ j`) coordinate list fixed at
//! construction plus a positional values function. Derivatives are
//! hand-derived closed forms: no symbolic differentiation, no runtime
//! codegen.
//!
//! Writing the overlap in embedded coordinates: with `u = ψ̃goal` and
//! `w = [−Im ψgoal; Re ψgoal]`,
//!
//! ```text
//! ⟨ψgoal|ψ⟩ = A + iB,   A = uᵀψ̃,   B = wᵀψ̃
//! ```
//!
//! so the fidelity `|⟨ψgoal|ψ⟩|² = A² + B²` and everything downstream of it
//! are plain quadratics in `ψ̃`.

use dyn_clone::DynClone;
use faer::{Col, ColRef};
use serde::{Deserialize, Serialize};

use crate::E;
use crate::error::QontrolError;
use crate::iso::{CMat, iso_operator};
use crate::system::QuantumSystem;

/// A scalar cost with analytic gradient and sparse upper-triangle Hessian.
pub trait Cost: DynClone {
    fn name(&self) -> &'static str;

    fn evaluate(&self, psi: ColRef<'_, E>) -> E;

    /// Writes the full gradient (length `isodim`) into `out`.
    fn gradient(&self, psi: ColRef<'_, E>, out: &mut [E]);

    /// Fixed `k ≤ j` coordinates of the Hessian.
    fn hessian_structure(&self) -> &[(usize, usize)];

    /// Hessian values in structure order.
    fn hessian_values(&self, psi: ColRef<'_, E>, out: &mut [E]);
}

dyn_clone::clone_trait_object!(Cost);

/// Terminal costs constructible from the system's goal states alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostType {
    Infidelity,
    IsoInfidelity,
    RealOverlap,
    PureReal,
    Geodesic,
    NegEntropy,
}

/// Builds the terminal cost for quantum state `i`.
pub fn terminal_cost(
    system: &QuantumSystem,
    i: usize,
    cost_type: CostType,
) -> Box<dyn Cost> {
    let isodim = system.isodim();
    let goal = Col::from_fn(isodim, |m| system.psi_goal()[i * isodim + m]);
    match cost_type {
        CostType::Infidelity => Box::new(InfidelityCost::new(goal)),
        CostType::IsoInfidelity => Box::new(IsoInfidelityCost::new(goal)),
        CostType::RealOverlap => Box::new(RealOverlapCost::new(goal)),
        CostType::PureReal => Box::new(PureRealCost::new(isodim)),
        CostType::Geodesic => Box::new(GeodesicCost::new(goal)),
        CostType::NegEntropy => Box::new(NegEntropyCost),
    }
}

fn dense_upper_triangle(isodim: usize) -> Vec<(usize, usize)> {
    let mut coords = Vec::with_capacity(isodim * (isodim + 1) / 2);
    for k in 0..isodim {
        for j in k..isodim {
            coords.push((k, j));
        }
    }
    coords
}

/// The conjugate-phase companion of a goal vector: `w` such that
/// `Im⟨ψgoal|ψ⟩ = wᵀψ̃`.
fn phase_companion(goal: &Col<E>) -> Col<E> {
    let n = goal.nrows() / 2;
    Col::from_fn(2 * n, |m| if m < n { -goal[n + m] } else { goal[m - n] })
}

/// `|1 − |⟨ψ|ψgoal⟩|²|`: terminal infidelity with global phase freedom.
///
/// The absolute value squares away the irrelevant global phase but kinks the
/// derivative exactly at fidelity 1; derivative checks should avoid
/// phase-alignment points.
#[derive(Debug, Clone)]
pub struct InfidelityCost {
    goal: Col<E>,
    companion: Col<E>,
    structure: Vec<(usize, usize)>,
}

impl InfidelityCost {
    pub fn new(goal: Col<E>) -> Self {
        let companion = phase_companion(&goal);
        let structure = dense_upper_triangle(goal.nrows());
        Self {
            goal,
            companion,
            structure,
        }
    }

    fn overlap(&self, psi: ColRef<'_, E>) -> (E, E) {
        let mut a = 0.;
        let mut b = 0.;
        for m in 0..psi.nrows() {
            a += self.goal[m] * psi[m];
            b += self.companion[m] * psi[m];
        }
        (a, b)
    }
}

impl Cost for InfidelityCost {
    fn name(&self) -> &'static str {
        "infidelity"
    }

    fn evaluate(&self, psi: ColRef<'_, E>) -> E {
        let (a, b) = self.overlap(psi);
        (1. - (a * a + b * b)).abs()
    }

    fn gradient(&self, psi: ColRef<'_, E>, out: &mut [E]) {
        let (a, b) = self.overlap(psi);
        let sign = if 1. - (a * a + b * b) >= 0. { 1. } else { -1. };
        for m in 0..psi.nrows() {
            out[m] = -2. * sign * (a * self.goal[m] + b * self.companion[m]);
        }
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.structure
    }

    fn hessian_values(&self, psi: ColRef<'_, E>, out: &mut [E]) {
        let (a, b) = self.overlap(psi);
        let sign = if 1. - (a * a + b * b) >= 0. { 1. } else { -1. };
        for (pos, &(k, j)) in self.structure.iter().enumerate() {
            out[pos] = -2.
                * sign
                * (self.goal[k] * self.goal[j] + self.companion[k] * self.companion[j]);
        }
    }
}

/// `Re⟨ψ|H|ψ⟩` for a fixed Hermitian observable, evaluated as `ψ̃ᵀ H̄ ψ̃`
/// with `H̄` the symmetric real embedding of `H`. Sparsity follows the
/// observable.
#[derive(Debug, Clone)]
pub struct EnergyCost {
    op: faer::Mat<E>,
    structure: Vec<(usize, usize)>,
}

impl EnergyCost {
    pub fn new(h: &CMat) -> Result<Self, QontrolError> {
        let op = iso_operator(h)?;
        let n = op.nrows();
        let mut structure = Vec::new();
        for k in 0..n {
            for j in k..n {
                if op[(k, j)] != 0. {
                    structure.push((k, j));
                }
            }
        }
        Ok(Self { op, structure })
    }
}

impl Cost for EnergyCost {
    fn name(&self) -> &'static str {
        "energy"
    }

    fn evaluate(&self, psi: ColRef<'_, E>) -> E {
        let n = psi.nrows();
        let mut total = 0.;
        for k in 0..n {
            let mut s = 0.;
            for j in 0..n {
                s += self.op[(k, j)] * psi[j];
            }
            total += psi[k] * s;
        }
        total
    }

    fn gradient(&self, psi: ColRef<'_, E>, out: &mut [E]) {
        let n = psi.nrows();
        for k in 0..n {
            let mut s = 0.;
            for j in 0..n {
                s += self.op[(k, j)] * psi[j];
            }
            out[k] = 2. * s;
        }
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.structure
    }

    fn hessian_values(&self, _psi: ColRef<'_, E>, out: &mut [E]) {
        for (pos, &(k, j)) in self.structure.iter().enumerate() {
            out[pos] = 2. * self.op[(k, j)];
        }
    }
}

/// `tr(ρ log ρ)` for `ρ = |ψ⟩⟨ψ|`.
///
/// Identically zero on pure states while `log ρ` itself is singular there,
/// so the cost returns 0 explicitly rather than evaluating the logarithm;
/// it becomes meaningful only under a mixed-state extension.
#[derive(Debug, Clone)]
pub struct NegEntropyCost;

impl Cost for NegEntropyCost {
    fn name(&self) -> &'static str {
        "neg_entropy"
    }

    fn evaluate(&self, _psi: ColRef<'_, E>) -> E {
        0.
    }

    fn gradient(&self, _psi: ColRef<'_, E>, out: &mut [E]) {
        out.fill(0.);
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &[]
    }

    fn hessian_values(&self, _psi: ColRef<'_, E>, _out: &mut [E]) {}
}

/// `1 − (ψ̃ᵀψ̃goal)²`: fidelity in the real inner product only, blind to
/// the relative phase structure.
#[derive(Debug, Clone)]
pub struct IsoInfidelityCost {
    goal: Col<E>,
    structure: Vec<(usize, usize)>,
}

impl IsoInfidelityCost {
    pub fn new(goal: Col<E>) -> Self {
        let structure = dense_upper_triangle(goal.nrows());
        Self { goal, structure }
    }

    fn overlap(&self, psi: ColRef<'_, E>) -> E {
        (0..psi.nrows()).map(|m| self.goal[m] * psi[m]).sum()
    }
}

impl Cost for IsoInfidelityCost {
    fn name(&self) -> &'static str {
        "iso_infidelity"
    }

    fn evaluate(&self, psi: ColRef<'_, E>) -> E {
        let a = self.overlap(psi);
        1. - a * a
    }

    fn gradient(&self, psi: ColRef<'_, E>, out: &mut [E]) {
        let a = self.overlap(psi);
        for m in 0..psi.nrows() {
            out[m] = -2. * a * self.goal[m];
        }
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.structure
    }

    fn hessian_values(&self, _psi: ColRef<'_, E>, out: &mut [E]) {
        for (pos, &(k, j)) in self.structure.iter().enumerate() {
            out[pos] = -2. * self.goal[k] * self.goal[j];
        }
    }
}

/// `1 − ψ̃ᵀψ̃goal`: linear in the state; drives the real overlap to one,
/// pinning the global phase.
#[derive(Debug, Clone)]
pub struct RealOverlapCost {
    goal: Col<E>,
}

impl RealOverlapCost {
    pub fn new(goal: Col<E>) -> Self {
        Self { goal }
    }
}

impl Cost for RealOverlapCost {
    fn name(&self) -> &'static str {
        "real_overlap"
    }

    fn evaluate(&self, psi: ColRef<'_, E>) -> E {
        1. - (0..psi.nrows()).map(|m| self.goal[m] * psi[m]).sum::<E>()
    }

    fn gradient(&self, psi: ColRef<'_, E>, out: &mut [E]) {
        for m in 0..psi.nrows() {
            out[m] = -self.goal[m];
        }
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &[]
    }

    fn hessian_values(&self, _psi: ColRef<'_, E>, _out: &mut [E]) {}
}

/// `‖Im ψ‖²`: penalizes the imaginary components.
#[derive(Debug, Clone)]
pub struct PureRealCost {
    isodim: usize,
    structure: Vec<(usize, usize)>,
}

impl PureRealCost {
    pub fn new(isodim: usize) -> Self {
        let half = isodim / 2;
        let structure = (half..isodim).map(|m| (m, m)).collect();
        Self { isodim, structure }
    }
}

impl Cost for PureRealCost {
    fn name(&self) -> &'static str {
        "pure_real"
    }

    fn evaluate(&self, psi: ColRef<'_, E>) -> E {
        (self.isodim / 2..self.isodim).map(|m| psi[m] * psi[m]).sum()
    }

    fn gradient(&self, psi: ColRef<'_, E>, out: &mut [E]) {
        let half = self.isodim / 2;
        for m in 0..self.isodim {
            out[m] = if m < half { 0. } else { 2. * psi[m] };
        }
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.structure
    }

    fn hessian_values(&self, _psi: ColRef<'_, E>, out: &mut [E]) {
        out.fill(2.);
    }
}

/// `arccos²(ψ̃ᵀψ̃goal)`: squared geodesic distance on the real unit
/// sphere. Singular where the overlap reaches ±1; the overlap is clamped
/// just inside.
#[derive(Debug, Clone)]
pub struct GeodesicCost {
    goal: Col<E>,
    structure: Vec<(usize, usize)>,
}

impl GeodesicCost {
    const CLAMP: E = 1. - 1e-9;

    pub fn new(goal: Col<E>) -> Self {
        let structure = dense_upper_triangle(goal.nrows());
        Self { goal, structure }
    }

    fn overlap(&self, psi: ColRef<'_, E>) -> E {
        let a: E = (0..psi.nrows()).map(|m| self.goal[m] * psi[m]).sum();
        a.clamp(-Self::CLAMP, Self::CLAMP)
    }
}

impl Cost for GeodesicCost {
    fn name(&self) -> &'static str {
        "geodesic"
    }

    fn evaluate(&self, psi: ColRef<'_, E>) -> E {
        let theta = self.overlap(psi).acos();
        theta * theta
    }

    fn gradient(&self, psi: ColRef<'_, E>, out: &mut [E]) {
        let a = self.overlap(psi);
        let phi = -2. * a.acos() / (1. - a * a).sqrt();
        for m in 0..psi.nrows() {
            out[m] = phi * self.goal[m];
        }
    }

    fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.structure
    }

    fn hessian_values(&self, psi: ColRef<'_, E>, out: &mut [E]) {
        let a = self.overlap(psi);
        let one_m = 1. - a * a;
        let dphi = 2. / one_m - 2. * a.acos() * a / one_m.powf(1.5);
        for (pos, &(k, j)) in self.structure.iter().enumerate() {
            out[pos] = dphi * self.goal[k] * self.goal[j];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(values: &[E]) -> Col<E> {
        Col::from_fn(values.len(), |i| values[i])
    }

    #[test]
    fn test_infidelity_at_goal_and_orthogonal() {
        // goal |0>, iso [1, 0, 0, 0]
        let cost = InfidelityCost::new(col(&[1., 0., 0., 0.]));
        assert!(cost.evaluate(col(&[1., 0., 0., 0.]).as_ref()).abs() < 1e-15);
        // orthogonal state |1>
        assert!((cost.evaluate(col(&[0., 1., 0., 0.]).as_ref()) - 1.).abs() < 1e-15);
        // global phase e^{iφ}|0> is still a perfect match
        let phi: E = 0.9;
        let rotated = col(&[phi.cos(), 0., phi.sin(), 0.]);
        assert!(cost.evaluate(rotated.as_ref()).abs() < 1e-12);
    }

    #[test]
    fn test_energy_of_eigenstate_is_eigenvalue() {
        let sz = crate::gates::gate("Z").unwrap();
        let cost = EnergyCost::new(&sz).unwrap();
        assert!((cost.evaluate(col(&[1., 0., 0., 0.]).as_ref()) - 1.).abs() < 1e-15);
        assert!((cost.evaluate(col(&[0., 1., 0., 0.]).as_ref()) + 1.).abs() < 1e-15);
    }

    #[test]
    fn test_energy_gradient_matches_quadratic_form() {
        let sx = crate::gates::gate("X").unwrap();
        let cost = EnergyCost::new(&sx).unwrap();
        let psi = col(&[0.6, 0.8, 0., 0.]);
        // <ψ|X|ψ> = 2·0.6·0.8
        assert!((cost.evaluate(psi.as_ref()) - 0.96).abs() < 1e-15);
        let mut grad = [0.; 4];
        cost.gradient(psi.as_ref(), &mut grad);
        assert!((grad[0] - 2. * 0.8).abs() < 1e-15);
        assert!((grad[1] - 2. * 0.6).abs() < 1e-15);
    }

    #[test]
    fn test_neg_entropy_is_identically_zero() {
        let cost = NegEntropyCost;
        let psi = col(&[0.3, 0.1, -0.4, 0.2]);
        assert_eq!(cost.evaluate(psi.as_ref()), 0.);
        let mut grad = [1.; 4];
        cost.gradient(psi.as_ref(), &mut grad);
        assert_eq!(grad, [0.; 4]);
        assert!(cost.hessian_structure().is_empty());
    }

    #[test]
    fn test_pure_real_penalizes_imaginary_half_only() {
        let cost = PureRealCost::new(4);
        assert_eq!(cost.evaluate(col(&[0.7, 0.7, 0., 0.]).as_ref()), 0.);
        let v = cost.evaluate(col(&[0., 0.6, 0.8, 0.]).as_ref());
        assert!((v - 0.64).abs() < 1e-15);
        assert_eq!(cost.hessian_structure(), &[(2, 2), (3, 3)]);
    }

    #[test]
    fn test_structures_are_upper_triangle() {
        let costs: Vec<Box<dyn Cost>> = vec![
            Box::new(InfidelityCost::new(col(&[1., 0., 0., 0.]))),
            Box::new(IsoInfidelityCost::new(col(&[0., 1., 0., 0.]))),
            Box::new(GeodesicCost::new(col(&[0., 1., 0., 0.]))),
            Box::new(PureRealCost::new(4)),
        ];
        for cost in &costs {
            for &(k, j) in cost.hessian_structure() {
                assert!(k <= j, "{}: ({k}, {j}) below the diagonal", cost.name());
            }
        }
    }

    #[test]
    fn test_costs_are_clonable_objects() {
        let cost: Box<dyn Cost> = Box::new(InfidelityCost::new(col(&[1., 0., 0., 0.])));
        let copy = cost.clone();
        let psi = col(&[0., 1., 0., 0.]);
        assert_eq!(cost.evaluate(psi.as_ref()), copy.evaluate(psi.as_ref()));
    }
}
