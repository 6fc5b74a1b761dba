//! # Objective algebra
//!
//! An [`Objective`] bundles the scalar `L(Z)`, its gradient, and a sparse
//! Hessian in the structure + values convention, together with metadata
//! describing the terms it was assembled from. Objectives form an additive
//! monoid: `+` adds values and gradients pointwise and **concatenates** the
//! Hessian structures and values. Concatenation is the load-bearing trick:
//! because the consumer sums repeated coordinates, composition never has to
//! merge sparsity patterns.
//!
//! Hessian coordinates here are upper triangle (`k ≤ j`), the cost-library
//! convention; the evaluator flips them when it concatenates with the
//! lower-triangle dynamics blocks.

use std::iter::Sum;
use std::ops::Add;

use faer::Col;
use serde::{Deserialize, Serialize};

use crate::E;
use crate::costs::{Cost, CostType, terminal_cost};
use crate::iso::ZLayout;
use crate::system::QuantumSystem;

/// Provenance of one objective term, kept for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermInfo {
    pub name: String,
    pub weight: E,
}

pub struct Objective {
    terms: Vec<TermInfo>,
    value: Box<dyn Fn(&Col<E>) -> E>,
    gradient: Box<dyn Fn(&Col<E>) -> Col<E>>,
    hess_structure: Vec<(usize, usize)>,
    hess_values: Box<dyn Fn(&Col<E>) -> Vec<E>>,
}

impl Objective {
    pub fn value(&self, z: &Col<E>) -> E {
        (self.value)(z)
    }

    pub fn gradient(&self, z: &Col<E>) -> Col<E> {
        (self.gradient)(z)
    }

    pub fn hessian_structure(&self) -> &[(usize, usize)] {
        &self.hess_structure
    }

    pub fn hessian_values(&self, z: &Col<E>) -> Vec<E> {
        (self.hess_values)(z)
    }

    pub fn terms(&self) -> &[TermInfo] {
        &self.terms
    }
}

/// The zero objective, identity of the monoid.
impl Default for Objective {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            value: Box::new(|_| 0.),
            gradient: Box::new(|z| Col::zeros(z.nrows())),
            hess_structure: Vec::new(),
            hess_values: Box::new(|_| Vec::new()),
        }
    }
}

impl Add for Objective {
    type Output = Objective;

    fn add(self, rhs: Objective) -> Objective {
        let (v1, v2) = (self.value, rhs.value);
        let (g1, g2) = (self.gradient, rhs.gradient);
        let (h1, h2) = (self.hess_values, rhs.hess_values);

        let mut terms = self.terms;
        terms.extend(rhs.terms);
        let mut hess_structure = self.hess_structure;
        hess_structure.extend(rhs.hess_structure);

        Objective {
            terms,
            value: Box::new(move |z| v1(z) + v2(z)),
            gradient: Box::new(move |z| {
                let mut g = g1(z);
                g += g2(z);
                g
            }),
            hess_structure,
            hess_values: Box::new(move |z| {
                let mut v = h1(z);
                v.extend(h2(z));
                v
            }),
        }
    }
}

impl Sum for Objective {
    fn sum<It: Iterator<Item = Objective>>(iter: It) -> Objective {
        iter.fold(Objective::default(), |acc, o| acc + o)
    }
}

/// `Q · Σᵢ cost(ψ̃ⁱ_T)`: terminal quantum cost over every tracked state.
pub fn quantum_objective(
    system: &QuantumSystem,
    layout: &ZLayout,
    cost_type: CostType,
    weight: E,
) -> Objective {
    let costs = (0..system.nqstates())
        .map(|i| terminal_cost(system, i, cost_type))
        .collect();
    quantum_objective_with_costs(layout, costs, weight)
}

/// Terminal quantum cost with explicit per-qstate cost objects.
pub fn quantum_objective_with_costs(
    layout: &ZLayout,
    costs: Vec<Box<dyn Cost>>,
    weight: E,
) -> Objective {
    let isodim = layout.isodim;
    let final_step = layout.horizon - 1;
    let bases: Vec<usize> = (0..costs.len())
        .map(|i| layout.wfn_index(final_step, i, 0))
        .collect();

    let mut hess_structure = Vec::new();
    for (i, cost) in costs.iter().enumerate() {
        for &(k, j) in cost.hessian_structure() {
            hess_structure.push((bases[i] + k, bases[i] + j));
        }
    }

    let name = costs
        .first()
        .map(|c| c.name().to_string())
        .unwrap_or_else(|| "quantum".to_string());

    let value = {
        let costs = costs.clone();
        let bases = bases.clone();
        Box::new(move |z: &Col<E>| {
            costs
                .iter()
                .zip(&bases)
                .map(|(cost, &base)| cost.evaluate(z.as_ref().subrows(base, isodim)))
                .sum::<E>()
                * weight
        })
    };

    let gradient = {
        let costs = costs.clone();
        let bases = bases.clone();
        Box::new(move |z: &Col<E>| {
            let mut g = Col::zeros(z.nrows());
            let mut block = vec![0.; isodim];
            for (cost, &base) in costs.iter().zip(&bases) {
                cost.gradient(z.as_ref().subrows(base, isodim), &mut block);
                for m in 0..isodim {
                    g[base + m] = weight * block[m];
                }
            }
            g
        })
    };

    let hess_values = Box::new(move |z: &Col<E>| {
        let mut values = Vec::new();
        for (cost, &base) in costs.iter().zip(&bases) {
            let mut block = vec![0.; cost.hessian_structure().len()];
            cost.hessian_values(z.as_ref().subrows(base, isodim), &mut block);
            values.extend(block.iter().map(|v| weight * v));
        }
        values
    });

    Objective {
        terms: vec![TermInfo { name, weight }],
        value,
        gradient,
        hess_structure,
        hess_values,
    }
}

/// `(R/2) · Σ_{t ∈ times} ‖Z[slice(t, offsets)]‖²`.
pub fn quadratic_regularizer(
    offsets: Vec<usize>,
    vardim: usize,
    times: Vec<usize>,
    weight: E,
) -> Objective {
    let indices: Vec<usize> = times
        .iter()
        .flat_map(|&t| offsets.iter().map(move |&o| t * vardim + o))
        .collect();

    let hess_structure: Vec<(usize, usize)> = indices.iter().map(|&p| (p, p)).collect();
    let n_entries = hess_structure.len();

    let value = {
        let indices = indices.clone();
        Box::new(move |z: &Col<E>| {
            0.5 * weight * indices.iter().map(|&p| z[p] * z[p]).sum::<E>()
        })
    };
    let gradient = {
        let indices = indices.clone();
        Box::new(move |z: &Col<E>| {
            let mut g = Col::zeros(z.nrows());
            for &p in &indices {
                g[p] = weight * z[p];
            }
            g
        })
    };
    let hess_values = Box::new(move |_: &Col<E>| vec![weight; n_entries]);

    Objective {
        terms: vec![TermInfo {
            name: "quadratic_regularizer".to_string(),
            weight,
        }],
        value,
        gradient,
        hess_structure,
        hess_values,
    }
}

/// `(R/2) · Σ ‖v_{t+1} − v_t‖²` over consecutive entries of `times`.
///
/// The Hessian is emitted pairwise: `+R` on both diagonal ends and `−R`
/// off-diagonal for every difference, so interior diagonal entries appear
/// twice and sum to `2R` in the consumer, endpoints once.
pub fn quadratic_smoothness_regularizer(
    offsets: Vec<usize>,
    vardim: usize,
    times: Vec<usize>,
    weight: E,
) -> Objective {
    let pairs: Vec<(usize, usize)> = times
        .windows(2)
        .flat_map(|w| {
            offsets
                .iter()
                .map(move |&o| (w[0] * vardim + o, w[1] * vardim + o))
        })
        .collect();

    let mut hess_structure = Vec::with_capacity(3 * pairs.len());
    for &(p, q) in &pairs {
        hess_structure.push((p, p));
        hess_structure.push((q, q));
        hess_structure.push((p, q));
    }

    let value = {
        let pairs = pairs.clone();
        Box::new(move |z: &Col<E>| {
            0.5 * weight
                * pairs
                    .iter()
                    .map(|&(p, q)| {
                        let d = z[q] - z[p];
                        d * d
                    })
                    .sum::<E>()
        })
    };
    let gradient = {
        let pairs = pairs.clone();
        Box::new(move |z: &Col<E>| {
            let mut g = Col::zeros(z.nrows());
            for &(p, q) in &pairs {
                let d = weight * (z[q] - z[p]);
                g[q] += d;
                g[p] -= d;
            }
            g
        })
    };
    let n_pairs = pairs.len();
    let hess_values = Box::new(move |_: &Col<E>| {
        let mut v = Vec::with_capacity(3 * n_pairs);
        for _ in 0..n_pairs {
            v.push(weight);
            v.push(weight);
            v.push(-weight);
        }
        v
    });

    Objective {
        terms: vec![TermInfo {
            name: "smoothness_regularizer".to_string(),
            weight,
        }],
        value,
        gradient,
        hess_structure,
        hess_values,
    }
}

/// `α · Σ (s1 + s2)`: the linear slack penalty of L1 regularization.
pub fn l1_slack_regularizer(s1: Vec<usize>, s2: Vec<usize>, weight: E) -> Objective {
    debug_assert_eq!(s1.len(), s2.len());
    let indices: Vec<usize> = s1.into_iter().chain(s2).collect();

    let value = {
        let indices = indices.clone();
        Box::new(move |z: &Col<E>| weight * indices.iter().map(|&p| z[p]).sum::<E>())
    };
    let gradient = Box::new(move |z: &Col<E>| {
        let mut g = Col::zeros(z.nrows());
        for &p in &indices {
            g[p] = weight;
        }
        g
    });

    Objective {
        terms: vec![TermInfo {
            name: "l1_slack_regularizer".to_string(),
            weight,
        }],
        value,
        gradient,
        hess_structure: Vec::new(),
        hess_values: Box::new(|_| Vec::new()),
    }
}

/// `Σₜ Δtₜ`: total pulse duration.
pub fn min_time_objective(dt_indices: Vec<usize>, weight: E) -> Objective {
    let value = {
        let indices = dt_indices.clone();
        Box::new(move |z: &Col<E>| weight * indices.iter().map(|&p| z[p]).sum::<E>())
    };
    let gradient = Box::new(move |z: &Col<E>| {
        let mut g = Col::zeros(z.nrows());
        for &p in &dt_indices {
            g[p] = weight;
        }
        g
    });

    Objective {
        terms: vec![TermInfo {
            name: "min_time".to_string(),
            weight,
        }],
        value,
        gradient,
        hess_structure: Vec::new(),
        hess_values: Box::new(|_| Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn z(values: &[E]) -> Col<E> {
        Col::from_fn(values.len(), |i| values[i])
    }

    #[test]
    fn test_zero_objective_is_identity() {
        let reg = quadratic_regularizer(vec![0], 2, vec![0, 1], 2.);
        let combined = Objective::default() + reg;
        let point = z(&[1., 0., 3., 0.]);
        // (R/2)(1 + 9) = 10
        assert!((combined.value(&point) - 10.).abs() < 1e-14);
        assert_eq!(combined.terms().len(), 1);
    }

    #[test]
    fn test_addition_is_pointwise_and_concatenating() {
        let a = quadratic_regularizer(vec![0], 1, vec![0, 1, 2], 1.);
        let b = min_time_objective(vec![1, 2], 3.);
        let a_structure = a.hessian_structure().to_vec();

        let sum = a + b;
        let point = z(&[1., 2., 3.]);
        // a = 0.5(1+4+9) = 7, b = 3(2+3) = 15
        assert!((sum.value(&point) - 22.).abs() < 1e-14);

        let g = sum.gradient(&point);
        assert!((g[0] - 1.).abs() < 1e-14);
        assert!((g[1] - (2. + 3.)).abs() < 1e-14);
        assert!((g[2] - (3. + 3.)).abs() < 1e-14);

        // structures concatenate without merging
        assert_eq!(sum.hessian_structure(), a_structure.as_slice());
        assert_eq!(sum.hessian_values(&point).len(), a_structure.len());
        assert_eq!(sum.terms().len(), 2);
    }

    #[test]
    fn test_smoothness_duplicates_interior_diagonal() {
        let obj = quadratic_smoothness_regularizer(vec![0], 1, vec![0, 1, 2], 0.5);
        // pairs (0,1) and (1,2): index 1 appears on the diagonal twice
        let diag_count = obj
            .hessian_structure()
            .iter()
            .filter(|&&(k, j)| k == 1 && j == 1)
            .count();
        assert_eq!(diag_count, 2);

        let point = z(&[0., 1., 3.]);
        // 0.25·(1 + 4) = 1.25
        assert!((obj.value(&point) - 1.25).abs() < 1e-14);
        let g = obj.gradient(&point);
        // interior: R(2v₁ − v₀ − v₂) = 0.5(2 − 0 − 3) = −0.5
        assert!((g[1] + 0.5).abs() < 1e-14);
    }

    #[test]
    fn test_sum_over_iterator() {
        let total: Objective = vec![
            min_time_objective(vec![0], 1.),
            min_time_objective(vec![1], 1.),
        ]
        .into_iter()
        .sum();
        assert!((total.value(&z(&[2., 5.])) - 7.).abs() < 1e-14);
    }
}
