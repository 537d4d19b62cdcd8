//! Measurement-parity graph.
//!
//! For every boundary between fragments the builder collects the generators
//! that live there and the linear constraints they contribute. A boundary
//! `b_i` sits just before fragment `i`; its generators are the forward flows
//! of fragment `i-1`, the bare measurements of fragment `i-1` that survive
//! into fragment `i`, and the backward flows of fragment `i`. A product of
//! generators that cancels on every constraint column is a detector.

use crate::flow::{FragmentFlows, StabilizerFlow};
use crate::fragment::FragmentedCircuit;
use crate::gf2::Gf2Vec;
use crate::pauli_string::PauliString;
use qdet_common::pauli::Basis;

/// Which side of a boundary a generator comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorSource {
    /// Forward flow `flow` of fragment `fragment`.
    Forward { fragment: usize, flow: usize },
    /// A measured qubit left untouched by the next fragment's resets.
    Measurement { event: usize },
    /// Backward flow `flow` of fragment `fragment`.
    Backward { fragment: usize, flow: usize },
}

/// One row of a boundary system.
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub source: GeneratorSource,
    /// Bits over the boundary's constraint columns.
    pub constraint: Gf2Vec,
    /// Measurement events carried by the generator, sorted.
    pub events: Vec<usize>,
    /// Qubit the generator originates from.
    pub tag_qubit: u32,
    /// Signed operator before collapse: the propagated flow for forward and
    /// backward generators, the bare basis Pauli for measurements.
    pub operator: PauliString,
}

/// All generators meeting at one boundary.
#[derive(Debug, Clone)]
pub struct BoundarySystem {
    pub index: usize,
    pub generators: Vec<Generator>,
    /// Qubits measured by the fragment before the boundary.
    pub measured_qubits: Vec<u32>,
    /// Qubits reset by the fragment after the boundary.
    pub reset_qubits: Vec<u32>,
}

impl BoundarySystem {
    /// Events appearing in any generator, sorted and unique.
    pub fn events(&self) -> Vec<usize> {
        let mut events: Vec<usize> = self.generators.iter().flat_map(|g| g.events.iter().copied()).collect();
        events.sort_unstable();
        events.dedup();
        events
    }
}

/// Column layout shared by every boundary of a circuit.
#[derive(Debug, Clone, Copy)]
pub struct Columns {
    num_qubits: usize,
}

impl Columns {
    pub fn new(num_qubits: usize) -> Self {
        Self { num_qubits }
    }

    pub fn width(&self) -> usize {
        4 * self.num_qubits
    }

    pub fn x(&self, qubit: usize) -> usize {
        2 * qubit
    }

    pub fn z(&self, qubit: usize) -> usize {
        2 * qubit + 1
    }

    pub fn measurement_residue(&self, qubit: usize) -> usize {
        2 * self.num_qubits + qubit
    }

    pub fn reset_residue(&self, qubit: usize) -> usize {
        3 * self.num_qubits + qubit
    }

    fn pauli_bits(&self, pauli: &PauliString) -> Gf2Vec {
        let mut v = Gf2Vec::zeros(self.width());
        for q in pauli.support() {
            let p = pauli.get(q);
            v.set(self.x(q), p.x_bit());
            v.set(self.z(q), p.z_bit());
        }
        v
    }

    fn basis_bits(&self, qubit: usize, basis: Basis) -> Gf2Vec {
        let p = basis.pauli();
        let mut v = Gf2Vec::zeros(self.width());
        v.set(self.x(qubit), p.x_bit());
        v.set(self.z(qubit), p.z_bit());
        v
    }
}

/// Boundary systems of a whole circuit.
#[derive(Debug, Clone)]
pub struct ParityGraph {
    pub columns: Columns,
    /// Non-empty boundaries in increasing order.
    pub boundaries: Vec<BoundarySystem>,
}

impl ParityGraph {
    /// Builds every boundary system from the joined fragment flows.
    ///
    /// # Arguments
    ///
    /// * `split` - Fragments and measurement events of the circuit
    /// * `flows` - Flows of every fragment, in fragment order
    pub fn build(split: &FragmentedCircuit, flows: &[FragmentFlows]) -> Self {
        let columns = Columns::new(split.num_qubits);
        let mut boundaries = Vec::new();

        for index in 0..=split.fragments.len() {
            let mut generators = Vec::new();
            let next = split.fragments.get(index);

            if let Some(prev) = index.checked_sub(1).and_then(|i| flows.get(i)) {
                for (i, flow) in prev.forward.iter().enumerate() {
                    let mut constraint = columns.pauli_bits(&flow.after_collapse);
                    for &q in &flow.residue {
                        constraint.set(columns.measurement_residue(q as usize), true);
                    }
                    generators.push(Generator {
                        source: GeneratorSource::Forward {
                            fragment: prev.fragment,
                            flow: i,
                        },
                        constraint,
                        events: flow.events.clone(),
                        tag_qubit: flow.origin.qubit(),
                        operator: flow.before_collapse.clone(),
                    });
                }
            }

            let next_flows = flows.get(index).filter(|f| !f.backward.is_empty());
            let prev_fragment = index.checked_sub(1).map(|i| &split.fragments[i]);
            if let (Some(prev), Some(next), Some(_)) = (prev_fragment, next, next_flows) {
                for m in prev.measurements.iter().filter(|m| !next.resets_qubit(m.qubit)) {
                    generators.push(Generator {
                        source: GeneratorSource::Measurement { event: m.ordinal },
                        constraint: columns.basis_bits(m.qubit as usize, m.basis),
                        events: vec![m.ordinal],
                        tag_qubit: m.qubit,
                        operator: PauliString::single(split.num_qubits, m.qubit as usize, m.basis.pauli()),
                    });
                }
            }

            if let Some(next) = next_flows {
                for (i, flow) in next.backward.iter().enumerate() {
                    generators.push(Generator {
                        source: GeneratorSource::Backward {
                            fragment: next.fragment,
                            flow: i,
                        },
                        constraint: backward_constraint(&columns, flow),
                        events: flow.events.clone(),
                        tag_qubit: flow.origin.qubit(),
                        operator: flow.before_collapse.clone(),
                    });
                }
            }

            if !generators.is_empty() {
                let measured_qubits = prev_fragment
                    .map(|f| f.measurements.iter().map(|m| m.qubit).collect())
                    .unwrap_or_default();
                let reset_qubits = next.map(|f| f.resets.iter().map(|r| r.qubit).collect()).unwrap_or_default();
                boundaries.push(BoundarySystem {
                    index,
                    generators,
                    measured_qubits,
                    reset_qubits,
                });
            }
        }

        Self { columns, boundaries }
    }

    pub fn num_generators(&self) -> usize {
        self.boundaries.iter().map(|b| b.generators.len()).sum()
    }
}

fn backward_constraint(columns: &Columns, flow: &StabilizerFlow) -> Gf2Vec {
    let mut constraint = columns.pauli_bits(&flow.after_collapse);
    for &q in &flow.residue {
        constraint.set(columns.reset_residue(q as usize), true);
    }
    constraint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Circuit;
    use crate::flow::propagate_all;
    use crate::fragment::split_into_fragments;
    use qdet_common::gates::GateKind;

    fn graph(c: &Circuit) -> ParityGraph {
        let split = split_into_fragments(c, true).unwrap();
        let flows = propagate_all(&split.fragments, split.num_qubits, false).unwrap();
        ParityGraph::build(&split, &flows)
    }

    fn two_round_parity_check() -> Circuit {
        let mut c = Circuit::new();
        c.append(GateKind::R, &[0, 1, 2])
            .tick()
            .append(GateKind::CX, &[0, 2, 1, 2])
            .tick()
            .append(GateKind::M, &[2])
            .tick()
            .append(GateKind::R, &[2])
            .tick()
            .append(GateKind::CX, &[0, 2, 1, 2])
            .tick()
            .append(GateKind::M, &[2])
            .tick()
            .append(GateKind::M, &[0, 1]);
        c
    }

    #[test]
    fn boundaries_collect_both_sides() {
        let g = graph(&two_round_parity_check());
        let indices: Vec<usize> = g.boundaries.iter().map(|b| b.index).collect();
        // Nothing is reset in the last fragment, so there is no boundary after it.
        assert_eq!(indices, vec![0, 1, 2]);

        // b0: only backward flows of fragment 0.
        let b0 = &g.boundaries[0];
        assert!(b0.generators.iter().all(|generator| matches!(generator.source, GeneratorSource::Backward { .. })));

        // b2: forward flow of the qubit 2 reset, the bare measurement of qubit 2
        // (not reset again), then backward flows of the data measurements.
        let b2 = &g.boundaries[2];
        let kinds: Vec<&GeneratorSource> = b2.generators.iter().map(|generator| &generator.source).collect();
        assert!(matches!(kinds[0], GeneratorSource::Forward { fragment: 1, .. }));
        assert_eq!(*kinds[1], GeneratorSource::Measurement { event: 1 });
        assert!(matches!(kinds.last(), Some(GeneratorSource::Backward { fragment: 2, .. })));
        assert_eq!(b2.events(), vec![1, 2, 3]);
        assert_eq!(b2.generators[1].operator.to_string(), "+__Z");
        assert_eq!(b2.measured_qubits, vec![2]);
    }

    #[test]
    fn measured_qubits_not_reset_become_generators() {
        let mut c = Circuit::new();
        c.append(GateKind::R, &[0])
            .tick()
            .append(GateKind::M, &[0])
            .tick()
            .append(GateKind::H, &[0])
            .tick()
            .append(GateKind::M, &[0]);
        let g = graph(&c);
        let b1 = g.boundaries.iter().find(|b| b.index == 1).unwrap();
        assert!(
            b1.generators
                .iter()
                .any(|generator| generator.source == GeneratorSource::Measurement { event: 0 })
        );
        assert_eq!(b1.measured_qubits, vec![0]);
        assert!(b1.reset_qubits.is_empty());
        assert!(g.num_generators() >= 3);
    }

    #[test]
    fn residue_columns_are_separate_per_side() {
        let cols = Columns::new(3);
        assert_eq!(cols.width(), 12);
        assert_eq!(cols.z(2), 5);
        assert_eq!(cols.measurement_residue(1), 7);
        assert_eq!(cols.reset_residue(1), 10);
    }
}
