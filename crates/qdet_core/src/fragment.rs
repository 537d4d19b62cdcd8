//! Fragment splitter.
//!
//! A fragment is a contiguous run of moments that ends with the first moment
//! containing a measurement. Inside a fragment every qubit follows the same
//! shape: an optional reset before any other use, unitary gates, and at most
//! one measurement in the closing moment. The propagator depends on that shape,
//! so the splitter enforces it and rejects anything else as malformed.

use crate::DetectorError;
use crate::circuit::{Circuit, Instruction, Operation, Target};
use qdet_common::gates::{GateClass, GateKind};
use qdet_common::pauli::Basis;
use std::ops::Range;
use tracing::{debug, warn};

/// One measurement outcome bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementEvent {
    /// Position among all measurement results of the circuit.
    pub ordinal: usize,
    pub qubit: u32,
    pub basis: Basis,
    /// Recorded as the complement of the outcome (`!q` target).
    pub inverted: bool,
    /// Ordinal of the instruction that produced the result.
    pub instruction: usize,
    pub fragment: usize,
}

/// A reset that opens a forward flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSite {
    pub qubit: u32,
    pub basis: Basis,
    /// `None` for the implicit `|0>` preparation of a qubit first used by a gate.
    pub instruction: Option<usize>,
}

/// A unitary gate applied to one target group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateApplication {
    Single { gate: GateKind, qubit: u32 },
    Pair { gate: GateKind, first: u32, second: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub index: usize,
    /// Instruction ordinals covered by the fragment.
    pub instructions: Range<usize>,
    pub resets: Vec<ResetSite>,
    /// Unitary gates in circuit order.
    pub gates: Vec<GateApplication>,
    /// Measurements of the closing moment, in record order.
    pub measurements: Vec<MeasurementEvent>,
}

impl Fragment {
    fn empty(index: usize, start: usize) -> Self {
        Self {
            index,
            instructions: start..start,
            resets: Vec::new(),
            gates: Vec::new(),
            measurements: Vec::new(),
        }
    }

    /// Whether the fragment closes with a measurement moment.
    pub fn is_terminated(&self) -> bool {
        !self.measurements.is_empty()
    }

    pub fn resets_qubit(&self, qubit: u32) -> bool {
        self.resets.iter().any(|r| r.qubit == qubit)
    }
}

/// Output of [`split_into_fragments`].
#[derive(Debug, Clone)]
pub struct FragmentedCircuit {
    pub num_qubits: usize,
    pub fragments: Vec<Fragment>,
    /// Every measurement event, indexed by its ordinal.
    pub events: Vec<MeasurementEvent>,
}

/// Splits `circuit` into fragments and validates their structure.
///
/// # Arguments
///
/// * `circuit` - Flat circuit to split; annotations are skipped
/// * `implicit_zero_init` - Treat the first gate on an untouched qubit as
///   preceded by a `Z` reset
///
/// # Returns
///
/// The fragments in circuit order together with the measurement events, or
/// the first structural violation found.
pub fn split_into_fragments(
    circuit: &Circuit,
    implicit_zero_init: bool,
) -> Result<FragmentedCircuit, DetectorError> {
    if !circuit.is_flat() {
        return Err(DetectorError::MalformedCircuit {
            reason: "REPEAT blocks must be unrolled before splitting".into(),
            fragment: None,
            ordinal: None,
            qubits: Vec::new(),
        });
    }
    let mut splitter = Splitter::new(circuit.num_qubits(), implicit_zero_init);
    let instructions = circuit.instructions();

    for moment in circuit.moments() {
        let mut reset_at = None;
        let mut measure_at = None;
        for ordinal in moment.clone() {
            if let Instruction::Operation(op) = &instructions[ordinal] {
                match splitter.operation(ordinal, op)? {
                    GateClass::Reset(_) => reset_at = reset_at.or(Some(ordinal)),
                    GateClass::Measurement(_) => measure_at = measure_at.or(Some(ordinal)),
                    _ => {}
                }
            }
        }
        if let (Some(_), Some(at)) = (reset_at, measure_at) {
            return Err(DetectorError::MalformedCircuit {
                reason: "moment contains both resets and measurements".into(),
                fragment: Some(splitter.current.index),
                ordinal: Some(at),
                qubits: Vec::new(),
            });
        }
        splitter.current.instructions.end = moment.end;
        if measure_at.is_some() {
            splitter.close(moment.end);
        }
    }
    splitter.finish()
}

struct Splitter {
    num_qubits: usize,
    implicit_zero_init: bool,
    /// Reset or gated at some earlier point of the circuit.
    prepared: Vec<bool>,
    /// Gated or measured in the current fragment.
    used: Vec<bool>,
    measured: Vec<bool>,
    current: Fragment,
    fragments: Vec<Fragment>,
    events: Vec<MeasurementEvent>,
}

impl Splitter {
    fn new(num_qubits: usize, implicit_zero_init: bool) -> Self {
        Self {
            num_qubits,
            implicit_zero_init,
            prepared: vec![false; num_qubits],
            used: vec![false; num_qubits],
            measured: vec![false; num_qubits],
            current: Fragment::empty(0, 0),
            fragments: Vec::new(),
            events: Vec::new(),
        }
    }

    fn malformed(&self, reason: &str, ordinal: usize, qubits: Vec<u32>) -> DetectorError {
        DetectorError::MalformedCircuit {
            reason: reason.to_string(),
            fragment: Some(self.current.index),
            ordinal: Some(ordinal),
            qubits,
        }
    }

    /// Validates and records one operation, returning its class.
    fn operation(&mut self, ordinal: usize, op: &Operation) -> Result<GateClass, DetectorError> {
        let Some(gate) = op.gate else {
            return Err(DetectorError::UnsupportedGate {
                name: op.name.clone(),
                ordinal,
                qubits: op.qubits(),
            });
        };
        if op.targets.iter().any(|t| matches!(t, Target::Record(_))) {
            return Err(DetectorError::UnsupportedGate {
                name: format!("{} (classically controlled)", op.name),
                ordinal,
                qubits: op.qubits(),
            });
        }
        let qubits = op.qubits();
        if qubits.len() % gate.arity() != 0 {
            return Err(self.malformed("target count is not a multiple of the gate arity", ordinal, qubits));
        }

        let class = gate.class();
        match class {
            GateClass::MeasureReset(_) => {
                return Err(self.malformed("combined measure-reset operations are not supported", ordinal, qubits));
            }
            GateClass::Noise => {}
            GateClass::Reset(basis) => {
                for &q in &qubits {
                    self.reset(ordinal, q, basis)?;
                }
            }
            GateClass::Measurement(basis) => {
                for target in &op.targets {
                    if let Target::Qubit { index, inverted } = *target {
                        self.measure(ordinal, index, basis, inverted)?;
                    }
                }
            }
            GateClass::SingleQubit => {
                for &q in &qubits {
                    self.touch(ordinal, q)?;
                    self.current.gates.push(GateApplication::Single { gate, qubit: q });
                }
            }
            GateClass::TwoQubit => {
                for pair in qubits.chunks_exact(2) {
                    let (first, second) = (pair[0], pair[1]);
                    if first == second {
                        return Err(self.malformed("two-qubit gate applied to a single qubit", ordinal, vec![first]));
                    }
                    self.touch(ordinal, first)?;
                    self.touch(ordinal, second)?;
                    self.current.gates.push(GateApplication::Pair { gate, first, second });
                }
            }
        }
        Ok(class)
    }

    fn reset(&mut self, ordinal: usize, qubit: u32, basis: Basis) -> Result<(), DetectorError> {
        let q = qubit as usize;
        if self.used[q] {
            return Err(self.malformed("qubit reset after being used in the same fragment", ordinal, vec![qubit]));
        }
        // A second reset before any use replaces the first.
        self.current.resets.retain(|r| r.qubit != qubit);
        self.current.resets.push(ResetSite {
            qubit,
            basis,
            instruction: Some(ordinal),
        });
        self.prepared[q] = true;
        Ok(())
    }

    fn touch(&mut self, ordinal: usize, qubit: u32) -> Result<(), DetectorError> {
        let q = qubit as usize;
        if self.measured[q] {
            return Err(self.malformed("qubit used after its measurement in the same fragment", ordinal, vec![qubit]));
        }
        if !self.prepared[q] {
            self.prepared[q] = true;
            if self.implicit_zero_init {
                self.current.resets.push(ResetSite {
                    qubit,
                    basis: Basis::Z,
                    instruction: None,
                });
            }
        }
        self.used[q] = true;
        Ok(())
    }

    fn measure(&mut self, ordinal: usize, qubit: u32, basis: Basis, inverted: bool) -> Result<(), DetectorError> {
        let q = qubit as usize;
        if !self.prepared[q] {
            return Err(self.malformed("qubit measured without being reset or gated", ordinal, vec![qubit]));
        }
        if self.measured[q] {
            return Err(self.malformed("qubit measured twice in the same fragment", ordinal, vec![qubit]));
        }
        self.measured[q] = true;
        self.used[q] = true;
        let event = MeasurementEvent {
            ordinal: self.events.len(),
            qubit,
            basis,
            inverted,
            instruction: ordinal,
            fragment: self.current.index,
        };
        self.events.push(event);
        self.current.measurements.push(event);
        Ok(())
    }

    fn close(&mut self, end: usize) {
        let next = Fragment::empty(self.current.index + 1, end);
        let done = std::mem::replace(&mut self.current, next);
        debug!(
            fragment = done.index,
            resets = done.resets.len(),
            gates = done.gates.len(),
            measurements = done.measurements.len(),
            "closed fragment"
        );
        self.fragments.push(done);
        self.used.fill(false);
        self.measured.fill(false);
    }

    fn finish(mut self) -> Result<FragmentedCircuit, DetectorError> {
        let tail = std::mem::replace(&mut self.current, Fragment::empty(0, 0));
        if !tail.gates.is_empty() {
            let qubits = tail
                .gates
                .iter()
                .flat_map(|g| match *g {
                    GateApplication::Single { qubit, .. } => vec![qubit],
                    GateApplication::Pair { first, second, .. } => vec![first, second],
                })
                .collect();
            return Err(DetectorError::MalformedCircuit {
                reason: "circuit ends with gates that are never measured".into(),
                fragment: Some(tail.index),
                ordinal: Some(tail.instructions.start),
                qubits,
            });
        }
        if !tail.resets.is_empty() {
            warn!(
                fragment = tail.index,
                qubits = ?tail.resets.iter().map(|r| r.qubit).collect::<Vec<_>>(),
                "resets after the last measurement are not followed by any measurement"
            );
            self.fragments.push(tail);
        }
        Ok(FragmentedCircuit {
            num_qubits: self.num_qubits,
            fragments: self.fragments,
            events: self.events,
        })
    }
}
