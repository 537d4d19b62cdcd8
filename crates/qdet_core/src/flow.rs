//! Stabilizer flow propagation.
//!
//! Inside a fragment every qubit is reset before any gate touches it and
//! measured after the last gate on it, so collapse can be deferred: forward
//! generators are pushed through all gates and collapsed by the measurements
//! at the end, backward generators are pulled through all inverse gates and
//! collapsed by the resets at the start. Gates that precede a qubit's reset
//! never touch it, which makes the deferral exact.

use crate::DetectorError;
use crate::fragment::{Fragment, GateApplication};
use crate::pauli_string::PauliString;
use qdet_common::gates::ConjugationError;
use qdet_common::pauli::{Basis, Pauli};
use rayon::prelude::*;
use std::fmt;

/// Where a flow starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOrigin {
    /// Forward flow opened by a reset (explicit or implicit) of `qubit`.
    Reset { qubit: u32, basis: Basis },
    /// Backward flow opened by a measurement event.
    Measurement { event: usize, qubit: u32, basis: Basis },
}

impl FlowOrigin {
    pub fn qubit(&self) -> u32 {
        match *self {
            FlowOrigin::Reset { qubit, .. } | FlowOrigin::Measurement { qubit, .. } => qubit,
        }
    }
}

impl fmt::Display for FlowOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowOrigin::Reset { qubit, basis } => write!(f, "reset {basis:?} on qubit {qubit}"),
            FlowOrigin::Measurement { event, qubit, basis } => {
                write!(f, "measurement {event} ({basis:?} on qubit {qubit})")
            }
        }
    }
}

/// A Pauli operator conserved through one side of a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizerFlow {
    pub origin: FlowOrigin,
    /// Propagated operator before the collapsing operations are applied.
    pub before_collapse: PauliString,
    /// Operator left on qubits the collapsing operations do not touch.
    pub after_collapse: PauliString,
    /// Measurement events folded into the flow, in increasing order.
    pub events: Vec<usize>,
    /// Qubits where the flow anticommutes with the collapsing operation.
    pub residue: Vec<u32>,
}

impl StabilizerFlow {
    /// True when the flow is fully explained by the collapsing operations.
    pub fn is_measurement_diagonal(&self) -> bool {
        self.residue.is_empty() && self.after_collapse.is_identity()
    }

    /// Sign of the propagated operator, which fixes the parity of the folded events.
    pub fn is_negative(&self) -> bool {
        self.before_collapse.is_negative()
    }
}

/// Flows of one fragment, joined by the pipeline in fragment order.
#[derive(Debug, Clone)]
pub struct FragmentFlows {
    pub fragment: usize,
    /// One flow per reset, collapsed by the closing measurements.
    pub forward: Vec<StabilizerFlow>,
    /// One flow per measurement, collapsed by the fragment's resets.
    pub backward: Vec<StabilizerFlow>,
}

/// Propagates every fragment, optionally on the rayon pool.
pub fn propagate_all(
    fragments: &[Fragment],
    num_qubits: usize,
    parallel: bool,
) -> Result<Vec<FragmentFlows>, DetectorError> {
    if parallel {
        fragments
            .par_iter()
            .map(|f| propagate_fragment(f, num_qubits))
            .collect()
    } else {
        fragments
            .iter()
            .map(|f| propagate_fragment(f, num_qubits))
            .collect()
    }
}

/// Computes the forward and backward flows of a single fragment.
///
/// A fragment without a closing measurement has nothing to collapse against
/// and yields no flows.
pub fn propagate_fragment(fragment: &Fragment, num_qubits: usize) -> Result<FragmentFlows, DetectorError> {
    let mut flows = FragmentFlows {
        fragment: fragment.index,
        forward: Vec::new(),
        backward: Vec::new(),
    };
    if !fragment.is_terminated() {
        return Ok(flows);
    }

    for reset in &fragment.resets {
        let origin = FlowOrigin::Reset {
            qubit: reset.qubit,
            basis: reset.basis,
        };
        let mut pauli = PauliString::single(num_qubits, reset.qubit as usize, reset.basis.pauli());
        for gate in &fragment.gates {
            apply(&mut pauli, *gate, false).map_err(|e| inconsistent(fragment, &origin, e))?;
        }
        let collapse = fragment
            .measurements
            .iter()
            .map(|m| (m.qubit, m.basis, Some(m.ordinal)));
        flows.forward.push(collapse_flow(origin, pauli, collapse, fragment)?);
    }

    for measurement in &fragment.measurements {
        let origin = FlowOrigin::Measurement {
            event: measurement.ordinal,
            qubit: measurement.qubit,
            basis: measurement.basis,
        };
        let mut pauli = PauliString::single(num_qubits, measurement.qubit as usize, measurement.basis.pauli());
        for gate in fragment.gates.iter().rev() {
            apply(&mut pauli, *gate, true).map_err(|e| inconsistent(fragment, &origin, e))?;
        }
        let collapse = fragment.resets.iter().map(|r| (r.qubit, r.basis, None));
        let mut flow = collapse_flow(origin, pauli, collapse, fragment)?;
        flow.events.push(measurement.ordinal);
        flows.backward.push(flow);
    }

    Ok(flows)
}

fn apply(pauli: &mut PauliString, gate: GateApplication, inverse: bool) -> Result<(), ConjugationError> {
    match gate {
        GateApplication::Single { gate, qubit } => {
            let gate = if inverse { gate.inverse() } else { gate };
            pauli.apply_single(gate, qubit as usize)
        }
        GateApplication::Pair { gate, first, second } => {
            let gate = if inverse { gate.inverse() } else { gate };
            pauli.apply_pair(gate, first as usize, second as usize)
        }
    }
}

/// Projects `pauli` onto the collapsing operations.
///
/// For each `(qubit, basis, event)` the component along the basis is folded
/// into the event set (when there is an event to fold), the complementary
/// component becomes residue, and the qubit is stripped.
fn collapse_flow(
    origin: FlowOrigin,
    before_collapse: PauliString,
    collapse: impl Iterator<Item = (u32, Basis, Option<usize>)>,
    fragment: &Fragment,
) -> Result<StabilizerFlow, DetectorError> {
    if !before_collapse.is_hermitian() {
        return Err(DetectorError::InconsistentFlow {
            fragment: fragment.index,
            flow: origin.to_string(),
            reason: format!("propagated operator {before_collapse} is not Hermitian"),
        });
    }
    let mut after_collapse = before_collapse.clone();
    let mut events = Vec::new();
    let mut residue = Vec::new();
    for (qubit, basis, event) in collapse {
        let (along, across) = basis.split(before_collapse.get(qubit as usize));
        if along {
            events.extend(event);
        }
        if across {
            residue.push(qubit);
        }
        after_collapse.set(qubit as usize, Pauli::I);
    }
    events.sort_unstable();
    residue.sort_unstable();
    Ok(StabilizerFlow {
        origin,
        before_collapse,
        after_collapse,
        events,
        residue,
    })
}

fn inconsistent(fragment: &Fragment, origin: &FlowOrigin, err: ConjugationError) -> DetectorError {
    DetectorError::InconsistentFlow {
        fragment: fragment.index,
        flow: origin.to_string(),
        reason: format!("conjugation failed: {err:?}"),
    }
}
