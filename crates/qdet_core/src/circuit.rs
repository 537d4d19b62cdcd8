//! In-memory circuit model.
//!
//! A [`Circuit`] keeps `REPEAT` blocks as nested bodies. Analysis runs on the
//! [`Circuit::flattened`] form, where instruction ordinals, moment boundaries
//! and measurement ordinals are all plain positions in one list.

use crate::DetectorError;
use qdet_common::gates::{GateClass, GateKind};
use std::collections::BTreeMap;
use std::ops::Range;

/// Operand of a gate instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// A qubit, optionally with an inverted-result marker (`!q`).
    Qubit { index: u32, inverted: bool },
    /// A measurement record lookback (`rec[-k]`).
    Record(i64),
}

impl Target {
    pub fn qubit(index: u32) -> Self {
        Target::Qubit {
            index,
            inverted: false,
        }
    }

    pub fn qubit_index(&self) -> Option<u32> {
        match self {
            Target::Qubit { index, .. } => Some(*index),
            Target::Record(_) => None,
        }
    }
}

/// A gate, reset, measurement or noise instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Name as written in the source circuit.
    pub name: String,
    /// Resolved kind; `None` when the name is not in the supported set.
    pub gate: Option<GateKind>,
    pub targets: Vec<Target>,
    pub args: Vec<f64>,
}

impl Operation {
    pub fn new(gate: GateKind, qubits: &[u32]) -> Self {
        Self {
            name: gate.name().to_string(),
            gate: Some(gate),
            targets: qubits.iter().map(|&q| Target::qubit(q)).collect(),
            args: Vec::new(),
        }
    }

    /// Resolves `name` against the supported gate set.
    pub fn named(name: &str, targets: Vec<Target>, args: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            gate: GateKind::from_name(name),
            targets,
            args,
        }
    }

    pub fn qubits(&self) -> Vec<u32> {
        self.targets.iter().filter_map(Target::qubit_index).collect()
    }

    /// Number of measurement results this operation appends to the record.
    pub fn measurement_count(&self) -> usize {
        match self.gate.map(GateKind::class) {
            Some(GateClass::Measurement(_)) | Some(GateClass::MeasureReset(_)) => self.targets.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Operation(Operation),
    Tick,
    QubitCoords { qubit: u32, coords: Vec<f64> },
    ShiftCoords(Vec<f64>),
    /// Records are negative lookbacks relative to the measurements seen so far.
    Detector { coords: Vec<f64>, records: Vec<i64> },
    ObservableInclude { index: u32, records: Vec<i64> },
    /// `body` executed `count` times in a row.
    Repeat { count: u64, body: Circuit },
}

impl Instruction {
    pub fn measurement_count(&self) -> usize {
        match self {
            Instruction::Operation(op) => op.measurement_count(),
            Instruction::Repeat { count, body } => body.num_measurements().saturating_mul(saturate(*count)),
            _ => 0,
        }
    }
}

fn saturate(count: u64) -> usize {
    usize::try_from(count).unwrap_or(usize::MAX)
}

/// Ordered list of instructions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Circuit {
    instructions: Vec<Instruction>,
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_instructions(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    /// Appends `gate` applied to `qubits`.
    pub fn append(&mut self, gate: GateKind, qubits: &[u32]) -> &mut Self {
        self.push(Instruction::Operation(Operation::new(gate, qubits)))
    }

    pub fn tick(&mut self) -> &mut Self {
        self.push(Instruction::Tick)
    }

    pub fn qubit_coords(&mut self, qubit: u32, coords: &[f64]) -> &mut Self {
        self.push(Instruction::QubitCoords {
            qubit,
            coords: coords.to_vec(),
        })
    }

    /// One more than the highest qubit index mentioned anywhere.
    pub fn num_qubits(&self) -> usize {
        self.instructions
            .iter()
            .map(|inst| match inst {
                Instruction::Operation(op) => op.qubits().into_iter().max().map_or(0, |q| q as usize + 1),
                Instruction::QubitCoords { qubit, .. } => *qubit as usize + 1,
                Instruction::Repeat { body, .. } => body.num_qubits(),
                _ => 0,
            })
            .max()
            .unwrap_or(0)
    }

    /// Measurement results of the unrolled circuit.
    pub fn num_measurements(&self) -> usize {
        self.instructions
            .iter()
            .map(Instruction::measurement_count)
            .fold(0, usize::saturating_add)
    }

    /// `DETECTOR` instructions of the unrolled circuit.
    pub fn num_detectors(&self) -> usize {
        self.instructions
            .iter()
            .map(|inst| match inst {
                Instruction::Detector { .. } => 1,
                Instruction::Repeat { count, body } => body.num_detectors().saturating_mul(saturate(*count)),
                _ => 0,
            })
            .fold(0, usize::saturating_add)
    }

    /// Instruction count once every `REPEAT` block is unrolled, saturating.
    pub fn flat_len(&self) -> usize {
        self.instructions
            .iter()
            .map(|inst| match inst {
                Instruction::Repeat { count, body } => body.flat_len().saturating_mul(saturate(*count)),
                _ => 1,
            })
            .fold(0, usize::saturating_add)
    }

    pub fn is_flat(&self) -> bool {
        !self.instructions.iter().any(|inst| matches!(inst, Instruction::Repeat { .. }))
    }

    /// Unrolls every `REPEAT` block.
    ///
    /// Fails with `MalformedCircuit` when the result would hold more than
    /// `limit` instructions.
    pub fn flattened(&self, limit: usize) -> Result<Circuit, DetectorError> {
        let len = self.flat_len();
        if len > limit {
            return Err(DetectorError::MalformedCircuit {
                reason: format!("REPEAT blocks unroll to more than {limit} instructions"),
                fragment: None,
                ordinal: None,
                qubits: Vec::new(),
            });
        }
        let mut out = Vec::with_capacity(len);
        self.unroll_into(&mut out);
        Ok(Circuit::from_instructions(out))
    }

    fn unroll_into(&self, out: &mut Vec<Instruction>) {
        for inst in &self.instructions {
            match inst {
                Instruction::Repeat { count, body } => {
                    for _ in 0..*count {
                        body.unroll_into(out);
                    }
                }
                other => out.push(other.clone()),
            }
        }
    }

    /// Declared coordinates per qubit; later declarations win.
    pub fn qubit_coordinates(&self) -> BTreeMap<u32, Vec<f64>> {
        let mut coordinates = BTreeMap::new();
        self.collect_coordinates(&mut coordinates);
        coordinates
    }

    fn collect_coordinates(&self, coordinates: &mut BTreeMap<u32, Vec<f64>>) {
        for inst in &self.instructions {
            match inst {
                Instruction::QubitCoords { qubit, coords } => {
                    coordinates.insert(*qubit, coords.clone());
                }
                Instruction::Repeat { body, .. } => body.collect_coordinates(coordinates),
                _ => {}
            }
        }
    }

    /// Instruction ranges of each moment.
    ///
    /// A moment runs up to and including the `TICK` that closes it. A trailing
    /// run without a closing `TICK` forms the final moment. Meant for flat
    /// circuits; a `REPEAT` block counts as one instruction.
    pub fn moments(&self) -> Vec<Range<usize>> {
        let mut moments = Vec::new();
        let mut start = 0;
        for (i, inst) in self.instructions.iter().enumerate() {
            if matches!(inst, Instruction::Tick) {
                moments.push(start..i + 1);
                start = i + 1;
            }
        }
        if start < self.instructions.len() {
            moments.push(start..self.instructions.len());
        }
        moments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_moments() {
        let mut c = Circuit::new();
        c.qubit_coords(4, &[1.0, 2.0])
            .append(GateKind::R, &[0, 1])
            .tick()
            .append(GateKind::CX, &[0, 1])
            .tick()
            .append(GateKind::M, &[0, 1]);
        assert_eq!(c.num_qubits(), 5);
        assert_eq!(c.num_measurements(), 2);
        assert_eq!(c.moments(), vec![0..3, 3..5, 5..6]);
        assert_eq!(c.qubit_coordinates().get(&4), Some(&vec![1.0, 2.0]));
    }

    #[test]
    fn repeat_blocks_count_every_iteration() {
        let mut body = Circuit::new();
        body.append(GateKind::R, &[3])
            .tick()
            .append(GateKind::M, &[3])
            .push(Instruction::Detector {
                coords: vec![],
                records: vec![-1],
            });
        let mut c = Circuit::new();
        c.append(GateKind::R, &[0]).push(Instruction::Repeat { count: 3, body });
        assert!(!c.is_flat());
        assert_eq!(c.len(), 2);
        assert_eq!(c.flat_len(), 1 + 3 * 4);
        assert_eq!(c.num_qubits(), 4);
        assert_eq!(c.num_measurements(), 3);
        assert_eq!(c.num_detectors(), 3);

        let flat = c.flattened(64).unwrap();
        assert!(flat.is_flat());
        assert_eq!(flat.len(), 13);
        assert_eq!(flat.num_measurements(), 3);
        assert!(matches!(
            c.flattened(12),
            Err(DetectorError::MalformedCircuit { .. })
        ));
    }

    #[test]
    fn huge_repeat_counts_saturate() {
        let mut body = Circuit::new();
        body.append(GateKind::M, &[0]);
        let mut c = Circuit::new();
        c.push(Instruction::Repeat { count: u64::MAX, body });
        assert_eq!(c.flat_len(), usize::MAX);
        assert!(c.flattened(1 << 20).is_err());
    }

    #[test]
    fn unknown_names_stay_unresolved() {
        let op = Operation::named("T", vec![Target::qubit(0)], Vec::new());
        assert_eq!(op.gate, None);
        assert_eq!(op.measurement_count(), 0);
        let op = Operation::named("cnot", vec![Target::qubit(0), Target::qubit(1)], Vec::new());
        assert_eq!(op.gate, Some(GateKind::CX));
    }
}
