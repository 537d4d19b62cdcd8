//! Detector annotation.
//!
//! Inserts one `DETECTOR` per detector right after the measurement
//! instruction that produced its latest event. Record offsets are counted
//! back from the number of measurements performed at that point, and the
//! coordinates compensate for any `SHIFT_COORDS` seen so far. Existing
//! instructions are copied through untouched and in order.
//!
//! Detectors are located by ordinals of the unrolled circuit, but the output
//! keeps the input's `REPEAT` structure: every iteration is rewritten and
//! consecutive identical iterations are folded back into a loop.

use crate::DetectorError;
use crate::circuit::{Circuit, Instruction};
use crate::fragment::MeasurementEvent;
use crate::search::Detector;
use std::collections::BTreeMap;

/// Rewrites `circuit` with `detectors` inserted.
///
/// # Arguments
///
/// * `circuit` - Circuit the detectors were found in, loops included
/// * `events` - Measurement events of the unrolled circuit, indexed by ordinal
/// * `detectors` - Detectors to insert
/// * `append_time` - Append the detector's fragment index as a last coordinate
pub fn annotate(
    circuit: &Circuit,
    events: &[MeasurementEvent],
    detectors: &[Detector],
    append_time: bool,
) -> Circuit {
    let mut by_instruction: BTreeMap<usize, Vec<&Detector>> = BTreeMap::new();
    for detector in detectors {
        if let Some(&latest) = detector.events.last() {
            by_instruction
                .entry(events[latest].instruction)
                .or_default()
                .push(detector);
        }
    }

    let mut writer = Writer {
        coordinates: circuit.qubit_coordinates(),
        by_instruction,
        append_time,
        ordinal: 0,
        measured: 0,
        shift: Vec::new(),
    };
    Circuit::from_instructions(writer.block(circuit.instructions()))
}

struct Writer<'a> {
    coordinates: BTreeMap<u32, Vec<f64>>,
    by_instruction: BTreeMap<usize, Vec<&'a Detector>>,
    append_time: bool,
    /// Ordinal of the next instruction in the unrolled circuit.
    ordinal: usize,
    measured: usize,
    shift: Vec<f64>,
}

impl Writer<'_> {
    fn block(&mut self, instructions: &[Instruction]) -> Vec<Instruction> {
        let mut out = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            match instruction {
                Instruction::Repeat { count, body } => self.repeat(*count, body, &mut out),
                _ => self.single(instruction, &mut out),
            }
        }
        out
    }

    fn single(&mut self, instruction: &Instruction, out: &mut Vec<Instruction>) {
        out.push(instruction.clone());
        self.measured += instruction.measurement_count();
        if let Instruction::ShiftCoords(delta) = instruction {
            accumulate(&mut self.shift, delta);
        }
        if let Some(pending) = self.by_instruction.get(&self.ordinal) {
            for detector in pending {
                out.push(self.detector(detector));
            }
        }
        self.ordinal += 1;
    }

    fn repeat(&mut self, count: u64, body: &Circuit, out: &mut Vec<Instruction>) {
        if count <= 1 {
            let body = if count == 0 {
                body.clone()
            } else {
                Circuit::from_instructions(self.block(body.instructions()))
            };
            out.push(Instruction::Repeat { count, body });
            return;
        }
        let mut run: Option<(Vec<Instruction>, u64)> = None;
        for _ in 0..count {
            let iteration = self.block(body.instructions());
            let same = run.as_ref().is_some_and(|(current, _)| *current == iteration);
            if same {
                if let Some((_, repeats)) = run.as_mut() {
                    *repeats += 1;
                }
            } else if let Some((previous, repeats)) = run.replace((iteration, 1)) {
                fold(previous, repeats, out);
            }
        }
        if let Some((last, repeats)) = run {
            fold(last, repeats, out);
        }
    }

    fn detector(&self, detector: &Detector) -> Instruction {
        let mut coords = self.coordinates.get(&detector.tag_qubit).cloned().unwrap_or_default();
        if self.append_time {
            coords.push(detector.time as f64);
        }
        for (c, s) in coords.iter_mut().zip(&self.shift) {
            *c -= s;
        }
        let records = detector
            .events
            .iter()
            .map(|&e| e as i64 - self.measured as i64)
            .collect();
        Instruction::Detector { coords, records }
    }
}

/// Emits `repeats` copies of one rewritten iteration, as a loop when there
/// is more than one.
fn fold(iteration: Vec<Instruction>, repeats: u64, out: &mut Vec<Instruction>) {
    if repeats == 1 {
        out.extend(iteration);
    } else {
        out.push(Instruction::Repeat {
            count: repeats,
            body: Circuit::from_instructions(iteration),
        });
    }
}

/// Absolute event sets of the `DETECTOR` instructions already in `circuit`,
/// in the order of the unrolled circuit.
///
/// Fails with `MalformedCircuit` when a record offset points before the
/// first measurement or is not negative.
pub fn existing_detectors(circuit: &Circuit) -> Result<Vec<Vec<usize>>, DetectorError> {
    let mut scan = Scan::default();
    scan.block(circuit.instructions())?;
    Ok(scan.sets)
}

#[derive(Default)]
struct Scan {
    ordinal: usize,
    measured: usize,
    sets: Vec<Vec<usize>>,
}

impl Scan {
    fn block(&mut self, instructions: &[Instruction]) -> Result<(), DetectorError> {
        for instruction in instructions {
            if let Instruction::Repeat { count, body } = instruction {
                if body.num_detectors() == 0 {
                    self.measured = self.measured.saturating_add(instruction.measurement_count());
                    let iterations = usize::try_from(*count).unwrap_or(usize::MAX);
                    self.ordinal = self.ordinal.saturating_add(body.flat_len().saturating_mul(iterations));
                } else {
                    for _ in 0..*count {
                        self.block(body.instructions())?;
                    }
                }
                continue;
            }
            self.measured += instruction.measurement_count();
            if let Instruction::Detector { records, .. } = instruction {
                self.detector(records)?;
            }
            self.ordinal += 1;
        }
        Ok(())
    }

    fn detector(&mut self, records: &[i64]) -> Result<(), DetectorError> {
        let mut set = Vec::with_capacity(records.len());
        for &offset in records {
            let absolute = self.measured as i64 + offset;
            if offset >= 0 || absolute < 0 {
                return Err(DetectorError::MalformedCircuit {
                    reason: format!("detector record rec[{offset}] is out of range"),
                    fragment: None,
                    ordinal: Some(self.ordinal),
                    qubits: Vec::new(),
                });
            }
            set.push(absolute as usize);
        }
        set.sort_unstable();
        self.sets.push(set);
        Ok(())
    }
}

fn accumulate(shift: &mut Vec<f64>, delta: &[f64]) {
    if shift.len() < delta.len() {
        shift.resize(delta.len(), 0.0);
    }
    for (s, d) in shift.iter_mut().zip(delta) {
        *s += d;
    }
}
