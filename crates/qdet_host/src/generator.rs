//! Benchmark circuit generator.
//!
//! Builds unannotated repetition-code memory experiments: data qubits on
//! even indices, parity ancillas on odd ones, one line of coordinates. An
//! optional bit-flip channel before every round makes the output usable
//! with external samplers; the annotator ignores noise.

use anyhow::{Result, bail};
use qdet_common::gates::GateKind;
use qdet_core::circuit::{Circuit, Instruction, Operation, Target};
use qdet_io::save_circuit_file;

/// Builds a `distance` x `rounds` repetition-code memory circuit.
///
/// # Arguments
///
/// * `distance` - Number of data qubits
/// * `rounds` - Number of ancilla measurement rounds
/// * `p` - `X_ERROR` probability applied to every data qubit before each
///   round; no channel is emitted when zero
pub fn repetition_memory(distance: u32, rounds: u32, p: f64) -> Circuit {
    let num_qubits = 2 * distance - 1;
    let data: Vec<u32> = (0..num_qubits).step_by(2).collect();
    let ancillas: Vec<u32> = (1..num_qubits).step_by(2).collect();
    let left: Vec<u32> = ancillas.iter().flat_map(|&a| [a - 1, a]).collect();
    let right: Vec<u32> = ancillas.iter().flat_map(|&a| [a + 1, a]).collect();

    let mut c = Circuit::new();
    for q in 0..num_qubits {
        c.qubit_coords(q, &[f64::from(q), 0.0]);
    }
    c.append(GateKind::R, &data).tick();
    for _ in 0..rounds {
        if p > 0.0 {
            let targets = data.iter().map(|&q| Target::qubit(q)).collect();
            c.push(Instruction::Operation(Operation::named("X_ERROR", targets, vec![p])));
        }
        c.append(GateKind::R, &ancillas)
            .tick()
            .append(GateKind::CX, &left)
            .tick()
            .append(GateKind::CX, &right)
            .tick()
            .append(GateKind::M, &ancillas)
            .tick();
    }
    c.append(GateKind::M, &data).push(Instruction::ObservableInclude {
        index: 0,
        records: vec![-1],
    });
    c
}

pub fn generate_repetition_code(path: &str, distance: u32, rounds: u32, p: f64) -> Result<()> {
    if distance < 2 {
        bail!("repetition code distance must be at least 2, got {distance}");
    }
    if !(0.0..=1.0).contains(&p) {
        bail!("error probability {p} is outside [0, 1]");
    }
    println!("Generating distance {distance} repetition code, {rounds} rounds (p={p})...");
    let circuit = repetition_memory(distance, rounds, p);
    save_circuit_file(path, &circuit)?;
    println!(
        "Wrote {} instructions, {} measurements to {path}.",
        circuit.len(),
        circuit.num_measurements()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdet_core::{DetectorConfig, annotate_detectors};

    #[test]
    fn memory_circuit_layout() {
        let c = repetition_memory(3, 2, 0.0);
        assert_eq!(c.num_qubits(), 5);
        assert_eq!(c.num_measurements(), 2 * 2 + 3);
        assert_eq!(c.num_detectors(), 0);
    }

    #[test]
    fn noise_does_not_change_the_detectors() {
        let config = DetectorConfig::default();
        let clean = annotate_detectors(&repetition_memory(3, 3, 0.0), &config).unwrap();
        let noisy = annotate_detectors(&repetition_memory(3, 3, 0.01), &config).unwrap();
        assert_eq!(clean.detectors.len(), 8);
        let events = |r: &qdet_core::AnnotationReport| -> Vec<Vec<usize>> {
            r.detectors.iter().map(|d| d.events.clone()).collect()
        };
        assert_eq!(events(&clean), events(&noisy));
    }
}
