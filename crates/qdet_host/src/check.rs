use anyhow::{Result, bail};
use qdet_core::annotator::existing_detectors;
use qdet_io::load_circuit_file;
use qdet_io::loader::{detector_parities, load_b8_file, slice_shots};

/// Evaluates the `DETECTOR`s of an annotated circuit on sampled shots.
///
/// Parities are raw, not relative to a reference sample: on noiseless samples
/// only detectors with odd expected parity fire, in every shot. On noisy
/// samples the fired counts give a quick syndrome density estimate.
pub fn run_check(circuit_path: &str, b8_path: &str) -> Result<()> {
    let circuit = load_circuit_file(circuit_path)?;
    let detectors = existing_detectors(&circuit)?;
    if detectors.is_empty() {
        bail!("{circuit_path} has no DETECTOR annotations; run `annotate` first");
    }
    let raw = load_b8_file(b8_path)?;
    let shots = slice_shots(&raw, circuit.num_measurements())?;
    println!(
        "Checking {} detectors over {} shots ({} measurements each)...",
        detectors.len(),
        shots.len(),
        circuit.num_measurements()
    );

    let mut fired = vec![0usize; detectors.len()];
    let mut noisy_shots = 0usize;
    for shot in &shots {
        let parities = detector_parities(&detectors, shot);
        if parities.any() {
            noisy_shots += 1;
        }
        for i in parities.iter_ones() {
            fired[i] += 1;
        }
    }

    println!("Shots with detection events: {noisy_shots}/{}", shots.len());
    for (i, &count) in fired.iter().enumerate().filter(|(_, c)| **c > 0) {
        println!("D{i}: {count}");
    }
    Ok(())
}
