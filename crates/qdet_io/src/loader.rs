//! File loading and saving.
//!
//! Circuits are read and written as stim text through [`crate::parser`].
//! Sampled measurement records use stim's `.b8` layout: each shot is packed
//! little-endian into whole bytes, shots back to back.

use crate::parser::{parse_circuit, write_circuit};
use anyhow::{Context, Result, bail};
use bitvec::prelude::*;
use qdet_core::circuit::Circuit;
use std::fs;
use std::path::Path;

/// Reads and parses a stim circuit file.
pub fn load_circuit_file<P: AsRef<Path>>(path: P) -> Result<Circuit> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read circuit file {}", path.display()))?;
    parse_circuit(&text).with_context(|| format!("Failed to parse circuit file {}", path.display()))
}

/// Writes `circuit` as stim text, replacing any existing file.
pub fn save_circuit_file<P: AsRef<Path>>(path: P, circuit: &Circuit) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, write_circuit(circuit)).with_context(|| format!("Failed to write circuit file {}", path.display()))
}

/// Loads a `.b8` measurement record file.
pub fn load_b8_file<P: AsRef<Path>>(path: P) -> Result<BitVec<u8, Lsb0>> {
    let path = path.as_ref();
    let buffer = fs::read(path).with_context(|| format!("Failed to open .b8 file {}", path.display()))?;
    Ok(BitVec::<u8, Lsb0>::from_vec(buffer))
}

/// Splits packed `.b8` data into one record per shot.
///
/// Fails when the data does not hold a whole number of shots.
pub fn slice_shots(raw_bits: &BitSlice<u8, Lsb0>, bits_per_shot: usize) -> Result<Vec<BitVec<u8, Lsb0>>> {
    let stride_bits = bits_per_shot.div_ceil(8) * 8;
    if stride_bits == 0 {
        return Ok(Vec::new());
    }
    if raw_bits.len() % stride_bits != 0 {
        bail!(
            "record data holds {} bits, not a multiple of the {stride_bits}-bit shot stride",
            raw_bits.len()
        );
    }
    Ok(raw_bits
        .chunks_exact(stride_bits)
        .map(|shot| shot[..bits_per_shot].to_bitvec())
        .collect())
}

/// Parity of each event set over one shot's measurement record.
pub fn detector_parities(detectors: &[Vec<usize>], shot: &BitSlice<u8, Lsb0>) -> BitVec<u8, Lsb0> {
    detectors
        .iter()
        .map(|events| events.iter().fold(false, |acc, &e| acc ^ shot[e]))
        .collect()
}
