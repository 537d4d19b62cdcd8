//! Text and file I/O for detector annotation.
//!
//! Reads and writes circuits in the stim text format and loads sampled
//! measurement records so that annotated detectors can be checked against
//! real or simulated shots.

/// Parser and writer for stim circuit text.
///
/// Builds the flat [`qdet_core::circuit::Circuit`] model, unrolling
/// `REPEAT` blocks, and renders it back in canonical form.
pub mod parser;

/// File loading utilities.
///
/// Circuit files with path context on failure, plus `.b8` measurement
/// records split into per-shot bit vectors.
pub mod loader;

pub use loader::{load_circuit_file, save_circuit_file};
pub use parser::{parse_circuit, write_circuit};
