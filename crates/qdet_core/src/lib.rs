//! Core detector-finding algorithms and data structures.
//!
//! This crate turns a noiseless stabilizer circuit into the set of
//! measurement parities that are deterministic under it, then writes those
//! parities back into the circuit as `DETECTOR` annotations. The pipeline is
//! split into the fragment splitter, the flow propagator, the parity graph
//! builder, the detector search and the annotator; [`pipeline`] wires them
//! together behind a single call.

/// Bit manipulation helpers over packed `u64` words.
///
/// Shared by the Pauli string registers and the GF(2) vectors so that both
/// address individual bits the same way.
pub mod bit_utils;

/// In-memory circuit model.
///
/// A flat, ordered list of instructions with resolved gate kinds, qubit and
/// measurement-record targets, and the annotation instructions the engine
/// reads and writes.
pub mod circuit;

/// Fragment splitter.
///
/// Cuts a circuit into fragments that each end with a single moment of
/// measurements, validating the reset and measurement structure on the way.
pub mod fragment;

/// Stabilizer flow propagation through a fragment.
///
/// Pushes reset generators forward and measurement generators backward
/// through the fragment's Clifford gates, then collapses them at the
/// fragment's measurements or resets.
pub mod flow;

/// Dense GF(2) vectors and the linear algebra built on them.
///
/// Provides incremental basis insertion, left and right kernels, and reduced
/// row-echelon form. Every linear step of the detector search goes through
/// this module.
pub mod gf2;

/// Disjoint set union used to split boundary systems into independent parts.
pub mod dsu;

/// Measurement-parity graph.
///
/// Collects, for each fragment boundary, the generators whose products may
/// cancel there, together with the measurement events each one carries.
pub mod parity_graph;

/// Pauli strings with phase tracking.
pub mod pauli_string;

/// Satisfiability oracle used to certify minimal detector covers.
pub mod sat;

/// Detector search over the parity graph.
///
/// Finds combinations of generators that cancel at a boundary, reduces them
/// to a minimal independent set and merges the results across boundaries.
pub mod search;

/// Rewrites a circuit with the detectors produced by the search.
pub mod annotator;

/// End-to-end entry point and run configuration.
pub mod pipeline;

pub use pipeline::{AnnotationReport, DetectorConfig, annotate_detectors};

use std::time::Duration;

/// Error types returned by the detector-finding pipeline.
///
/// Every variant is fatal except [`DetectorError::SearchTimeout`], which the
/// search downgrades to a warning while keeping the detectors it has already
/// proven.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// The circuit violates a structural rule the splitter relies on.
    ///
    /// Raised for mixed reset and measurement moments, repeated measurements
    /// of one qubit inside a fragment, measurements of qubits that were never
    /// prepared, and malformed target lists.
    #[error("malformed circuit{}{}: {reason} (qubits {qubits:?})", fmt_fragment(.fragment), fmt_ordinal(.ordinal))]
    MalformedCircuit {
        reason: String,
        fragment: Option<usize>,
        ordinal: Option<usize>,
        qubits: Vec<u32>,
    },

    /// The circuit uses an operation the engine has no conjugation rule for.
    #[error("unsupported gate `{name}` at instruction {ordinal} (qubits {qubits:?})")]
    UnsupportedGate {
        name: String,
        ordinal: usize,
        qubits: Vec<u32>,
    },

    /// A flow ended up in a state that cannot come from a Clifford circuit.
    ///
    /// Indicates a corrupted conjugation table or an internal bug rather than
    /// a problem with the input circuit.
    #[error("inconsistent flow in fragment {fragment} ({flow}): {reason}")]
    InconsistentFlow {
        fragment: usize,
        flow: String,
        reason: String,
    },

    /// The satisfiability budget ran out before a boundary was certified.
    #[error("detector search budget exhausted after {queries} queries in {elapsed:?}")]
    SearchTimeout { queries: usize, elapsed: Duration },

    /// The satisfiability back end failed outright.
    #[error("sat solver failure: {0}")]
    Solver(String),
}

fn fmt_fragment(fragment: &Option<usize>) -> String {
    fragment.map(|f| format!(" in fragment {f}")).unwrap_or_default()
}

fn fmt_ordinal(ordinal: &Option<usize>) -> String {
    ordinal.map(|o| format!(" at instruction {o}")).unwrap_or_default()
}
