//! End-to-end detector annotation.
//!
//! Unrolls `REPEAT` blocks, runs the splitter, propagates every fragment (the
//! only parallel stage), joins the flows, builds the parity graph, searches it
//! and rewrites the circuit with its loops intact. Pre-existing `DETECTOR` annotations seed the search so that a
//! second run over annotated output adds nothing.

use crate::DetectorError;
use crate::annotator::{annotate, existing_detectors};
use crate::circuit::Circuit;
use crate::flow::propagate_all;
use crate::fragment::split_into_fragments;
use crate::parity_graph::ParityGraph;
use crate::sat::{SatBackend, SatBudget, VarisatBackend};
use crate::search::{Detector, DetectorSearch, SearchSettings, SearchWarning};
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span};

/// Options for one annotation run.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Propagate fragments on the rayon pool.
    pub parallel: bool,
    /// Treat the first gate on an untouched qubit as a `Z` reset.
    pub implicit_zero_init: bool,
    /// Append the fragment index as the last detector coordinate.
    pub append_time_coordinate: bool,
    /// Combinations of more flows than this need an oracle certificate.
    pub certify_above_weight: usize,
    /// Oracle queries allowed per boundary.
    pub sat_query_budget: usize,
    /// Oracle wall-clock time allowed per boundary; unlimited when `None`.
    pub sat_time_budget: Option<Duration>,
    /// Largest unrolled circuit accepted, in instructions.
    pub max_flat_instructions: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            implicit_zero_init: true,
            append_time_coordinate: true,
            certify_above_weight: 2,
            sat_query_budget: 256,
            sat_time_budget: None,
            max_flat_instructions: 1 << 24,
        }
    }
}

impl DetectorConfig {
    fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            certify_above_weight: self.certify_above_weight,
            budget: SatBudget {
                max_queries: self.sat_query_budget,
                max_time: self.sat_time_budget,
            },
        }
    }
}

/// Result of [`annotate_detectors`].
#[derive(Debug, Clone)]
pub struct AnnotationReport {
    /// Input circuit with the new `DETECTOR` instructions inserted.
    pub circuit: Circuit,
    /// Newly found detectors, in insertion order, with the parity each one
    /// takes in a noiseless shot.
    pub detectors: Vec<Detector>,
    pub warnings: Vec<SearchWarning>,
    pub fragments: usize,
    pub sat_queries: usize,
    pub elapsed: Duration,
}

/// Finds the detectors of `circuit` and returns it annotated.
///
/// Uses [`VarisatBackend`] for certification; see
/// [`annotate_detectors_with`] to supply another back end.
pub fn annotate_detectors(circuit: &Circuit, config: &DetectorConfig) -> Result<AnnotationReport, DetectorError> {
    annotate_detectors_with(circuit, config, &mut VarisatBackend)
}

pub fn annotate_detectors_with(
    circuit: &Circuit,
    config: &DetectorConfig,
    backend: &mut dyn SatBackend,
) -> Result<AnnotationReport, DetectorError> {
    let _span = info_span!("annotate", instructions = circuit.len()).entered();
    let started = Instant::now();

    let flat = circuit.flattened(config.max_flat_instructions)?;
    let existing = existing_detectors(&flat)?;
    let split = split_into_fragments(&flat, config.implicit_zero_init)?;
    debug!(
        unrolled = flat.len(),
        fragments = split.fragments.len(),
        measurements = split.events.len(),
        qubits = split.num_qubits,
        "split circuit"
    );

    let flows = propagate_all(&split.fragments, split.num_qubits, config.parallel)?;
    let graph = ParityGraph::build(&split, &flows);
    debug!(
        boundaries = graph.boundaries.len(),
        generators = graph.num_generators(),
        "built parity graph"
    );

    let outcome = DetectorSearch::new(config.search_settings(), backend).run(&graph, &split.events, &existing)?;
    let annotated = annotate(circuit, &split.events, &outcome.detectors, config.append_time_coordinate);
    let elapsed = started.elapsed();

    info!(
        detectors = outcome.detectors.len(),
        existing = existing.len(),
        warnings = outcome.warnings.len(),
        sat_queries = outcome.sat_queries,
        ?elapsed,
        "annotated circuit"
    );

    Ok(AnnotationReport {
        circuit: annotated,
        detectors: outcome.detectors,
        warnings: outcome.warnings,
        fragments: split.fragments.len(),
        sat_queries: outcome.sat_queries,
        elapsed,
    })
}
