//! Detector search over the parity graph.
//!
//! Each boundary is split into connected components of generators. Within a
//! component the left kernel of the constraint matrix holds every combination
//! that cancels, and a minimum-weight basis of that kernel is built greedily:
//! candidates come from row reduction, light ones are accepted directly and
//! heavier ones are certified by the SAT oracle. Accepted combinations from
//! all boundaries are then merged into one independent set of detectors.

use crate::DetectorError;
use crate::dsu::UnionFind;
use crate::fragment::MeasurementEvent;
use crate::gf2::{Gf2Basis, Gf2Vec, left_kernel, reduced_echelon, right_kernel};
use crate::parity_graph::{BoundarySystem, Generator, GeneratorSource, ParityGraph};
use crate::pauli_string::PauliString;
use crate::sat::{Cnf, SatBackend, SatBudget, SatOracle, SatOutcome};
use qdet_common::pauli::Pauli;
use std::cmp::Ordering;
use std::time::Duration;
use tracing::{debug, debug_span, trace, warn};

/// Tuning knobs of the search.
#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    /// Candidates combining more flows than this are checked with the oracle.
    pub certify_above_weight: usize,
    pub budget: SatBudget,
}

/// A deterministic parity of measurement events.
///
/// `parity` is the value the XOR of the recorded events takes in every
/// noiseless shot, inverted targets included. A `DETECTOR` instruction
/// compares against the noiseless reference sample, so it is written the
/// same way whatever the parity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detector {
    /// Sorted measurement-event ordinals.
    pub events: Vec<usize>,
    pub parity: bool,
    /// Qubit of the representative flow, used for the coordinate tag.
    pub tag_qubit: u32,
    /// Fragment holding the latest event.
    pub time: usize,
    /// Number of flows combined to prove the detector.
    pub weight: usize,
    pub boundary: usize,
}

/// A boundary whose certification was cut short by the oracle budget.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchWarning {
    pub boundary: usize,
    pub queries: usize,
    pub elapsed: Duration,
    /// Event sets kept from row reduction without a minimality proof.
    pub unresolved: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub detectors: Vec<Detector>,
    pub warnings: Vec<SearchWarning>,
    pub sat_queries: usize,
}

#[derive(Debug, Clone)]
struct Candidate {
    boundary: usize,
    weight: usize,
    events: Vec<usize>,
    parity: bool,
    tag_qubit: u32,
}

impl Candidate {
    fn canonical_cmp(&self, other: &Candidate) -> Ordering {
        self.weight
            .cmp(&other.weight)
            .then_with(|| self.events.len().cmp(&other.events.len()))
            .then_with(|| self.events.cmp(&other.events))
            .then_with(|| self.boundary.cmp(&other.boundary))
    }
}

#[derive(Default)]
struct ComponentResult {
    combinations: Vec<Gf2Vec>,
    unresolved: Vec<Gf2Vec>,
    timeout: Option<(usize, Duration)>,
}

pub struct DetectorSearch<'a> {
    settings: SearchSettings,
    backend: &'a mut dyn SatBackend,
}

impl<'a> DetectorSearch<'a> {
    pub fn new(settings: SearchSettings, backend: &'a mut dyn SatBackend) -> Self {
        Self { settings, backend }
    }

    /// Searches every boundary and merges the results.
    ///
    /// # Arguments
    ///
    /// * `graph` - Boundary systems of the circuit
    /// * `events` - All measurement events, indexed by ordinal
    /// * `existing` - Event sets of detectors already present in the circuit;
    ///   anything they span is not emitted again
    ///
    /// # Returns
    ///
    /// Detectors in order of their latest event, and one warning per boundary
    /// whose certification ran out of budget.
    pub fn run(
        &mut self,
        graph: &ParityGraph,
        events: &[MeasurementEvent],
        existing: &[Vec<usize>],
    ) -> Result<SearchOutcome, DetectorError> {
        let mut candidates = Vec::new();
        let mut outcome = SearchOutcome::default();

        for boundary in &graph.boundaries {
            let _span = debug_span!("boundary", index = boundary.index).entered();
            let mut oracle = SatOracle::new(&mut *self.backend, self.settings.budget);
            let mut unresolved = Vec::new();
            let mut timeout = None;

            for component in components(boundary) {
                let result = search_component(self.settings, boundary, &component, &mut oracle)?;
                for combination in &result.combinations {
                    verify(boundary, &component, combination)?;
                    candidates.push(candidate(boundary, &component, combination, events)?);
                }
                unresolved.extend(result.unresolved.iter().map(|c| payload(boundary, &component, c)));
                timeout = timeout.or(result.timeout);
            }

            outcome.sat_queries += oracle.queries();
            if let Some((queries, elapsed)) = timeout {
                warn!(
                    boundary = boundary.index,
                    queries,
                    ?elapsed,
                    unresolved = unresolved.len(),
                    "sat budget exhausted, keeping uncertified detectors"
                );
                outcome.warnings.push(SearchWarning {
                    boundary: boundary.index,
                    queries,
                    elapsed,
                    unresolved,
                });
            }
        }

        candidates.sort_by(Candidate::canonical_cmp);
        let mut span = Gf2Basis::new(events.len());
        for set in existing {
            span.insert(Gf2Vec::from_ones(events.len(), set.iter().copied()));
        }
        for c in candidates {
            if c.events.is_empty() {
                continue;
            }
            if !span.insert(Gf2Vec::from_ones(events.len(), c.events.iter().copied())) {
                trace!(boundary = c.boundary, events = ?c.events, "dropping dependent candidate");
                continue;
            }
            let latest = c.events[c.events.len() - 1];
            outcome.detectors.push(Detector {
                time: events[latest].fragment,
                events: c.events,
                parity: c.parity,
                tag_qubit: c.tag_qubit,
                weight: c.weight,
                boundary: c.boundary,
            });
        }
        outcome
            .detectors
            .sort_by(|a, b| a.events.last().cmp(&b.events.last()).then_with(|| a.events.cmp(&b.events)));
        Ok(outcome)
    }
}

/// Generator indices grouped by shared constraint columns.
fn components(boundary: &BoundarySystem) -> Vec<Vec<usize>> {
    let generators = &boundary.generators;
    let width = generators.first().map_or(0, |g| g.constraint.len());
    let mut uf = UnionFind::new(generators.len());
    let mut owner: Vec<Option<usize>> = vec![None; width];
    for (g, generator) in generators.iter().enumerate() {
        for column in generator.constraint.ones() {
            match owner[column] {
                Some(first) => {
                    uf.union(first, g);
                }
                None => owner[column] = Some(g),
            }
        }
    }
    uf.components()
}

fn search_component(
    settings: SearchSettings,
    boundary: &BoundarySystem,
    component: &[usize],
    oracle: &mut SatOracle<'_>,
) -> Result<ComponentResult, DetectorError> {
    let rows: Vec<Gf2Vec> = component
        .iter()
        .map(|&g| boundary.generators[g].constraint.clone())
        .collect();
    let kernel = left_kernel(&rows);
    let mut result = ComponentResult::default();
    if kernel.is_empty() {
        return Ok(result);
    }

    let mut rows = reduced_echelon(&kernel);
    reduce_weights(&mut rows);
    let mut keyed: Vec<(Vec<usize>, Gf2Vec)> = rows
        .into_iter()
        .map(|row| (payload(boundary, component, &row), row))
        .collect();
    keyed.sort_by(|(pa, a), (pb, b)| {
        a.weight()
            .cmp(&b.weight())
            .then_with(|| pa.len().cmp(&pb.len()))
            .then_with(|| pa.cmp(pb))
            .then_with(|| a.canonical_cmp(b))
    });
    let basis: Vec<Gf2Vec> = keyed.into_iter().map(|(_, row)| row).collect();
    debug!(
        generators = component.len(),
        kernel = basis.len(),
        "component kernel"
    );

    let mut span = Gf2Basis::new(component.len());
    let mut floor = 1;
    while result.combinations.len() < basis.len() {
        let Some(candidate) = basis.iter().find(|c| !span.contains(c)) else {
            break;
        };
        let mut chosen = candidate.clone();
        if chosen.weight() > settings.certify_above_weight {
            if result.timeout.is_some() {
                result.unresolved.push(chosen.clone());
            } else {
                match lighter_combination(&basis, &result.combinations, floor, chosen.weight(), oracle) {
                    Ok(Some(lighter)) => {
                        trace!(from = chosen.weight(), to = lighter.weight(), "oracle found lighter combination");
                        chosen = lighter;
                    }
                    Ok(None) => {}
                    Err(DetectorError::SearchTimeout { queries, elapsed }) => {
                        result.timeout = Some((queries, elapsed));
                        result.unresolved.push(chosen.clone());
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        floor = floor.max(chosen.weight());
        span.insert(chosen.clone());
        result.combinations.push(chosen);
    }
    Ok(result)
}

/// Replaces rows by lighter sums of row pairs until no pair helps.
fn reduce_weights(rows: &mut [Gf2Vec]) {
    let mut improved = true;
    while improved {
        improved = false;
        for i in 0..rows.len() {
            for j in 0..rows.len() {
                if i == j {
                    continue;
                }
                let sum = rows[i].xor(&rows[j]);
                if sum.weight() < rows[i].weight() {
                    rows[i] = sum;
                    improved = true;
                }
            }
        }
    }
}

/// Asks the oracle for the lightest kernel vector independent of `accepted`
/// that is strictly lighter than `weight`.
///
/// Vectors lighter than `floor` are already known to lie in the span of
/// `accepted`, so the bound never drops below it.
fn lighter_combination(
    kernel_basis: &[Gf2Vec],
    accepted: &[Gf2Vec],
    floor: usize,
    weight: usize,
    oracle: &mut SatOracle<'_>,
) -> Result<Option<Gf2Vec>, DetectorError> {
    let width = kernel_basis.first().map_or(0, Gf2Vec::len);
    let annihilator = right_kernel(accepted, width);
    let mut best = None;
    let mut bound = weight.saturating_sub(1);
    while bound >= floor {
        let (cnf, bits) = lighter_formula(kernel_basis, &annihilator, bound);
        match oracle.query(&cnf)? {
            outcome @ SatOutcome::Satisfiable(_) => {
                let witness =
                    Gf2Vec::from_ones(width, (0..width).filter(|&g| outcome.value(bits[g]) == Some(true)));
                bound = witness.weight().saturating_sub(1);
                best = Some(witness);
            }
            SatOutcome::Unsatisfiable => break,
        }
    }
    Ok(best)
}

/// CNF for "some combination of the kernel basis has at most `bound` flows
/// and is not annihilated by every vector of `annihilator`".
fn lighter_formula(kernel_basis: &[Gf2Vec], annihilator: &[Gf2Vec], bound: usize) -> (Cnf, Vec<i32>) {
    let width = kernel_basis.first().map_or(0, Gf2Vec::len);
    let mut cnf = Cnf::new();
    let coefficients: Vec<i32> = kernel_basis.iter().map(|_| cnf.new_var()).collect();
    let bits: Vec<i32> = (0..width).map(|_| cnf.new_var()).collect();

    for (g, &bit) in bits.iter().enumerate() {
        let terms: Vec<i32> = kernel_basis
            .iter()
            .zip(&coefficients)
            .filter(|(row, _)| row.get(g))
            .map(|(_, &a)| a)
            .collect();
        cnf.add_xor(&terms, bit);
    }
    cnf.add_at_most(&bits, bound);

    let mut independent = Vec::with_capacity(annihilator.len());
    for y in annihilator {
        let parity = cnf.new_var();
        let terms: Vec<i32> = y.ones().map(|g| bits[g]).collect();
        cnf.add_xor(&terms, parity);
        independent.push(parity);
    }
    cnf.add_clause(&independent);
    (cnf, bits)
}

/// Checks that a combination cancels on every constraint column.
fn verify(boundary: &BoundarySystem, component: &[usize], combination: &Gf2Vec) -> Result<(), DetectorError> {
    let width = boundary.generators[component[0]].constraint.len();
    let mut residue = Gf2Vec::zeros(width);
    for local in combination.ones() {
        residue.xor_assign(&boundary.generators[component[local]].constraint);
    }
    if residue.is_zero() {
        return Ok(());
    }
    let flows: Vec<String> = combination
        .ones()
        .map(|local| describe(&boundary.generators[component[local]]))
        .collect();
    Err(DetectorError::InconsistentFlow {
        fragment: boundary.index,
        flow: flows.join(" * "),
        reason: format!(
            "combination leaves residue on columns {:?}",
            residue.ones().collect::<Vec<_>>()
        ),
    })
}

fn describe(generator: &Generator) -> String {
    match generator.source {
        GeneratorSource::Forward { fragment, flow } => format!("forward {fragment}:{flow}"),
        GeneratorSource::Measurement { event } => format!("measurement {event}"),
        GeneratorSource::Backward { fragment, flow } => format!("backward {fragment}:{flow}"),
    }
}

/// Symmetric difference of the events of the combined generators.
fn payload(boundary: &BoundarySystem, component: &[usize], combination: &Gf2Vec) -> Vec<usize> {
    let mut events: Vec<usize> = Vec::new();
    for local in combination.ones() {
        events.extend(&boundary.generators[component[local]].events);
    }
    events.sort_unstable();
    let mut out: Vec<usize> = Vec::with_capacity(events.len());
    for e in events {
        if out.last() == Some(&e) {
            out.pop();
        } else {
            out.push(e);
        }
    }
    out
}

/// Value the combined events take in every noiseless shot.
///
/// Forward and backward operators are multiplied in full and only then
/// stripped of the qubits their collapsing operations fix, so the sign of the
/// product survives. Together with the bare measurement operators they must
/// cancel to `+I` or `-I`; `-I` means odd parity. Inverted records flip it.
fn parity(
    boundary: &BoundarySystem,
    component: &[usize],
    combination: &Gf2Vec,
    payload: &[usize],
    events: &[MeasurementEvent],
) -> Result<bool, DetectorError> {
    let num_qubits = boundary.generators[component[0]].operator.num_qubits();
    let mut forward = PauliString::identity(num_qubits);
    let mut bare = PauliString::identity(num_qubits);
    let mut backward = PauliString::identity(num_qubits);
    for local in combination.ones() {
        let generator = &boundary.generators[component[local]];
        match generator.source {
            GeneratorSource::Forward { .. } => forward.multiply_assign(&generator.operator),
            GeneratorSource::Measurement { .. } => bare.multiply_assign(&generator.operator),
            GeneratorSource::Backward { .. } => backward.multiply_assign(&generator.operator),
        }
    }
    for &q in &boundary.measured_qubits {
        forward.set(q as usize, Pauli::I);
    }
    for &q in &boundary.reset_qubits {
        backward.set(q as usize, Pauli::I);
    }
    forward.multiply_assign(&bare);
    forward.multiply_assign(&backward);
    if !forward.is_identity() || !forward.is_hermitian() {
        let flows: Vec<String> = combination
            .ones()
            .map(|local| describe(&boundary.generators[component[local]]))
            .collect();
        return Err(DetectorError::InconsistentFlow {
            fragment: boundary.index,
            flow: flows.join(" * "),
            reason: format!("combined operator {forward} is not a signed identity"),
        });
    }
    let inverted = payload.iter().filter(|&&e| events[e].inverted).count();
    Ok(forward.is_negative() ^ (inverted % 2 == 1))
}

fn candidate(
    boundary: &BoundarySystem,
    component: &[usize],
    combination: &Gf2Vec,
    events: &[MeasurementEvent],
) -> Result<Candidate, DetectorError> {
    let payload = payload(boundary, component, combination);
    let parity = parity(boundary, component, combination, &payload, events)?;
    let tag_qubit = match payload.last() {
        Some(&latest) => {
            let qubit = events[latest].qubit;
            combination
                .ones()
                .map(|local| &boundary.generators[component[local]])
                .filter(|g| g.events.contains(&latest))
                .min_by_key(|g| g.tag_qubit != qubit)
                .map_or(qubit, |g| g.tag_qubit)
        }
        None => 0,
    };
    Ok(Candidate {
        boundary: boundary.index,
        weight: combination.weight(),
        events: payload,
        parity,
        tag_qubit,
    })
}
