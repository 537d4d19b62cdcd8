#![allow(dead_code)]

use qdet_common::gates::{GateClass, GateKind};
use qdet_common::pauli::Basis;
use qdet_core::DetectorConfig;
use qdet_core::annotator::existing_detectors;
use qdet_core::circuit::{Circuit, Instruction, Target};
use qdet_core::search::Detector;
use rand::prelude::*;

/// Default configuration with a query budget no test circuit reaches.
pub fn config() -> DetectorConfig {
    DetectorConfig {
        sat_query_budget: 10_000,
        ..DetectorConfig::default()
    }
}

/// Z-basis repetition-code memory: data on even qubits, ancillas on odd ones.
pub fn repetition_code(distance: u32, rounds: u32) -> Circuit {
    let num_qubits = 2 * distance - 1;
    let data: Vec<u32> = (0..num_qubits).step_by(2).collect();
    let ancillas: Vec<u32> = (1..num_qubits).step_by(2).collect();
    let mut c = Circuit::new();
    for q in 0..num_qubits {
        c.qubit_coords(q, &[q as f64, 0.0]);
    }
    c.append(GateKind::R, &data).tick();
    for _ in 0..rounds {
        c.append(GateKind::R, &ancillas).tick();
        let left: Vec<u32> = ancillas.iter().flat_map(|&a| [a - 1, a]).collect();
        let right: Vec<u32> = ancillas.iter().flat_map(|&a| [a + 1, a]).collect();
        c.append(GateKind::CX, &left).tick();
        c.append(GateKind::CX, &right).tick();
        c.append(GateKind::M, &ancillas).tick();
    }
    c.append(GateKind::M, &data);
    c
}

/// An ancilla (qubit 0) entangled with four data qubits and measured once.
pub fn cycle_example() -> Circuit {
    let mut c = Circuit::new();
    c.qubit_coords(0, &[1.0, 1.0])
        .qubit_coords(1, &[0.0, 0.0])
        .qubit_coords(2, &[2.0, 0.0])
        .qubit_coords(3, &[0.0, 2.0])
        .qubit_coords(4, &[2.0, 2.0]);
    c.append(GateKind::R, &[0]).tick();
    for d in 1..=4 {
        c.append(GateKind::CX, &[d, 0]).tick();
    }
    c.append(GateKind::M, &[0]);
    c
}

const SINGLE: [GateKind; 13] = [
    GateKind::I,
    GateKind::X,
    GateKind::Y,
    GateKind::Z,
    GateKind::H,
    GateKind::HXY,
    GateKind::HYZ,
    GateKind::S,
    GateKind::SDag,
    GateKind::SqrtX,
    GateKind::SqrtXDag,
    GateKind::SqrtY,
    GateKind::SqrtYDag,
];
const PAIR: [GateKind; 4] = [GateKind::CX, GateKind::CY, GateKind::CZ, GateKind::Swap];
const RESETS: [GateKind; 3] = [GateKind::R, GateKind::RX, GateKind::RY];
const MEASUREMENTS: [GateKind; 3] = [GateKind::M, GateKind::MX, GateKind::MY];

/// Random well-formed circuit: rounds of resets, Clifford layers and
/// measurements, ending with every live qubit measured.
pub fn random_circuit(seed: u64, num_qubits: u32, rounds: usize) -> Circuit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut c = Circuit::new();
    for q in 0..num_qubits {
        c.qubit_coords(q, &[q as f64]);
    }
    let mut live: Vec<u32> = Vec::new();
    let mut dead: Vec<u32> = (0..num_qubits).collect();
    for round in 0..=rounds {
        let revived: Vec<u32> = dead
            .iter()
            .copied()
            .filter(|_| round == 0 || rng.gen_bool(0.7))
            .collect();
        if !revived.is_empty() {
            for &q in &revived {
                c.append(RESETS[rng.gen_range(0..RESETS.len())], &[q]);
            }
            c.tick();
            dead.retain(|q| !revived.contains(q));
            live.extend(revived);
            live.sort_unstable();
        }
        if live.is_empty() {
            continue;
        }
        for _ in 0..rng.gen_range(1..=3) {
            if live.len() >= 2 && rng.gen_bool(0.5) {
                let a = rng.gen_range(0..live.len());
                let b = (a + rng.gen_range(1..live.len())) % live.len();
                c.append(PAIR[rng.gen_range(0..PAIR.len())], &[live[a], live[b]]);
            } else {
                let q = live[rng.gen_range(0..live.len())];
                c.append(SINGLE[rng.gen_range(0..SINGLE.len())], &[q]);
            }
            c.tick();
        }
        let measured: Vec<u32> = if round == rounds {
            live.clone()
        } else {
            let subset: Vec<u32> = live.iter().copied().filter(|_| rng.gen_bool(0.5)).collect();
            if subset.is_empty() {
                vec![live[rng.gen_range(0..live.len())]]
            } else {
                subset
            }
        };
        for &q in &measured {
            c.append(MEASUREMENTS[rng.gen_range(0..MEASUREMENTS.len())], &[q]);
        }
        c.tick();
        live.retain(|q| !measured.contains(q));
        dead.extend(measured);
        dead.sort_unstable();
    }
    c
}

#[derive(Clone, Copy, Debug)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    const ZERO: Complex = Complex { re: 0.0, im: 0.0 };

    const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    fn mul(self, o: Complex) -> Complex {
        Complex::new(self.re * o.re - self.im * o.im, self.re * o.im + self.im * o.re)
    }

    fn add(self, o: Complex) -> Complex {
        Complex::new(self.re + o.re, self.im + o.im)
    }

    fn norm_sqr(self) -> f64 {
        self.re * self.re + self.im * self.im
    }
}

type Matrix = [[Complex; 2]; 2];

fn matrix(kind: GateKind) -> Matrix {
    let s = std::f64::consts::FRAC_1_SQRT_2;
    let c = Complex::new;
    let (o, l, i) = (c(0.0, 0.0), c(1.0, 0.0), c(0.0, 1.0));
    match kind {
        GateKind::X => [[o, l], [l, o]],
        GateKind::Y => [[o, c(0.0, -1.0)], [i, o]],
        GateKind::Z => [[l, o], [o, c(-1.0, 0.0)]],
        GateKind::H => [[c(s, 0.0), c(s, 0.0)], [c(s, 0.0), c(-s, 0.0)]],
        GateKind::HXY => [[o, c(s, -s)], [c(s, s), o]],
        GateKind::HYZ => [[c(s, 0.0), c(0.0, -s)], [c(0.0, s), c(-s, 0.0)]],
        GateKind::S => [[l, o], [o, i]],
        GateKind::SDag => [[l, o], [o, c(0.0, -1.0)]],
        GateKind::SqrtX => [[c(s, 0.0), c(0.0, -s)], [c(0.0, -s), c(s, 0.0)]],
        GateKind::SqrtXDag => [[c(s, 0.0), c(0.0, s)], [c(0.0, s), c(s, 0.0)]],
        GateKind::SqrtY => [[c(s, 0.0), c(-s, 0.0)], [c(s, 0.0), c(s, 0.0)]],
        GateKind::SqrtYDag => [[c(s, 0.0), c(s, 0.0)], [c(-s, 0.0), c(s, 0.0)]],
        _ => [[l, o], [o, l]],
    }
}

/// Dense state-vector simulator for a handful of qubits.
pub struct StateVector {
    amps: Vec<Complex>,
}

impl StateVector {
    pub fn new(num_qubits: usize) -> Self {
        let mut amps = vec![Complex::ZERO; 1 << num_qubits];
        amps[0] = Complex::new(1.0, 0.0);
        Self { amps }
    }

    fn apply_matrix(&mut self, q: usize, m: Matrix) {
        let bit = 1 << q;
        for i in 0..self.amps.len() {
            if i & bit == 0 {
                let (a, b) = (self.amps[i], self.amps[i | bit]);
                self.amps[i] = m[0][0].mul(a).add(m[0][1].mul(b));
                self.amps[i | bit] = m[1][0].mul(a).add(m[1][1].mul(b));
            }
        }
    }

    fn apply_pair(&mut self, kind: GateKind, a: usize, b: usize) {
        let (ba, bb) = (1 << a, 1 << b);
        for i in 0..self.amps.len() {
            match kind {
                GateKind::CX if i & ba != 0 && i & bb == 0 => self.amps.swap(i, i | bb),
                GateKind::CY if i & ba != 0 && i & bb == 0 => {
                    let (x, y) = (self.amps[i], self.amps[i | bb]);
                    self.amps[i] = Complex::new(0.0, -1.0).mul(y);
                    self.amps[i | bb] = Complex::new(0.0, 1.0).mul(x);
                }
                GateKind::CZ if i & ba != 0 && i & bb != 0 => {
                    self.amps[i] = Complex::new(-1.0, 0.0).mul(self.amps[i]);
                }
                GateKind::Swap if i & ba != 0 && i & bb == 0 => self.amps.swap(i, i ^ ba ^ bb),
                _ => {}
            }
        }
    }

    fn measure_z(&mut self, q: usize, rng: &mut StdRng) -> bool {
        let bit = 1 << q;
        let p1: f64 = (0..self.amps.len())
            .filter(|i| i & bit != 0)
            .map(|i| self.amps[i].norm_sqr())
            .sum();
        let outcome = if p1 < 1e-9 {
            false
        } else if p1 > 1.0 - 1e-9 {
            true
        } else {
            rng.gen_bool(p1)
        };
        let p = if outcome { p1 } else { 1.0 - p1 };
        let scale = Complex::new(1.0 / p.sqrt(), 0.0);
        for i in 0..self.amps.len() {
            self.amps[i] = if (i & bit != 0) == outcome {
                scale.mul(self.amps[i])
            } else {
                Complex::ZERO
            };
        }
        outcome
    }

    pub fn measure(&mut self, q: usize, basis: Basis, rng: &mut StdRng) -> bool {
        match basis {
            Basis::Z => self.measure_z(q, rng),
            Basis::X => {
                self.apply_matrix(q, matrix(GateKind::H));
                let m = self.measure_z(q, rng);
                self.apply_matrix(q, matrix(GateKind::H));
                m
            }
            Basis::Y => {
                self.apply_matrix(q, matrix(GateKind::SDag));
                self.apply_matrix(q, matrix(GateKind::H));
                let m = self.measure_z(q, rng);
                self.apply_matrix(q, matrix(GateKind::H));
                self.apply_matrix(q, matrix(GateKind::S));
                m
            }
        }
    }

    pub fn reset(&mut self, q: usize, basis: Basis, rng: &mut StdRng) {
        if self.measure_z(q, rng) {
            self.apply_matrix(q, matrix(GateKind::X));
        }
        match basis {
            Basis::Z => {}
            Basis::X => self.apply_matrix(q, matrix(GateKind::H)),
            Basis::Y => {
                self.apply_matrix(q, matrix(GateKind::H));
                self.apply_matrix(q, matrix(GateKind::S));
            }
        }
    }
}

/// One noiseless shot of `circuit`, returning the measurement record with
/// `!q` targets inverted.
pub fn sample(circuit: &Circuit, rng: &mut StdRng) -> Vec<bool> {
    let flat = circuit.flattened(1 << 16).unwrap();
    let mut state = StateVector::new(flat.num_qubits());
    let mut record = Vec::new();
    for instruction in flat.instructions() {
        let Instruction::Operation(op) = instruction else {
            continue;
        };
        let Some(kind) = op.gate else { continue };
        let qubits: Vec<usize> = op.qubits().into_iter().map(|q| q as usize).collect();
        match kind.class() {
            GateClass::Reset(basis) => qubits.iter().for_each(|&q| state.reset(q, basis, rng)),
            GateClass::Measurement(basis) => {
                for target in &op.targets {
                    if let Target::Qubit { index, inverted } = *target {
                        record.push(state.measure(index as usize, basis, rng) ^ inverted);
                    }
                }
            }
            GateClass::SingleQubit => qubits.iter().for_each(|&q| state.apply_matrix(q, matrix(kind))),
            GateClass::TwoQubit => {
                for pair in qubits.chunks_exact(2) {
                    state.apply_pair(kind, pair[0], pair[1]);
                }
            }
            GateClass::MeasureReset(_) | GateClass::Noise => {}
        }
    }
    record
}

/// Panics unless every `DETECTOR` of `annotated` has the same parity in
/// every sampled shot.
pub fn assert_detectors_deterministic(annotated: &Circuit, shots: usize, seed: u64) {
    let detectors = existing_detectors(annotated).unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut reference: Option<Vec<bool>> = None;
    for _ in 0..shots {
        let record = sample(annotated, &mut rng);
        let parities: Vec<bool> = detectors
            .iter()
            .map(|set| set.iter().fold(false, |acc, &e| acc ^ record[e]))
            .collect();
        match &reference {
            None => reference = Some(parities),
            Some(expected) => {
                for (i, (a, b)) in expected.iter().zip(&parities).enumerate() {
                    assert_eq!(a, b, "detector {i} ({:?}) is not deterministic", detectors[i]);
                }
            }
        }
    }
}

/// Panics unless every detector's events XOR to its reported parity in
/// every sampled shot of `circuit`.
pub fn assert_parities_match(circuit: &Circuit, detectors: &[Detector], shots: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..shots {
        let record = sample(circuit, &mut rng);
        for d in detectors {
            let value = d.events.iter().fold(false, |acc, &e| acc ^ record[e]);
            assert_eq!(value, d.parity, "detector {:?} has the wrong parity", d.events);
        }
    }
}
