mod common;

use common::{assert_detectors_deterministic, assert_parities_match, config, random_circuit, repetition_code};
use proptest::prelude::*;
use qdet_core::annotator::existing_detectors;
use qdet_core::gf2::{Gf2Basis, Gf2Vec};
use qdet_core::{DetectorConfig, annotate_detectors};

fn independent(sets: &[Vec<usize>], num_events: usize) -> bool {
    let mut basis = Gf2Basis::new(num_events);
    sets.iter().all(|set| basis.insert(Gf2Vec::from_ones(num_events, set.iter().copied())))
}

#[test]
fn second_pass_adds_nothing() {
    let first = annotate_detectors(&repetition_code(3, 3), &config()).unwrap();
    let second = annotate_detectors(&first.circuit, &config()).unwrap();
    assert!(second.detectors.is_empty());
    assert_eq!(second.circuit, first.circuit);
}

#[test]
fn parallel_and_sequential_agree() {
    let circuit = repetition_code(5, 2);
    let sequential = DetectorConfig {
        parallel: false,
        ..config()
    };
    let a = annotate_detectors(&circuit, &config()).unwrap();
    let b = annotate_detectors(&circuit, &sequential).unwrap();
    assert_eq!(a.detectors, b.detectors);
    assert_eq!(a.circuit, b.circuit);
}

#[test]
fn emitted_detectors_are_independent() {
    let circuit = repetition_code(5, 4);
    let report = annotate_detectors(&circuit, &config()).unwrap();
    let sets = existing_detectors(&report.circuit).unwrap();
    assert_eq!(sets.len(), report.detectors.len());
    assert!(independent(&sets, circuit.num_measurements()));
}

#[test]
fn partially_annotated_input_is_completed() {
    let full = annotate_detectors(&repetition_code(3, 2), &config()).unwrap();
    // Keep only the first detector and let the engine fill in the rest.
    let mut seen = 0;
    let partial = qdet_core::circuit::Circuit::from_instructions(
        full.circuit
            .instructions()
            .iter()
            .filter(|i| {
                if matches!(i, qdet_core::circuit::Instruction::Detector { .. }) {
                    seen += 1;
                    seen == 1
                } else {
                    true
                }
            })
            .cloned()
            .collect(),
    );
    let completed = annotate_detectors(&partial, &config()).unwrap();
    assert_eq!(completed.detectors.len(), full.detectors.len() - 1);
    let sets = existing_detectors(&completed.circuit).unwrap();
    assert!(independent(&sets, partial.num_measurements()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn random_circuits_yield_sound_independent_detectors(
        seed in any::<u64>(),
        num_qubits in 2u32..=4,
        rounds in 1usize..=3,
    ) {
        let circuit = random_circuit(seed, num_qubits, rounds);
        let report = annotate_detectors(&circuit, &config()).unwrap();
        prop_assert!(report.warnings.is_empty());

        let sets: Vec<Vec<usize>> = report.detectors.iter().map(|d| d.events.clone()).collect();
        prop_assert!(independent(&sets, circuit.num_measurements()));
        for d in &report.detectors {
            prop_assert!(!d.events.is_empty());
            prop_assert!(d.events.windows(2).all(|w| w[0] < w[1]));
        }
        assert_detectors_deterministic(&report.circuit, 6, seed);
        assert_parities_match(&report.circuit, &report.detectors, 6, seed);

        let sequential = DetectorConfig { parallel: false, ..config() };
        let again = annotate_detectors(&circuit, &sequential).unwrap();
        prop_assert_eq!(&again.detectors, &report.detectors);

        let second = annotate_detectors(&report.circuit, &config()).unwrap();
        prop_assert!(second.detectors.is_empty());
    }
}
