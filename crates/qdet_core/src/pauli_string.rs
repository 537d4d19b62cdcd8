//! Dense Pauli strings with phase tracking.
//!
//! Stores a Pauli operator on `n` qubits as a pair of packed symplectic
//! registers (X and Z bits per qubit) plus a global phase `i^k`. Gates are
//! applied by conjugation using the tables in [`qdet_common::gates`], which
//! keeps the representation exact for Clifford circuits.

use crate::bit_utils::BitPack;
use qdet_common::gates::{ConjugationError, GateKind};
use qdet_common::pauli::Pauli;
use std::fmt;

/// Pauli operator on a fixed register of qubits.
///
/// The phase is held as the exponent of `i` modulo 4. A Hermitian string has
/// an even exponent; conjugation by Clifford gates preserves that, so an odd
/// exponent always signals a broken table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PauliString {
    x_register: Vec<u64>,
    z_register: Vec<u64>,
    phase: u8,
    num_qubits: usize,
}

impl PauliString {
    /// Identity on `num_qubits` qubits.
    pub fn identity(num_qubits: usize) -> Self {
        let words = BitPack::words_for(num_qubits);
        Self {
            x_register: vec![0; words],
            z_register: vec![0; words],
            phase: 0,
            num_qubits,
        }
    }

    /// A single non-identity Pauli on `qubit`, identity elsewhere.
    pub fn single(num_qubits: usize, qubit: usize, pauli: Pauli) -> Self {
        let mut string = Self::identity(num_qubits);
        string.set(qubit, pauli);
        string
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn get(&self, qubit: usize) -> Pauli {
        Pauli::from_bits(
            BitPack::get(&self.x_register, qubit),
            BitPack::get(&self.z_register, qubit),
        )
    }

    /// Overwrites the Pauli on `qubit` without touching the phase.
    pub fn set(&mut self, qubit: usize, pauli: Pauli) {
        BitPack::set(&mut self.x_register, qubit, pauli.x_bit());
        BitPack::set(&mut self.z_register, qubit, pauli.z_bit());
    }

    pub fn x_register(&self) -> &[u64] {
        &self.x_register
    }

    pub fn z_register(&self) -> &[u64] {
        &self.z_register
    }

    /// Exponent of `i` in the global phase, modulo 4.
    pub fn phase(&self) -> u8 {
        self.phase
    }

    pub fn is_hermitian(&self) -> bool {
        self.phase % 2 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.phase == 2
    }

    pub fn is_identity(&self) -> bool {
        self.x_register.iter().all(|&w| w == 0) && self.z_register.iter().all(|&w| w == 0)
    }

    /// Qubits carrying a non-identity Pauli, in increasing order.
    pub fn support(&self) -> impl Iterator<Item = usize> + '_ {
        BitPack::union_ones(&self.x_register, &self.z_register)
    }

    pub fn weight(&self) -> usize {
        self.support().count()
    }

    /// Whether the two strings commute, from the symplectic inner product.
    pub fn commutes_with(&self, other: &PauliString) -> bool {
        let xz = BitPack::and_parity(&self.x_register, &other.z_register);
        let zx = BitPack::and_parity(&self.z_register, &other.x_register);
        xz == zx
    }

    /// Right-multiplies by `rhs`, tracking the phase.
    pub fn multiply_assign(&mut self, rhs: &PauliString) {
        let mut phase = self.phase as u32 + rhs.phase as u32;
        for q in rhs.support() {
            let (product, exponent) = self.get(q).multiply(rhs.get(q));
            phase += exponent as u32;
            self.set(q, product);
        }
        self.phase = (phase % 4) as u8;
    }

    /// Conjugates the string by a single-qubit gate on `qubit`.
    pub fn apply_single(&mut self, gate: GateKind, qubit: usize) -> Result<(), ConjugationError> {
        let current = self.get(qubit);
        if current.is_identity() {
            return Ok(());
        }
        let image = gate.conjugate(current)?;
        self.set(qubit, image.pauli);
        if image.negative {
            self.phase = (self.phase + 2) % 4;
        }
        Ok(())
    }

    /// Conjugates the string by a two-qubit gate on `(first, second)`.
    pub fn apply_pair(&mut self, gate: GateKind, first: usize, second: usize) -> Result<(), ConjugationError> {
        let a = self.get(first);
        let b = self.get(second);
        if a.is_identity() && b.is_identity() {
            return Ok(());
        }
        let image = gate.conjugate_pair(a, b)?;
        self.set(first, image.first);
        self.set(second, image.second);
        if image.negative {
            self.phase = (self.phase + 2) % 4;
        }
        Ok(())
    }
}

impl fmt::Display for PauliString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.phase {
            0 => "+",
            1 => "+i",
            2 => "-",
            _ => "-i",
        };
        f.write_str(sign)?;
        for q in 0..self.num_qubits {
            let c = match self.get(q) {
                Pauli::I => '_',
                other => other.as_char(),
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}
