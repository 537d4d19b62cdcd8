//! Common definitions shared across the detector annotation system.
//!
//! This crate provides the single-qubit Pauli algebra and the closed set of
//! circuit operations understood by the detector finder, together with the
//! static conjugation tables that describe how every supported Clifford gate
//! acts on Pauli operators. Both the core engine and the circuit reader rely
//! on these definitions, so they are kept free of allocation and `std`.

#![no_std]

/// Single-qubit Pauli operators and their multiplication rules.
///
/// Paulis are encoded by their symplectic `(x, z)` bits: `X = (1, 0)`,
/// `Z = (0, 1)` and `Y = (1, 1)`. Products of Hermitian Paulis pick up a
/// power of `i`, which is returned as an exponent modulo 4 so callers can
/// accumulate phases across multi-qubit strings without floating point.
pub mod pauli {
    /// A single-qubit Pauli operator without phase.
    #[repr(u8)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Pauli {
        /// Identity.
        I = 0b00,
        /// Bit flip, symplectic bits `(1, 0)`.
        X = 0b01,
        /// Phase flip, symplectic bits `(0, 1)`.
        Z = 0b10,
        /// `Y = iXZ`, symplectic bits `(1, 1)`.
        Y = 0b11,
    }

    impl Pauli {
        /// Builds a Pauli from its symplectic bits.
        pub const fn from_bits(x: bool, z: bool) -> Self {
            match (x, z) {
                (false, false) => Pauli::I,
                (true, false) => Pauli::X,
                (false, true) => Pauli::Z,
                (true, true) => Pauli::Y,
            }
        }

        /// Returns the X bit of the symplectic representation.
        pub const fn x_bit(self) -> bool {
            (self as u8) & 0b01 != 0
        }

        /// Returns the Z bit of the symplectic representation.
        pub const fn z_bit(self) -> bool {
            (self as u8) & 0b10 != 0
        }

        pub const fn is_identity(self) -> bool {
            matches!(self, Pauli::I)
        }

        /// Checks whether two single-qubit Paulis commute.
        ///
        /// Two Paulis anticommute exactly when both are non-identity and
        /// distinct, which is the symplectic product `x1 z2 + z1 x2` over GF(2).
        pub const fn commutes_with(self, other: Pauli) -> bool {
            let x1 = self.x_bit() as u8;
            let z1 = self.z_bit() as u8;
            let x2 = other.x_bit() as u8;
            let z2 = other.z_bit() as u8;
            (x1 * z2 + z1 * x2) % 2 == 0
        }

        /// Multiplies two Paulis, returning the product and the exponent of `i`.
        ///
        /// The exponent is reduced modulo 4, so `X * Y = iZ` yields `(Z, 1)` and
        /// `Y * X = -iZ` yields `(Z, 3)`.
        pub const fn multiply(self, rhs: Pauli) -> (Pauli, u8) {
            let product = Pauli::from_bits(self.x_bit() ^ rhs.x_bit(), self.z_bit() ^ rhs.z_bit());
            let phase = match (self, rhs) {
                (Pauli::X, Pauli::Y) | (Pauli::Y, Pauli::Z) | (Pauli::Z, Pauli::X) => 1,
                (Pauli::Y, Pauli::X) | (Pauli::Z, Pauli::Y) | (Pauli::X, Pauli::Z) => 3,
                _ => 0,
            };
            (product, phase)
        }

        /// Parses the letters `I`, `X`, `Y`, `Z` (and `_` for identity).
        pub const fn from_char(c: char) -> Option<Self> {
            match c {
                'I' | '_' => Some(Pauli::I),
                'X' => Some(Pauli::X),
                'Y' => Some(Pauli::Y),
                'Z' => Some(Pauli::Z),
                _ => None,
            }
        }

        pub const fn as_char(self) -> char {
            match self {
                Pauli::I => '_',
                Pauli::X => 'X',
                Pauli::Y => 'Y',
                Pauli::Z => 'Z',
            }
        }
    }

    /// A Hermitian single-qubit Pauli with a sign.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SignedPauli {
        pub pauli: Pauli,
        pub negative: bool,
    }

    impl SignedPauli {
        pub const fn plus(pauli: Pauli) -> Self {
            Self {
                pauli,
                negative: false,
            }
        }

        pub const fn minus(pauli: Pauli) -> Self {
            Self {
                pauli,
                negative: true,
            }
        }
    }

    /// Measurement or reset basis of a collapsing operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Basis {
        X,
        Y,
        Z,
    }

    impl Basis {
        /// The Pauli whose eigenstates the basis refers to.
        pub const fn pauli(self) -> Pauli {
            match self {
                Basis::X => Pauli::X,
                Basis::Y => Pauli::Y,
                Basis::Z => Pauli::Z,
            }
        }

        /// Splits a Pauli into its component along this basis and the remainder.
        ///
        /// Every single-qubit Pauli decomposes uniquely as `basis^a * C^b` where
        /// `C` is a fixed Pauli anticommuting with the basis. The first flag is
        /// `a` (the part a collapsing operation in this basis absorbs) and the
        /// second is `b` (the part that anticommutes with it). Both coefficients
        /// are linear in the symplectic bits, which is what lets the detector
        /// search treat collapse as a GF(2) projection.
        pub const fn split(self, p: Pauli) -> (bool, bool) {
            let x = p.x_bit();
            let z = p.z_bit();
            match self {
                Basis::Z => (z, x),
                Basis::X => (x, z),
                Basis::Y => (x, x ^ z),
            }
        }
    }
}

/// Closed set of circuit operations and their Pauli conjugation tables.
///
/// Every operation the detector finder accepts is listed in [`GateKind`].
/// Unitary gates carry a static table giving the image of each generator
/// (`X` and `Z` per qubit) under conjugation `U P U†`. The image of any other
/// Pauli is derived from these by multiplication, so a single table entry is
/// the only place a conjugation rule is written down. Operations that are not
/// listed here are rejected by the engine rather than skipped.
pub mod gates {
    use super::pauli::{Basis, Pauli, SignedPauli};

    /// Coarse classification used by the fragment splitter and propagator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum GateClass {
        /// Prepares a qubit in the +1 eigenstate of the basis.
        Reset(Basis),
        /// Measures a qubit in the basis.
        Measurement(Basis),
        /// Combined measure-then-reset; not accepted by the splitter.
        MeasureReset(Basis),
        /// Single-qubit Clifford unitary.
        SingleQubit,
        /// Two-qubit Clifford unitary applied to target pairs.
        TwoQubit,
        /// Noise channel; has no effect on noiseless flows.
        Noise,
    }

    /// Image of a two-qubit generator: Paulis on both targets and a sign.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PairImage {
        pub first: Pauli,
        pub second: Pauli,
        pub negative: bool,
    }

    const fn pair(first: Pauli, second: Pauli) -> PairImage {
        PairImage {
            first,
            second,
            negative: false,
        }
    }

    /// Reason a conjugation could not be computed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ConjugationError {
        /// The operation is not a unitary of the requested arity.
        NotApplicable,
        /// Composing table entries produced an imaginary phase.
        NonHermitian,
    }

    /// Enumerated operation kinds understood by the detector finder.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum GateKind {
        R,
        RX,
        RY,
        M,
        MX,
        MY,
        MR,
        MRX,
        MRY,
        I,
        X,
        Y,
        Z,
        H,
        HXY,
        HYZ,
        S,
        SDag,
        SqrtX,
        SqrtXDag,
        SqrtY,
        SqrtYDag,
        CX,
        CY,
        CZ,
        Swap,
        XError,
        YError,
        ZError,
        Depolarize1,
        Depolarize2,
        PauliChannel1,
        PauliChannel2,
    }

    impl GateKind {
        /// All operation kinds, in declaration order.
        pub const ALL: [GateKind; 33] = [
            GateKind::R,
            GateKind::RX,
            GateKind::RY,
            GateKind::M,
            GateKind::MX,
            GateKind::MY,
            GateKind::MR,
            GateKind::MRX,
            GateKind::MRY,
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
            GateKind::CX,
            GateKind::CY,
            GateKind::CZ,
            GateKind::Swap,
            GateKind::XError,
            GateKind::YError,
            GateKind::ZError,
            GateKind::Depolarize1,
            GateKind::Depolarize2,
            GateKind::PauliChannel1,
            GateKind::PauliChannel2,
        ];

        /// Resolves a stim instruction name, including its common aliases.
        ///
        /// Matching is case-insensitive, as in the stim text format.
        pub fn from_name(name: &str) -> Option<Self> {
            const ALIASES: [(&str, GateKind); 10] = [
                ("RZ", GateKind::R),
                ("MZ", GateKind::M),
                ("MRZ", GateKind::MR),
                ("H_XZ", GateKind::H),
                ("SQRT_Z", GateKind::S),
                ("SQRT_Z_DAG", GateKind::SDag),
                ("CNOT", GateKind::CX),
                ("ZCX", GateKind::CX),
                ("ZCY", GateKind::CY),
                ("ZCZ", GateKind::CZ),
            ];
            if let Some(kind) = Self::ALL
                .iter()
                .copied()
                .find(|kind| kind.name().eq_ignore_ascii_case(name))
            {
                return Some(kind);
            }
            ALIASES
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
                .map(|&(_, kind)| kind)
        }

        /// Canonical stim name of the operation.
        pub const fn name(self) -> &'static str {
            match self {
                GateKind::R => "R",
                GateKind::RX => "RX",
                GateKind::RY => "RY",
                GateKind::M => "M",
                GateKind::MX => "MX",
                GateKind::MY => "MY",
                GateKind::MR => "MR",
                GateKind::MRX => "MRX",
                GateKind::MRY => "MRY",
                GateKind::I => "I",
                GateKind::X => "X",
                GateKind::Y => "Y",
                GateKind::Z => "Z",
                GateKind::H => "H",
                GateKind::HXY => "H_XY",
                GateKind::HYZ => "H_YZ",
                GateKind::S => "S",
                GateKind::SDag => "S_DAG",
                GateKind::SqrtX => "SQRT_X",
                GateKind::SqrtXDag => "SQRT_X_DAG",
                GateKind::SqrtY => "SQRT_Y",
                GateKind::SqrtYDag => "SQRT_Y_DAG",
                GateKind::CX => "CX",
                GateKind::CY => "CY",
                GateKind::CZ => "CZ",
                GateKind::Swap => "SWAP",
                GateKind::XError => "X_ERROR",
                GateKind::YError => "Y_ERROR",
                GateKind::ZError => "Z_ERROR",
                GateKind::Depolarize1 => "DEPOLARIZE1",
                GateKind::Depolarize2 => "DEPOLARIZE2",
                GateKind::PauliChannel1 => "PAULI_CHANNEL_1",
                GateKind::PauliChannel2 => "PAULI_CHANNEL_2",
            }
        }

        pub const fn class(self) -> GateClass {
            match self {
                GateKind::R => GateClass::Reset(Basis::Z),
                GateKind::RX => GateClass::Reset(Basis::X),
                GateKind::RY => GateClass::Reset(Basis::Y),
                GateKind::M => GateClass::Measurement(Basis::Z),
                GateKind::MX => GateClass::Measurement(Basis::X),
                GateKind::MY => GateClass::Measurement(Basis::Y),
                GateKind::MR => GateClass::MeasureReset(Basis::Z),
                GateKind::MRX => GateClass::MeasureReset(Basis::X),
                GateKind::MRY => GateClass::MeasureReset(Basis::Y),
                GateKind::CX | GateKind::CY | GateKind::CZ | GateKind::Swap => GateClass::TwoQubit,
                GateKind::XError
                | GateKind::YError
                | GateKind::ZError
                | GateKind::Depolarize1
                | GateKind::Depolarize2
                | GateKind::PauliChannel1
                | GateKind::PauliChannel2 => GateClass::Noise,
                _ => GateClass::SingleQubit,
            }
        }

        /// Number of targets consumed by one application of the operation.
        pub const fn arity(self) -> usize {
            match self {
                GateKind::CX
                | GateKind::CY
                | GateKind::CZ
                | GateKind::Swap
                | GateKind::Depolarize2
                | GateKind::PauliChannel2 => 2,
                _ => 1,
            }
        }

        /// The operation undoing this one, used for backward propagation.
        ///
        /// Only meaningful for unitary gates; collapsing operations and noise
        /// return themselves.
        pub const fn inverse(self) -> Self {
            match self {
                GateKind::S => GateKind::SDag,
                GateKind::SDag => GateKind::S,
                GateKind::SqrtX => GateKind::SqrtXDag,
                GateKind::SqrtXDag => GateKind::SqrtX,
                GateKind::SqrtY => GateKind::SqrtYDag,
                GateKind::SqrtYDag => GateKind::SqrtY,
                other => other,
            }
        }

        /// Images of `X` and `Z` under conjugation by a single-qubit gate.
        pub const fn single_qubit_images(self) -> Option<[SignedPauli; 2]> {
            use SignedPauli as P;
            let images = match self {
                GateKind::I => [P::plus(Pauli::X), P::plus(Pauli::Z)],
                GateKind::X => [P::plus(Pauli::X), P::minus(Pauli::Z)],
                GateKind::Y => [P::minus(Pauli::X), P::minus(Pauli::Z)],
                GateKind::Z => [P::minus(Pauli::X), P::plus(Pauli::Z)],
                GateKind::H => [P::plus(Pauli::Z), P::plus(Pauli::X)],
                GateKind::HXY => [P::plus(Pauli::Y), P::minus(Pauli::Z)],
                GateKind::HYZ => [P::minus(Pauli::X), P::plus(Pauli::Y)],
                GateKind::S => [P::plus(Pauli::Y), P::plus(Pauli::Z)],
                GateKind::SDag => [P::minus(Pauli::Y), P::plus(Pauli::Z)],
                GateKind::SqrtX => [P::plus(Pauli::X), P::minus(Pauli::Y)],
                GateKind::SqrtXDag => [P::plus(Pauli::X), P::plus(Pauli::Y)],
                GateKind::SqrtY => [P::minus(Pauli::Z), P::plus(Pauli::X)],
                GateKind::SqrtYDag => [P::plus(Pauli::Z), P::minus(Pauli::X)],
                _ => return None,
            };
            Some(images)
        }

        /// Images of `X1`, `Z1`, `X2`, `Z2` under conjugation by a two-qubit gate.
        ///
        /// The first target is the control for the controlled gates.
        pub const fn two_qubit_images(self) -> Option<[PairImage; 4]> {
            use Pauli::{I, X, Y, Z};
            let images = match self {
                GateKind::CX => [pair(X, X), pair(Z, I), pair(I, X), pair(Z, Z)],
                GateKind::CY => [pair(X, Y), pair(Z, I), pair(Z, X), pair(Z, Z)],
                GateKind::CZ => [pair(X, Z), pair(Z, I), pair(Z, X), pair(I, Z)],
                GateKind::Swap => [pair(I, X), pair(I, Z), pair(X, I), pair(Z, I)],
                _ => return None,
            };
            Some(images)
        }

        /// Conjugates a single-qubit Pauli by this gate.
        ///
        /// Uses `Y = iXZ`, so the image of `Y` is `i * image(X) * image(Z)`.
        pub fn conjugate(self, p: Pauli) -> Result<SignedPauli, ConjugationError> {
            let [image_x, image_z] = self
                .single_qubit_images()
                .ok_or(ConjugationError::NotApplicable)?;
            match p {
                Pauli::I => Ok(SignedPauli::plus(Pauli::I)),
                Pauli::X => Ok(image_x),
                Pauli::Z => Ok(image_z),
                Pauli::Y => {
                    let (product, phase) = image_x.pauli.multiply(image_z.pauli);
                    let signs = 2 * (image_x.negative as u8 + image_z.negative as u8);
                    sign_from_phase(product, 1 + phase + signs)
                }
            }
        }

        /// Conjugates a two-qubit Pauli `first ⊗ second` by this gate.
        pub fn conjugate_pair(self, first: Pauli, second: Pauli) -> Result<PairImage, ConjugationError> {
            let images = self
                .two_qubit_images()
                .ok_or(ConjugationError::NotApplicable)?;
            let flags = [first.x_bit(), first.z_bit(), second.x_bit(), second.z_bit()];
            let mut phase = (first.x_bit() && first.z_bit()) as u8 + (second.x_bit() && second.z_bit()) as u8;
            let mut acc = (Pauli::I, Pauli::I);
            for (flag, image) in flags.iter().zip(images.iter()) {
                if !flag {
                    continue;
                }
                let (a, pa) = acc.0.multiply(image.first);
                let (b, pb) = acc.1.multiply(image.second);
                acc = (a, b);
                phase += pa + pb + 2 * image.negative as u8;
            }
            let negative = sign_from_phase(Pauli::I, phase)?.negative;
            Ok(PairImage {
                first: acc.0,
                second: acc.1,
                negative,
            })
        }
    }

    const fn sign_from_phase(pauli: Pauli, phase: u8) -> Result<SignedPauli, ConjugationError> {
        match phase % 4 {
            0 => Ok(SignedPauli::plus(pauli)),
            2 => Ok(SignedPauli::minus(pauli)),
            _ => Err(ConjugationError::NonHermitian),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::gates::{GateClass, GateKind};
    use super::pauli::{Basis, Pauli, SignedPauli};

    const PAULIS: [Pauli; 4] = [Pauli::I, Pauli::X, Pauli::Y, Pauli::Z];

    #[test]
    fn multiplication_matches_pauli_algebra() {
        assert_eq!(Pauli::X.multiply(Pauli::Y), (Pauli::Z, 1));
        assert_eq!(Pauli::Y.multiply(Pauli::X), (Pauli::Z, 3));
        assert_eq!(Pauli::Z.multiply(Pauli::X), (Pauli::Y, 1));
        assert_eq!(Pauli::Y.multiply(Pauli::Y), (Pauli::I, 0));
        assert!(Pauli::X.commutes_with(Pauli::X));
        assert!(!Pauli::X.commutes_with(Pauli::Z));
        assert!(Pauli::I.commutes_with(Pauli::Y));
    }

    #[test]
    fn basis_split_is_consistent_with_commutation() {
        for basis in [Basis::X, Basis::Y, Basis::Z] {
            for p in PAULIS {
                let (along, across) = basis.split(p);
                assert_eq!(across, !p.commutes_with(basis.pauli()));
                assert_eq!(along && !across, p == basis.pauli());
            }
        }
    }

    #[test]
    fn every_gate_name_round_trips() {
        for kind in GateKind::ALL {
            assert_eq!(GateKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(GateKind::from_name("cnot"), Some(GateKind::CX));
        assert_eq!(GateKind::from_name("ZCZ"), Some(GateKind::CZ));
        assert_eq!(GateKind::from_name("T"), None);
    }

    #[test]
    fn single_qubit_tables_preserve_commutation_and_invert() {
        for kind in GateKind::ALL {
            if kind.class() != GateClass::SingleQubit {
                continue;
            }
            for p in PAULIS {
                let image = kind.conjugate(p).unwrap();
                let back = kind.inverse().conjugate(image.pauli).unwrap();
                assert_eq!(back.pauli, p, "{} does not invert on {:?}", kind.name(), p);
                assert_eq!(back.negative, image.negative, "{} sign on {:?}", kind.name(), p);
                for q in PAULIS {
                    let other = kind.conjugate(q).unwrap();
                    assert_eq!(
                        p.commutes_with(q),
                        image.pauli.commutes_with(other.pauli)
                    );
                }
            }
        }
    }

    #[test]
    fn known_single_qubit_images() {
        assert_eq!(GateKind::H.conjugate(Pauli::Y), Ok(SignedPauli::minus(Pauli::Y)));
        assert_eq!(GateKind::S.conjugate(Pauli::Y), Ok(SignedPauli::minus(Pauli::X)));
        assert_eq!(GateKind::SqrtX.conjugate(Pauli::Y), Ok(SignedPauli::plus(Pauli::Z)));
        assert_eq!(GateKind::HYZ.conjugate(Pauli::Y), Ok(SignedPauli::plus(Pauli::Z)));
    }

    #[test]
    fn cx_maps_yy_to_minus_xz() {
        let image = GateKind::CX.conjugate_pair(Pauli::Y, Pauli::Y).unwrap();
        assert_eq!((image.first, image.second, image.negative), (Pauli::X, Pauli::Z, true));
    }

    #[test]
    fn two_qubit_tables_are_involutions() {
        for kind in [GateKind::CX, GateKind::CY, GateKind::CZ, GateKind::Swap] {
            assert_eq!(kind.inverse(), kind);
            for a in PAULIS {
                for b in PAULIS {
                    let image = kind.conjugate_pair(a, b).unwrap();
                    let back = kind.conjugate_pair(image.first, image.second).unwrap();
                    assert_eq!((back.first, back.second), (a, b), "{}", kind.name());
                    assert_eq!(back.negative, image.negative, "{} sign", kind.name());
                }
            }
        }
    }
}
