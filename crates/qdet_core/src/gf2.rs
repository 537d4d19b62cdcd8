//! Dense GF(2) vectors and elimination.
//!
//! Vectors wrap a `BitVec<u64, Lsb0>` so that XOR and inner products run a
//! word at a time over the raw storage. Bits beyond `len` are kept at zero by
//! construction, which the word-wise operations rely on.

use crate::bit_utils::BitPack;
use bitvec::prelude::*;
use std::cmp::Ordering;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Gf2Vec(BitVec<u64, Lsb0>);

impl Gf2Vec {
    pub fn zeros(len: usize) -> Self {
        Self(BitVec::repeat(false, len))
    }

    pub fn from_ones(len: usize, ones: impl IntoIterator<Item = usize>) -> Self {
        let mut v = Self::zeros(len);
        for i in ones {
            v.toggle(i);
        }
        v
    }

    /// Unit vector `e_i`.
    pub fn unit(len: usize, i: usize) -> Self {
        Self::from_ones(len, [i])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, i: usize) -> bool {
        self.0[i]
    }

    pub fn set(&mut self, i: usize, value: bool) {
        self.0.set(i, value);
    }

    pub fn toggle(&mut self, i: usize) {
        let current = self.0[i];
        self.0.set(i, !current);
    }

    pub fn xor_assign(&mut self, other: &Gf2Vec) {
        debug_assert_eq!(self.len(), other.len());
        BitPack::xor_into(self.0.as_raw_mut_slice(), other.0.as_raw_slice());
    }

    pub fn xor(&self, other: &Gf2Vec) -> Gf2Vec {
        let mut out = self.clone();
        out.xor_assign(other);
        out
    }

    /// Inner product over GF(2).
    pub fn dot(&self, other: &Gf2Vec) -> bool {
        BitPack::and_parity(self.0.as_raw_slice(), other.0.as_raw_slice())
    }

    pub fn weight(&self) -> usize {
        self.0.count_ones()
    }

    pub fn is_zero(&self) -> bool {
        self.0.not_any()
    }

    /// Lowest set index.
    pub fn pivot(&self) -> Option<usize> {
        self.0.first_one()
    }

    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter_ones()
    }

    /// Orders by weight, then lexicographically by set indices.
    pub fn canonical_cmp(&self, other: &Gf2Vec) -> Ordering {
        self.weight()
            .cmp(&other.weight())
            .then_with(|| self.ones().cmp(other.ones()))
    }
}

/// Incremental basis with rows stored in an arena indexed by pivot.
///
/// `slots[p]` points at the row whose lowest set bit is `p`. Reducing a
/// vector clears its lowest bit with the matching row until it is zero or
/// hits an empty slot.
#[derive(Clone, Debug)]
pub struct Gf2Basis {
    width: usize,
    slots: Vec<Option<usize>>,
    rows: Vec<Gf2Vec>,
}

impl Gf2Basis {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            slots: vec![None; width],
            rows: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rank(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Gf2Vec] {
        &self.rows
    }

    /// Reduces `v` in place; returns the pivot it stopped on, if any.
    pub fn reduce(&self, v: &mut Gf2Vec) -> Option<usize> {
        while let Some(p) = v.pivot() {
            match self.slots[p] {
                Some(row) => v.xor_assign(&self.rows[row]),
                None => return Some(p),
            }
        }
        None
    }

    pub fn contains(&self, v: &Gf2Vec) -> bool {
        let mut v = v.clone();
        self.reduce(&mut v).is_none()
    }

    /// Adds `v` to the span; returns `false` when it was already dependent.
    pub fn insert(&mut self, mut v: Gf2Vec) -> bool {
        match self.reduce(&mut v) {
            Some(p) => {
                self.slots[p] = Some(self.rows.len());
                self.rows.push(v);
                true
            }
            None => false,
        }
    }
}

/// Basis of `{ c : sum_i c_i * rows[i] = 0 }`, as vectors over row indices.
///
/// Rows are eliminated in order while tracking which input rows each reduced
/// row is built from; every row that reduces to zero contributes its tracked
/// combination.
pub fn left_kernel(rows: &[Gf2Vec]) -> Vec<Gf2Vec> {
    let n = rows.len();
    let Some(width) = rows.first().map(Gf2Vec::len) else {
        return Vec::new();
    };
    let mut slots: Vec<Option<usize>> = vec![None; width];
    let mut reduced: Vec<(Gf2Vec, Gf2Vec)> = Vec::new();
    let mut kernel = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        let mut v = row.clone();
        let mut combo = Gf2Vec::unit(n, i);
        let mut pivot = None;
        while let Some(p) = v.pivot() {
            match slots[p] {
                Some(j) => {
                    let (rv, rc) = &reduced[j];
                    v.xor_assign(rv);
                    combo.xor_assign(rc);
                }
                None => {
                    pivot = Some(p);
                    break;
                }
            }
        }
        match pivot {
            Some(p) => {
                slots[p] = Some(reduced.len());
                reduced.push((v, combo));
            }
            None => kernel.push(combo),
        }
    }
    kernel
}

/// Reduced row-echelon form of the span of `vectors`, sorted by pivot.
///
/// Pivots are the lowest set index of each row, and every pivot column is
/// zero in all other rows.
pub fn reduced_echelon(vectors: &[Gf2Vec]) -> Vec<Gf2Vec> {
    let Some(width) = vectors.first().map(Gf2Vec::len) else {
        return Vec::new();
    };
    let mut basis = Gf2Basis::new(width);
    for v in vectors {
        basis.insert(v.clone());
    }
    let mut rows = basis.rows;
    rows.sort_by_key(|r| r.pivot());
    // Back-substitute from the highest pivot down.
    for i in (0..rows.len()).rev() {
        let Some(p) = rows[i].pivot() else { continue };
        let pivot_row = rows[i].clone();
        for (j, row) in rows.iter_mut().enumerate() {
            if j != i && row.get(p) {
                row.xor_assign(&pivot_row);
            }
        }
    }
    rows
}

/// Basis of the annihilator `{ y : rows[i] . y = 0 for all i }` in `width` dimensions.
pub fn right_kernel(rows: &[Gf2Vec], width: usize) -> Vec<Gf2Vec> {
    let echelon = reduced_echelon(rows);
    let mut is_pivot = vec![false; width];
    for row in &echelon {
        if let Some(p) = row.pivot() {
            is_pivot[p] = true;
        }
    }
    (0..width)
        .filter(|&f| !is_pivot[f])
        .map(|f| {
            let mut y = Gf2Vec::unit(width, f);
            for row in &echelon {
                if row.get(f) {
                    if let Some(p) = row.pivot() {
                        y.set(p, true);
                    }
                }
            }
            y
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(len: usize, ones: &[usize]) -> Gf2Vec {
        Gf2Vec::from_ones(len, ones.iter().copied())
    }

    #[test]
    fn word_wise_operations() {
        let a = v(130, &[0, 64, 129]);
        let b = v(130, &[64, 100]);
        assert_eq!(a.xor(&b), v(130, &[0, 100, 129]));
        assert!(a.dot(&b));
        assert!(!a.dot(&v(130, &[0, 129])));
        assert_eq!(a.weight(), 3);
        assert_eq!(b.pivot(), Some(64));
        assert!(Gf2Vec::zeros(5).is_zero());
    }

    #[test]
    fn basis_rejects_dependent_vectors() {
        let mut basis = Gf2Basis::new(4);
        assert!(basis.insert(v(4, &[0, 1])));
        assert!(basis.insert(v(4, &[1, 2])));
        assert!(!basis.insert(v(4, &[0, 2])));
        assert!(basis.contains(&v(4, &[0, 2])));
        assert!(!basis.contains(&v(4, &[3])));
        assert!(!basis.insert(Gf2Vec::zeros(4)));
        assert_eq!(basis.rank(), 2);
    }

    #[test]
    fn left_kernel_combinations_cancel() {
        let rows = vec![v(3, &[0, 1]), v(3, &[1, 2]), v(3, &[0, 2]), v(3, &[2]), v(3, &[0])];
        let kernel = left_kernel(&rows);
        assert_eq!(kernel.len(), 5 - 3);
        for combo in &kernel {
            let mut sum = Gf2Vec::zeros(3);
            for i in combo.ones() {
                sum.xor_assign(&rows[i]);
            }
            assert!(sum.is_zero());
            assert!(!combo.is_zero());
        }
    }

    #[test]
    fn echelon_form_is_reduced() {
        let rows = reduced_echelon(&[v(4, &[0, 1, 2]), v(4, &[1, 2, 3]), v(4, &[0, 3])]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], v(4, &[0, 3]));
        assert_eq!(rows[1], v(4, &[1, 2, 3]));
    }

    #[test]
    fn right_kernel_annihilates() {
        let rows = vec![v(5, &[0, 2]), v(5, &[1, 2, 4])];
        let kernel = right_kernel(&rows, 5);
        assert_eq!(kernel.len(), 3);
        for y in &kernel {
            for r in &rows {
                assert!(!r.dot(y));
            }
        }
        let mut span = Gf2Basis::new(5);
        for y in kernel {
            assert!(span.insert(y));
        }
    }

    #[test]
    fn canonical_order_prefers_light_then_low() {
        let a = v(6, &[0, 5]);
        let b = v(6, &[1, 2]);
        let c = v(6, &[3]);
        assert_eq!(c.canonical_cmp(&a), Ordering::Less);
        assert_eq!(a.canonical_cmp(&b), Ordering::Less);
    }
}
