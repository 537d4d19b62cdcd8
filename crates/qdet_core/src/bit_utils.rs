pub struct BitPack;

impl BitPack {
    #[inline(always)]
    pub fn words_for(bits: usize) -> usize {
        bits.div_ceil(64)
    }

    #[inline(always)]
    pub fn get(storage: &[u64], index: usize) -> bool {
        let word = storage[index / 64];
        let bit = index % 64;
        (word >> bit) & 1 == 1
    }

    #[inline(always)]
    pub fn set(storage: &mut [u64], index: usize, val: bool) {
        let word_idx = index / 64;
        let bit_idx = index % 64;
        if val {
            storage[word_idx] |= 1 << bit_idx;
        } else {
            storage[word_idx] &= !(1 << bit_idx);
        }
    }

    #[inline(always)]
    pub fn xor_into(dst: &mut [u64], src: &[u64]) {
        for (d, s) in dst.iter_mut().zip(src) {
            *d ^= *s;
        }
    }

    /// Parity of the bitwise AND of two registers.
    #[inline(always)]
    pub fn and_parity(a: &[u64], b: &[u64]) -> bool {
        a.iter()
            .zip(b)
            .fold(0u32, |acc, (x, y)| acc ^ (x & y).count_ones())
            & 1
            == 1
    }

    /// Indices of set bits in the union of two registers, in increasing order.
    pub fn union_ones<'a>(a: &'a [u64], b: &'a [u64]) -> impl Iterator<Item = usize> + 'a {
        a.iter().zip(b).enumerate().flat_map(|(w, (x, y))| {
            let mut word = x | y;
            std::iter::from_fn(move || {
                if word == 0 {
                    return None;
                }
                let bit = word.trailing_zeros() as usize;
                word &= word - 1;
                Some(w * 64 + bit)
            })
        })
    }
}
