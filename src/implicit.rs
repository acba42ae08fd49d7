//! Uncompressed dynamic bit vector with no index.
//!
//! Every mutation shifts the packed words behind the edit point and every
//! query scans from the front. It carries no auxiliary state at all, which
//! makes it the reference the tree-backed [`crate::DynamicBitVector`] is
//! checked against and the baseline its costs are measured against.

/// A packed bit vector with linear-time rank, select, and edits.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ImplicitBitVector {
    data: Vec<u64>,
    len: usize,
}

impl std::fmt::Debug for ImplicitBitVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bits: String = (0..self.len)
            .map(|i| if self.get(i) { '1' } else { '0' })
            .collect();
        f.debug_tuple("ImplicitBitVector").field(&bits).finish()
    }
}

impl ImplicitBitVector {
    /// Create an empty bit vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bit vector over pre-packed words holding `len` bits.
    pub fn from_words(bits: &[u64], len: usize) -> Self {
        assert!(len <= bits.len() * 64, "{len} bits do not fit in {} words", bits.len());
        let mut data = bits[..len.div_ceil(64)].to_vec();
        if len % 64 != 0 {
            if let Some(last) = data.last_mut() {
                *last &= (1u64 << (len % 64)) - 1;
            }
        }
        Self { data, len }
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Return true if no bits are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of set bits.
    pub fn ones(&self) -> usize {
        self.data.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Return true if bit at `i` is set. Out-of-range positions read as clear.
    pub fn get(&self, i: usize) -> bool {
        if i >= self.len {
            return false;
        }
        (self.data[i / 64] & (1u64 << (i % 64))) != 0
    }

    /// Bit at `i`. Panics if out of range.
    pub fn access(&self, i: usize) -> bool {
        assert!(i < self.len, "index {i} out of bounds for {} bits", self.len);
        self.get(i)
    }

    /// Insert `bit` at `i`, shifting later bits up by one. O(N).
    pub fn insert(&mut self, i: usize, bit: bool) {
        assert!(i <= self.len, "insert position {i} out of bounds for {} bits", self.len);
        if self.len % 64 == 0 {
            self.data.push(0);
        }
        let q = i / 64;
        let off = i % 64;
        // Carry the top bit of each word into the next one.
        let mut carry = self.data[q] >> 63;
        let low = self.data[q] & low_mask(off);
        let high = self.data[q] & !low_mask(off);
        self.data[q] = low | ((bit as u64) << off) | (high << 1);
        for word in &mut self.data[q + 1..] {
            let next = *word >> 63;
            *word = (*word << 1) | carry;
            carry = next;
        }
        self.len += 1;
    }

    /// Append `bit`. O(1) amortized.
    pub fn push_back(&mut self, bit: bool) {
        self.insert(self.len, bit);
    }

    /// Remove and return the bit at `i`, shifting later bits down. O(N).
    pub fn remove(&mut self, i: usize) -> bool {
        assert!(i < self.len, "remove index {i} out of bounds for {} bits", self.len);
        let bit = self.get(i);
        let q = i / 64;
        let off = i % 64;
        let low = self.data[q] & low_mask(off);
        let high = if off == 63 { 0 } else { self.data[q] >> (off + 1) << off };
        self.data[q] = low | high;
        for k in q + 1..self.data.len() {
            let moved = self.data[k] & 1;
            self.data[k - 1] |= moved << 63;
            self.data[k] >>= 1;
        }
        self.len -= 1;
        if self.len % 64 == 0 {
            self.data.pop();
        }
        bit
    }

    /// Overwrite the bit at `i`, returning the previous value.
    pub fn set(&mut self, i: usize, bit: bool) -> bool {
        let old = self.access(i);
        let mask = 1u64 << (i % 64);
        if bit {
            self.data[i / 64] |= mask;
        } else {
            self.data[i / 64] &= !mask;
        }
        old
    }

    /// Linear-time rank: set bits in `[0, i)`. O(N).
    pub fn rank1(&self, i: usize) -> usize {
        let i = i.min(self.len);
        let full_words = i / 64;
        let mut count = 0;
        for j in 0..full_words {
            count += self.data[j].count_ones() as usize;
        }
        let bit_offset = i % 64;
        if bit_offset > 0 {
            count += (self.data[full_words] & low_mask(bit_offset)).count_ones() as usize;
        }
        count
    }

    /// Clear bits in `[0, i)`.
    pub fn rank0(&self, i: usize) -> usize {
        i.min(self.len) - self.rank1(i)
    }

    /// Linear-time select: position of the `k`-th set bit. O(N).
    pub fn select1(&self, k: usize) -> Option<usize> {
        self.select_in(k, |w| w)
    }

    /// Linear-time select over clear bits.
    pub fn select0(&self, k: usize) -> Option<usize> {
        self.select_in(k, |w| !w)
    }

    fn select_in(&self, mut k: usize, view: impl Fn(u64) -> u64) -> Option<usize> {
        for (i, &word) in self.data.iter().enumerate() {
            let valid = (self.len - i * 64).min(64);
            let word = view(word) & low_mask(valid);
            let ones = word.count_ones() as usize;
            if k < ones {
                for bit in 0..64 {
                    if (word & (1u64 << bit)) != 0 {
                        if k == 0 {
                            return Some(i * 64 + bit);
                        }
                        k -= 1;
                    }
                }
            }
            k -= ones;
        }
        None
    }

    /// Smallest `j` such that `rank1(j + 1) + j >= x`, if any.
    pub fn search_r(&self, x: usize) -> Option<usize> {
        let mut ones = 0;
        for j in 0..self.len {
            ones += self.get(j) as usize;
            if ones + j >= x {
                return Some(j);
            }
        }
        None
    }

    /// Iterate over bits in order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(|i| self.get(i))
    }

    /// Memory footprint in bits.
    pub fn bit_size(&self) -> usize {
        (std::mem::size_of::<Self>() + self.data.capacity() * 8) * 8
    }
}

impl FromIterator<bool> for ImplicitBitVector {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bv = Self::new();
        for bit in iter {
            bv.push_back(bit);
        }
        bv
    }
}

#[inline]
fn low_mask(n: usize) -> u64 {
    if n >= 64 {
        !0
    } else {
        (1u64 << n) - 1
    }
}
